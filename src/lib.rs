#![doc = include_str!("../README.md")]

// Public modules (stable-ish surface)
pub mod config;
pub mod diagnostics;
pub mod matching;
pub mod tiles;
pub mod transform;
pub mod types;

// Supporting modules.
pub mod homography;
pub mod image;
pub mod mesh;

// --- High-level re-exports -------------------------------------------------

// Main entry points: transform specs and the pairwise matcher.
pub use crate::matching::{CorrelationEngine, MatchParams, MatchRun, PairMatcher, PipelineError};
pub use crate::tiles::{TileRegistry, TileSpec};
pub use crate::transform::{TransformError, TransformInstance, TransformSpec};
pub use crate::types::{CorrespondencePair, MatchPoint, PointMatch};

// Run report returned with every match run.
pub use crate::diagnostics::MatchRunReport;

// --- Prelude ---------------------------------------------------------------

/// Small prelude for quick experiments.
///
/// ```no_run
/// use mosaic_align::prelude::*;
///
/// # fn main() {
/// let spec = TransformSpec::list(vec![
///     TransformSpec::reference("lens"),
///     TransformSpec::leaf("mpicbg.trakem2.transform.TranslationModel2D", "100 0"),
/// ]);
/// println!("resolved={}", spec.is_fully_resolved());
/// # }
/// ```
pub mod prelude {
    pub use crate::image::ImageU8;
    pub use crate::transform::CoordinateTransform;
    pub use crate::{
        CorrelationEngine, CorrespondencePair, MatchParams, PairMatcher, TileRegistry,
        TransformSpec,
    };
}
