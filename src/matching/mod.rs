//! Pairwise correspondence matching between overlapping tiles.
//!
//! - [`params`]: block-matching, smoothness and run parameters.
//! - [`engine`]: the [`CorrelationEngine`] seam to the correlation kernel.
//! - [`pairs`]: `a:b` request parsing and the per-direction [`TaskTable`].
//! - [`intermediate`]: per-direction results persisted for resume.
//! - [`smoothness`]: local smoothness filter over raw matches.
//! - [`aggregate`]: projection to mosaic space and ordered output.
//! - [`pipeline`]: the [`PairMatcher`] orchestrating all of the above.

pub mod aggregate;
pub mod engine;
pub mod intermediate;
pub mod pairs;
pub mod params;
pub mod pipeline;
pub mod smoothness;

pub use aggregate::{collect_records, project_matches, write_correspondences, ProjectionError};
pub use engine::{CorrelationEngine, EngineError, MatchRequest, RawMatch};
pub use intermediate::{IntermediateStore, PersistError};
pub use pairs::{
    parse_pairs, DirectedPair, Direction, DirectionEntry, DirectionStatus, PairParseError,
    PairTask, TaskTable,
};
pub use params::{BlockMatchParams, LocalModel, LocalSmoothnessParams, MatchParams};
pub use pipeline::{check_pair_indices, DirectionError, MatchRun, PairMatcher, PipelineError};
pub use smoothness::{fit_weighted, local_smoothness_filter, LocalFit};
