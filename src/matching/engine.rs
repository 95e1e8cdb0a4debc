//! Seam to the external block-matching (correlation) kernel.
use super::params::BlockMatchParams;
use crate::image::ImageU8;
use crate::transform::CoordinateTransform;
use thiserror::Error;

/// Raw match returned by the engine.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RawMatch {
    /// Mesh vertex in the moving tile's local frame.
    pub source: [f64; 2],
    /// Matched location in the stationary tile's local frame.
    pub target: [f64; 2],
}

/// Everything the engine needs for one directed computation.
pub struct MatchRequest<'a> {
    pub moving_tile: usize,
    pub stationary_tile: usize,
    pub moving: ImageU8<'a>,
    pub stationary: ImageU8<'a>,
    /// Maps moving-tile local coordinates into the stationary tile's frame.
    pub transform: &'a dyn CoordinateTransform,
    pub vertices: &'a [[f64; 2]],
    pub params: &'a BlockMatchParams,
    /// Effective block radius (see [`BlockMatchParams::effective_block_radius`]).
    pub block_radius: u32,
    pub workers: usize,
}

#[derive(Clone, Debug, Error, PartialEq)]
#[error("correlation engine failed: {0}")]
pub struct EngineError(pub String);

/// Block matching by maximal normalized cross-correlation.
///
/// Calls are blocking and all-or-nothing: either the complete match set for
/// the request is returned or an error.
pub trait CorrelationEngine: Sync {
    fn match_blocks(&self, request: &MatchRequest<'_>) -> Result<Vec<RawMatch>, EngineError>;
}
