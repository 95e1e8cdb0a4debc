//! Run report produced by the pairwise matcher.
//!
//! `MatchRunReport` lists the outcome of every direction touched in a run,
//! pair-level and persistence failures, and a per-stage timing breakdown. It
//! serializes to camelCase JSON so it can be stored next to the output.

pub mod report;
pub mod timing;

pub use report::{
    write_report, DirectionReport, MatchRunReport, PairFailure, PersistenceFailure,
};
pub use timing::{elapsed_ms, StageTiming, TimingBreakdown};
