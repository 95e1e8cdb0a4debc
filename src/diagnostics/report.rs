use super::TimingBreakdown;
use crate::image::io::write_json_file;
use crate::matching::{Direction, DirectionStatus};
use serde::Serialize;
use std::path::Path;

/// Outcome of one directed computation.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectionReport {
    pub moving: usize,
    pub stationary: usize,
    pub direction: Direction,
    pub status: DirectionStatus,
    /// Matches in the emitted record.
    pub matches: usize,
    /// Raw engine matches before the smoothness filter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidates: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A failure that took out every pending direction of a pair.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PairFailure {
    pub a: usize,
    pub b: usize,
    pub reason: String,
}

/// A result that could not be written; the in-memory copy is still used.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistenceFailure {
    pub path: String,
    pub reason: String,
    /// `(moving, stationary)` for intermediate records, `None` for the output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<[usize; 2]>,
}

/// Everything a caller needs to audit a matching run.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRunReport {
    pub pairs: usize,
    pub directions: Vec<DirectionReport>,
    pub pair_failures: Vec<PairFailure>,
    pub persistence_failures: Vec<PersistenceFailure>,
    /// Set when any persistence failure occurred.
    pub degraded: bool,
    pub timings: TimingBreakdown,
}

impl MatchRunReport {
    pub fn count(&self, status: DirectionStatus) -> usize {
        self.directions.iter().filter(|d| d.status == status).count()
    }

    pub fn record_persistence_failure(&mut self, failure: PersistenceFailure) {
        self.degraded = true;
        self.persistence_failures.push(failure);
    }

    /// One-line summary for logs.
    pub fn summary(&self) -> String {
        format!(
            "{} pairs: {} computed, {} loaded, {} skipped, {} failed{}",
            self.pairs,
            self.count(DirectionStatus::Computed),
            self.count(DirectionStatus::Loaded),
            self.count(DirectionStatus::Skipped),
            self.count(DirectionStatus::Failed),
            if self.degraded { " (degraded)" } else { "" }
        )
    }
}

/// Write the run report as pretty JSON.
pub fn write_report(path: &Path, report: &MatchRunReport) -> Result<(), String> {
    write_json_file(path, report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_camel_case_and_skips_empty_options() {
        let mut report = MatchRunReport {
            pairs: 1,
            directions: vec![DirectionReport {
                moving: 0,
                stationary: 1,
                direction: Direction::Forward,
                status: DirectionStatus::Skipped,
                matches: 0,
                candidates: None,
                error: None,
            }],
            ..Default::default()
        };
        report.record_persistence_failure(PersistenceFailure {
            path: "out_1_0.json".into(),
            reason: "disk full".into(),
            direction: Some([1, 0]),
        });
        let v = serde_json::to_value(&report).unwrap();
        assert_eq!(v["directions"][0]["status"], "skipped");
        assert!(v["directions"][0].get("candidates").is_none());
        assert_eq!(v["persistenceFailures"][0]["direction"][0], 1);
        assert_eq!(v["degraded"], true);
        assert!(report.summary().ends_with("(degraded)"));
    }
}
