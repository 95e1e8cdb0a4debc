//! Projection of raw matches into mosaic space and ordered output assembly.
use super::engine::RawMatch;
use super::pairs::{Direction, PairTask, TaskTable};
use crate::diagnostics::DirectionReport;
use crate::image::io::write_json_file;
use crate::transform::CoordinateTransform;
use crate::types::{CorrespondencePair, MatchPoint, PointMatch};
use std::path::Path;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq)]
#[error("cannot project match at ({:.2}, {:.2}) into the mosaic", .point[0], .point[1])]
pub struct ProjectionError {
    pub point: [f64; 2],
}

/// `p1 = (l, moving(l))`, `p2 = (l', stationary(l'))` for every raw match.
pub fn project_matches(
    raw: &[RawMatch],
    moving: &dyn CoordinateTransform,
    stationary: &dyn CoordinateTransform,
) -> Result<Vec<PointMatch>, ProjectionError> {
    raw.iter()
        .map(|m| {
            let w1 = moving
                .apply(m.source)
                .ok_or(ProjectionError { point: m.source })?;
            let w2 = stationary
                .apply(m.target)
                .ok_or(ProjectionError { point: m.target })?;
            Ok(PointMatch {
                p1: MatchPoint { l: m.source, w: w1 },
                p2: MatchPoint { l: m.target, w: w2 },
            })
        })
        .collect()
}

/// Walk `pairs` in request order, forward before reverse, and collect the
/// emitted records plus one report entry per direction.
///
/// A pair requested more than once is emitted once per request.
pub fn collect_records(
    pairs: &[PairTask],
    table: &TaskTable,
) -> (Vec<CorrespondencePair>, Vec<DirectionReport>) {
    let mut records = Vec::with_capacity(pairs.len() * 2);
    let mut reports = Vec::with_capacity(pairs.len() * 2);
    for pair in pairs {
        for direction in [Direction::Forward, Direction::Reverse] {
            let directed = pair.directed(direction);
            let entry = table.entry(directed);
            let status = table.status(directed);
            let record = entry.and_then(|e| e.record.as_ref());
            if status.is_emitted() {
                if let Some(record) = record {
                    records.push(record.clone());
                }
            }
            reports.push(DirectionReport {
                moving: directed.moving,
                stationary: directed.stationary,
                direction,
                status,
                matches: record.map_or(0, CorrespondencePair::len),
                candidates: entry.and_then(|e| e.candidates),
                error: entry.and_then(|e| e.error.clone()),
            });
        }
    }
    (records, reports)
}

/// Write the final output list; returns `Ok(false)` without touching the
/// filesystem when there is nothing to write.
pub fn write_correspondences(path: &Path, records: &[CorrespondencePair]) -> Result<bool, String> {
    if records.is_empty() {
        return Ok(false);
    }
    write_json_file(path, records)?;
    Ok(true)
}
