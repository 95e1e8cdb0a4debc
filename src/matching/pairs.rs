//! Pair requests, match directions and the per-direction task table.
use crate::types::CorrespondencePair;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("index pair not in correct format: '{token}' ({reason})")]
pub struct PairParseError {
    pub token: String,
    pub reason: String,
}

/// One requested tile pair `a:b`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PairTask {
    pub a: usize,
    pub b: usize,
}

impl PairTask {
    pub fn new(a: usize, b: usize) -> Self {
        Self { a, b }
    }

    pub fn directed(self, direction: Direction) -> DirectedPair {
        match direction {
            Direction::Forward => DirectedPair::new(self.a, self.b),
            Direction::Reverse => DirectedPair::new(self.b, self.a),
        }
    }

    /// Forward first, then reverse.
    pub fn directions(self) -> [DirectedPair; 2] {
        [
            self.directed(Direction::Forward),
            self.directed(Direction::Reverse),
        ]
    }
}

impl FromStr for PairTask {
    type Err = PairParseError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let fail = |reason: String| PairParseError {
            token: token.to_string(),
            reason,
        };
        let fields: Vec<&str> = token.split(':').collect();
        if fields.len() != 2 {
            return Err(fail(format!("expected 2 fields, got {}", fields.len())));
        }
        let parse = |field: &str| {
            field
                .parse::<usize>()
                .map_err(|e| fail(format!("'{field}' is not a tile index: {e}")))
        };
        Ok(Self::new(parse(fields[0])?, parse(fields[1])?))
    }
}

impl fmt::Display for PairTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.a, self.b)
    }
}

/// Parse `a:b` tokens; a token may hold several comma-separated pairs.
///
/// Every piece must be exactly `a:b` with unpadded indices, so an empty
/// token or a trailing comma is an error.
pub fn parse_pairs<S: AsRef<str>>(tokens: &[S]) -> Result<Vec<PairTask>, PairParseError> {
    let mut pairs = Vec::with_capacity(tokens.len());
    for token in tokens {
        for piece in token.as_ref().split(',') {
            pairs.push(piece.parse()?);
        }
    }
    Ok(pairs)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Forward,
    Reverse,
}

/// A direction of work: `moving` is matched against `stationary`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DirectedPair {
    pub moving: usize,
    pub stationary: usize,
}

impl DirectedPair {
    pub fn new(moving: usize, stationary: usize) -> Self {
        Self { moving, stationary }
    }
}

impl fmt::Display for DirectedPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} > {}", self.moving, self.stationary)
    }
}

/// Status of one direction; absent from the table means pending.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectionStatus {
    Pending,
    Loaded,
    Computed,
    Skipped,
    Failed,
}

impl DirectionStatus {
    /// Whether the direction contributes a record to the output.
    pub fn is_emitted(self) -> bool {
        matches!(self, Self::Loaded | Self::Computed | Self::Skipped)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DirectionEntry {
    pub status: DirectionStatus,
    pub record: Option<CorrespondencePair>,
    /// Raw engine matches before filtering (computed directions only).
    pub candidates: Option<usize>,
    pub error: Option<String>,
}

/// Terminal state of every direction touched in a run, keyed by direction.
#[derive(Clone, Debug, Default)]
pub struct TaskTable {
    entries: BTreeMap<DirectedPair, DirectionEntry>,
}

impl TaskTable {
    pub fn status(&self, pair: DirectedPair) -> DirectionStatus {
        self.entries
            .get(&pair)
            .map_or(DirectionStatus::Pending, |entry| entry.status)
    }

    pub fn entry(&self, pair: DirectedPair) -> Option<&DirectionEntry> {
        self.entries.get(&pair)
    }

    pub fn contains(&self, pair: DirectedPair) -> bool {
        self.entries.contains_key(&pair)
    }

    pub fn mark_skipped(&mut self, pair: DirectedPair, record: CorrespondencePair) {
        self.insert(pair, DirectionStatus::Skipped, Some(record), None, None);
    }

    pub fn mark_loaded(&mut self, pair: DirectedPair, record: CorrespondencePair) {
        self.insert(pair, DirectionStatus::Loaded, Some(record), None, None);
    }

    pub fn mark_computed(&mut self, pair: DirectedPair, record: CorrespondencePair, candidates: usize) {
        self.insert(
            pair,
            DirectionStatus::Computed,
            Some(record),
            Some(candidates),
            None,
        );
    }

    pub fn mark_failed(&mut self, pair: DirectedPair, error: impl Into<String>) {
        self.insert(pair, DirectionStatus::Failed, None, None, Some(error.into()));
    }

    fn insert(
        &mut self,
        pair: DirectedPair,
        status: DirectionStatus,
        record: Option<CorrespondencePair>,
        candidates: Option<usize>,
        error: Option<String>,
    ) {
        debug_assert!(
            !self.entries.contains_key(&pair),
            "direction {pair} settled twice"
        );
        self.entries.insert(
            pair,
            DirectionEntry {
                status,
                record,
                candidates,
                error,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
