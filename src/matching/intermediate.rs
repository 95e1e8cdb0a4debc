//! Per-direction intermediate results used to resume interrupted runs.
//!
//! Each directed pair `(moving, stationary)` owns one file next to the final
//! output: `<stem>_<moving>_<stationary>.<ext>`, holding a single-element JSON
//! list of [`CorrespondencePair`]. Keys never collide across pairs, so pairs
//! can be processed without coordinating on the store.
use super::pairs::DirectedPair;
use crate::image::io::{read_json_file, write_json_file_atomic};
use crate::types::CorrespondencePair;
use std::fs;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum PersistError {
    #[error("failed to read intermediate {path}: {reason}")]
    Read { path: PathBuf, reason: String },
    #[error("failed to write intermediate {path}: {reason}")]
    Write { path: PathBuf, reason: String },
    #[error("malformed intermediate {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },
}

#[derive(Clone, Debug)]
pub struct IntermediateStore {
    target_path: PathBuf,
}

impl IntermediateStore {
    pub fn new(target_path: impl Into<PathBuf>) -> Self {
        Self {
            target_path: target_path.into(),
        }
    }

    /// `out/corr.json` + `(3, 7)` → `out/corr_3_7.json`.
    pub fn path_for(&self, pair: DirectedPair) -> PathBuf {
        let stem = self
            .target_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = match self.target_path.extension() {
            Some(ext) => format!(
                "{stem}_{}_{}.{}",
                pair.moving,
                pair.stationary,
                ext.to_string_lossy()
            ),
            None => format!("{stem}_{}_{}", pair.moving, pair.stationary),
        };
        self.target_path.with_file_name(name)
    }

    /// `Ok(None)` when nothing has been persisted for `pair`.
    pub fn load(&self, pair: DirectedPair) -> Result<Option<CorrespondencePair>, PersistError> {
        let path = self.path_for(pair);
        match fs::metadata(&path) {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(PersistError::Read {
                    path,
                    reason: e.to_string(),
                })
            }
        }
        let mut records: Vec<CorrespondencePair> =
            read_json_file(&path).map_err(|reason| PersistError::Malformed {
                path: path.clone(),
                reason,
            })?;
        if records.len() != 1 {
            return Err(PersistError::Malformed {
                path,
                reason: format!("expected exactly one record, found {}", records.len()),
            });
        }
        Ok(records.pop())
    }

    pub fn save(&self, pair: DirectedPair, record: &CorrespondencePair) -> Result<(), PersistError> {
        let path = self.path_for(pair);
        write_json_file_atomic(&path, std::slice::from_ref(record))
            .map_err(|reason| PersistError::Write { path, reason })
    }

    /// Remove the persisted record for `pair`; `Ok(false)` if there was none.
    pub fn discard(&self, pair: DirectedPair) -> Result<bool, PersistError> {
        let path = self.path_for(pair);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(PersistError::Write {
                path,
                reason: e.to_string(),
            }),
        }
    }
}
