//! Parameter types configuring the pairwise matcher.
//!
//! Defaults mirror the settings the mosaic pipeline has been run with in
//! production: half-resolution matching, 50 px blocks searched over ±20 px,
//! and the local smoothness filter disabled.

use crate::mesh::SpringMeshParams;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Geometry and quality thresholds forwarded to the correlation engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockMatchParams {
    /// Scale of the matching level relative to full resolution.
    pub layer_scale: f64,
    /// Matching block radius (full-resolution pixels).
    pub block_radius: u32,
    /// Search window radius (pixels).
    pub search_radius: u32,
    /// Minimum correlation coefficient for an accepted match.
    pub min_r: f64,
    /// Maximum curvature ratio of the correlation peak.
    pub max_curvature_r: f64,
    /// Rod's ratio between the best and second best peak.
    pub rod_r: f64,
}

impl Default for BlockMatchParams {
    fn default() -> Self {
        Self {
            layer_scale: 0.5,
            block_radius: 50,
            search_radius: 20,
            min_r: 0.5,
            max_curvature_r: 10.0,
            rod_r: 0.9,
        }
    }
}

impl BlockMatchParams {
    /// Block radius actually used: never below 16 px at the matching scale.
    pub fn effective_block_radius(&self) -> u32 {
        if !(self.layer_scale.is_finite() && self.layer_scale > 0.0) {
            return self.block_radius;
        }
        let floor = (16.0 / self.layer_scale + 0.5).floor();
        if floor >= u32::MAX as f64 {
            return u32::MAX;
        }
        self.block_radius.max(floor as u32)
    }
}

/// Model family fitted by the local smoothness filter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocalModel {
    Translation,
    Rigid,
    Similarity,
    Affine,
}

impl LocalModel {
    /// Legacy numeric selector: 0 translation, 1 rigid, 2 similarity, 3 affine.
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Translation),
            1 => Some(Self::Rigid),
            2 => Some(Self::Similarity),
            3 => Some(Self::Affine),
            _ => None,
        }
    }

    /// Minimum number of weighted matches needed to fit the model.
    pub fn min_matches(self) -> usize {
        match self {
            Self::Translation => 1,
            Self::Rigid | Self::Similarity => 2,
            Self::Affine => 3,
        }
    }
}

/// Local smoothness filter settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalSmoothnessParams {
    pub model: LocalModel,
    /// Gaussian sigma (px) weighting neighbours by distance.
    pub region_sigma: f64,
    /// Absolute residual limit (px).
    pub max_local_epsilon: f64,
    /// Residual limit relative to the neighbourhood's mean residual.
    pub max_local_trust: f64,
}

impl Default for LocalSmoothnessParams {
    fn default() -> Self {
        Self {
            model: LocalModel::Rigid,
            region_sigma: 25.0,
            max_local_epsilon: 12.0,
            max_local_trust: 3.0,
        }
    }
}

/// Run-wide parameters of the pairwise matcher.
#[derive(Clone, Debug)]
pub struct MatchParams {
    /// Mipmap level whose images are matched.
    pub mipmap_level: u32,
    /// Tiles that never act as the moving side.
    pub fixed_tiles: BTreeSet<usize>,
    pub block: BlockMatchParams,
    pub mesh: SpringMeshParams,
    /// `None` disables the local smoothness filter.
    pub smoothness: Option<LocalSmoothnessParams>,
    /// Load and persist per-direction intermediate results.
    pub resume: bool,
    /// Worker-count hint forwarded to the correlation engine.
    pub workers: usize,
    /// Final output document; intermediate files are derived from it.
    pub target_path: PathBuf,
}

impl Default for MatchParams {
    fn default() -> Self {
        Self {
            mipmap_level: 0,
            fixed_tiles: BTreeSet::new(),
            block: BlockMatchParams::default(),
            mesh: SpringMeshParams::default(),
            smoothness: None,
            resume: false,
            workers: rayon::current_num_threads(),
            target_path: PathBuf::from("correspondences.json"),
        }
    }
}
