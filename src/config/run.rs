use super::matching::{BlockMatchConfig, MeshConfig, SmoothnessConfig};
use super::{resolve_path, ConfigError};
use crate::diagnostics::{write_report, PersistenceFailure};
use crate::matching::{
    check_pair_indices, parse_pairs, CorrelationEngine, MatchParams, MatchRun, PairMatcher,
    PairTask, PipelineError,
};
use crate::tiles::{load_shared_transforms, TileRegistry};
use log::{debug, warn};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// JSON run configuration of the pairwise matcher.
///
/// ```json
/// {
///   "tiles": "section_12/tiles.json",
///   "transforms": "section_12/lens.json",
///   "targetPath": "out/section_12.json",
///   "pairs": ["0:1", "1:2"],
///   "fixedTiles": [0],
///   "resume": true,
///   "matching": { "layerScale": 0.25, "searchRadius": 30 },
///   "smoothness": { "enabled": true, "model": "rigid" }
/// }
/// ```
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRunConfig {
    /// JSON array of tile specs.
    pub tiles: PathBuf,
    /// Optional JSON array of shared, identified transform specs.
    #[serde(default)]
    pub transforms: Option<PathBuf>,
    pub target_path: PathBuf,
    pub pairs: Vec<String>,
    #[serde(default)]
    pub fixed_tiles: BTreeSet<usize>,
    #[serde(default)]
    pub mipmap_level: u32,
    #[serde(default)]
    pub resume: bool,
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default)]
    pub matching: BlockMatchConfig,
    #[serde(default)]
    pub mesh: MeshConfig,
    #[serde(default)]
    pub smoothness: SmoothnessConfig,
    /// Where to write the run report, if anywhere.
    #[serde(default)]
    pub report: Option<PathBuf>,
}

impl MatchRunConfig {
    /// Make relative paths relative to `base_dir`.
    pub fn rebase(&mut self, base_dir: &Path) {
        self.tiles = resolve_path(base_dir, &self.tiles);
        self.target_path = resolve_path(base_dir, &self.target_path);
        if let Some(p) = &mut self.transforms {
            *p = resolve_path(base_dir, p);
        }
        if let Some(p) = &mut self.report {
            *p = resolve_path(base_dir, p);
        }
    }

    pub fn match_params(&self) -> Result<MatchParams, ConfigError> {
        let invalid = |reason: String| ConfigError::Invalid { reason };
        let workers = match self.workers {
            Some(0) => return Err(invalid("workers must be at least 1".to_string())),
            Some(n) => n,
            None => rayon::current_num_threads(),
        };
        Ok(MatchParams {
            mipmap_level: self.mipmap_level,
            fixed_tiles: self.fixed_tiles.clone(),
            block: self.matching.resolve().map_err(invalid)?,
            mesh: self.mesh.resolve().map_err(invalid)?,
            smoothness: self.smoothness.resolve().map_err(invalid)?,
            resume: self.resume,
            workers,
            target_path: self.target_path.clone(),
        })
    }
}

/// Everything a run needs, loaded and checked up front.
#[derive(Clone, Debug)]
pub struct RunInputs {
    pub tiles: TileRegistry,
    pub pairs: Vec<PairTask>,
    pub params: MatchParams,
    /// Tiles whose transform chain does not validate; their directions fail.
    pub invalid_tiles: Vec<usize>,
}

impl RunInputs {
    pub fn load(config: &MatchRunConfig) -> Result<Self, PipelineError> {
        let params = config.match_params()?;
        let pairs = parse_pairs(config.pairs.as_slice())?;
        let mut tiles = TileRegistry::load_json(&config.tiles)?;
        if let Some(path) = &config.transforms {
            let specs = load_shared_transforms(path)?;
            debug!("RunInputs: {} shared transforms from {}", specs.len(), path.display());
            tiles.resolve_references(&specs);
        }
        check_pair_indices(&tiles, &pairs)?;

        let mut invalid_tiles = Vec::new();
        for (index, tile) in tiles.tiles().iter().enumerate() {
            if let Err(err) = tile.transforms.validate() {
                warn!("tile {index}: {err}");
                invalid_tiles.push(index);
            }
        }
        Ok(Self {
            tiles,
            pairs,
            params,
            invalid_tiles,
        })
    }
}

/// Load inputs, match every pair and write the output (and report, if
/// configured).
pub fn run_config(
    config: &MatchRunConfig,
    engine: Box<dyn CorrelationEngine>,
) -> Result<MatchRun, PipelineError> {
    let inputs = RunInputs::load(config)?;
    let matcher = PairMatcher::new(inputs.params, engine);
    let mut run = matcher.run(&inputs.tiles, &inputs.pairs)?;
    if let Some(path) = &config.report {
        if let Err(reason) = write_report(path, &run.report) {
            warn!("{reason}");
            run.report.record_persistence_failure(PersistenceFailure {
                path: path.display().to_string(),
                reason,
                direction: None,
            });
        }
    }
    Ok(run)
}
