//! Pairwise correspondence pipeline.
//!
//! [`PairMatcher`] walks the requested tile pairs in order. For every pair it
//! handles both directions (`a → b`, then `b → a`): directions whose moving
//! tile is fixed are skipped, persisted results are reused when resuming, and
//! the rest go through the correlation engine, the optional smoothness filter
//! and projection into mosaic space.
//!
//! ```no_run
//! use mosaic_align::matching::{CorrelationEngine, MatchParams, PairMatcher};
//! use mosaic_align::tiles::TileRegistry;
//!
//! # fn example(engine: Box<dyn CorrelationEngine>, tiles: TileRegistry) {
//! let matcher = PairMatcher::new(MatchParams::default(), engine);
//! let run = matcher.run_tokens(&tiles, &["0:1", "1:2"]).unwrap();
//! println!("{}", run.report.summary());
//! # }
//! ```
use super::aggregate::{collect_records, project_matches, write_correspondences, ProjectionError};
use super::engine::{CorrelationEngine, EngineError, MatchRequest};
use super::intermediate::IntermediateStore;
use super::pairs::{parse_pairs, DirectedPair, PairParseError, PairTask, TaskTable};
use super::params::MatchParams;
use super::smoothness::local_smoothness_filter;
use crate::config::ConfigError;
use crate::diagnostics::{
    elapsed_ms, MatchRunReport, PairFailure, PersistenceFailure, TimingBreakdown,
};
use crate::image::{FileImageSource, GrayImageU8, ImageError, ImageSource};
use crate::mesh::{MeshCache, MeshError, MeshProvider, SpringMeshProvider};
use crate::tiles::{TileError, TileRegistry};
use crate::transform::TransformError;
use crate::types::CorrespondencePair;
use log::{debug, info, warn};
use std::collections::BTreeSet;
use std::time::Instant;
use thiserror::Error;

/// Failures that stop a run before any matching happens.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Tiles(#[from] TileError),
    #[error(transparent)]
    MalformedPair(#[from] PairParseError),
    #[error("pair {pair} references tile {index}, but only {count} tiles are loaded")]
    TileIndex {
        pair: PairTask,
        index: usize,
        count: usize,
    },
}

/// Why a single direction produced no record.
#[derive(Debug, Error)]
pub enum DirectionError {
    #[error(transparent)]
    Image(#[from] ImageError),
    #[error(transparent)]
    Tile(#[from] TileError),
    #[error(transparent)]
    Mesh(#[from] MeshError),
    #[error(transparent)]
    Transform(#[from] TransformError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Projection(#[from] ProjectionError),
}

/// Records in output order plus the run report.
#[derive(Clone, Debug)]
pub struct MatchRun {
    pub records: Vec<CorrespondencePair>,
    pub report: MatchRunReport,
}

/// Images of both tiles of a pair, loaded once and shared by its directions.
struct PairImages {
    a: usize,
    image_a: GrayImageU8,
    image_b: GrayImageU8,
}

impl PairImages {
    fn get(&self, index: usize) -> &GrayImageU8 {
        if index == self.a {
            &self.image_a
        } else {
            &self.image_b
        }
    }
}

/// Per-run mutable state threaded through pair processing.
struct RunState {
    table: TaskTable,
    store: Option<IntermediateStore>,
    report: MatchRunReport,
}

pub struct PairMatcher {
    params: MatchParams,
    engine: Box<dyn CorrelationEngine>,
    meshes: Box<dyn MeshProvider>,
    images: Box<dyn ImageSource>,
}

impl PairMatcher {
    /// Matcher with the spring mesh provider and local file images.
    pub fn new(params: MatchParams, engine: Box<dyn CorrelationEngine>) -> Self {
        let meshes = SpringMeshProvider::new(params.mesh.clone(), params.block.layer_scale);
        Self {
            params,
            engine,
            meshes: Box::new(meshes),
            images: Box::new(FileImageSource),
        }
    }

    pub fn with_mesh_provider(mut self, meshes: Box<dyn MeshProvider>) -> Self {
        self.meshes = meshes;
        self
    }

    pub fn with_image_source(mut self, images: Box<dyn ImageSource>) -> Self {
        self.images = images;
        self
    }

    pub fn params(&self) -> &MatchParams {
        &self.params
    }

    /// Parse `"a:b"` tokens and run; malformed tokens fail before any work.
    pub fn run_tokens<S: AsRef<str>>(
        &self,
        tiles: &TileRegistry,
        tokens: &[S],
    ) -> Result<MatchRun, PipelineError> {
        let pairs = parse_pairs(tokens)?;
        self.run(tiles, &pairs)
    }

    /// Compute every pair, then write the output list to the target path.
    ///
    /// A failed output write is recorded in the report (which is flagged
    /// degraded); the records are still returned.
    pub fn run(&self, tiles: &TileRegistry, pairs: &[PairTask]) -> Result<MatchRun, PipelineError> {
        let mut run = self.compute(tiles, pairs)?;
        let output_start = Instant::now();
        let target = &self.params.target_path;
        match write_correspondences(target, &run.records) {
            Ok(true) => info!(
                "wrote {} correspondence records to {}",
                run.records.len(),
                target.display()
            ),
            Ok(false) => info!("no correspondences to write, {} left untouched", target.display()),
            Err(reason) => {
                warn!("{reason}");
                run.report.record_persistence_failure(PersistenceFailure {
                    path: target.display().to_string(),
                    reason,
                    direction: None,
                });
            }
        }
        let output_ms = elapsed_ms(output_start);
        run.report.timings.push("output", output_ms);
        run.report.timings.total_ms += output_ms;
        Ok(run)
    }

    /// Compute every pair without writing the output list.
    pub fn compute(&self, tiles: &TileRegistry, pairs: &[PairTask]) -> Result<MatchRun, PipelineError> {
        check_pair_indices(tiles, pairs)?;
        let total_start = Instant::now();
        debug!(
            "PairMatcher::compute start pairs={} tiles={} level={} resume={}",
            pairs.len(),
            tiles.len(),
            self.params.mipmap_level,
            self.params.resume
        );

        let mut timings = TimingBreakdown::default();
        let mesh_start = Instant::now();
        let mesh_tiles: BTreeSet<usize> = pairs
            .iter()
            .flat_map(|p| [p.a, p.b])
            .filter(|i| !self.params.fixed_tiles.contains(i))
            .collect();
        let meshes = MeshCache::build(self.meshes.as_ref(), tiles, mesh_tiles);
        timings.push_since("meshes", mesh_start);

        let match_start = Instant::now();
        let mut state = RunState {
            table: TaskTable::default(),
            store: self
                .params
                .resume
                .then(|| IntermediateStore::new(&self.params.target_path)),
            report: MatchRunReport {
                pairs: pairs.len(),
                ..Default::default()
            },
        };
        for pair in pairs {
            self.process_pair(*pair, tiles, &meshes, &mut state);
        }
        timings.push_since("matching", match_start);

        let (records, directions) = collect_records(pairs, &state.table);
        let mut report = state.report;
        report.directions = directions;
        timings.total_ms = elapsed_ms(total_start);
        report.timings = timings;
        info!("PairMatcher: {}", report.summary());
        Ok(MatchRun { records, report })
    }

    fn process_pair(
        &self,
        pair: PairTask,
        tiles: &TileRegistry,
        meshes: &MeshCache,
        state: &mut RunState,
    ) {
        let level = self.params.mipmap_level;
        let mut todo: Vec<DirectedPair> = Vec::with_capacity(2);
        for d in pair.directions() {
            if state.table.contains(d) || todo.contains(&d) {
                debug!("PairMatcher: {d} already handled in this run");
                continue;
            }
            if self.params.fixed_tiles.contains(&d.moving) {
                info!("Skipping fixed tile {} ({d})", d.moving);
                let record = CorrespondencePair::new(
                    level,
                    tiles.image_locator(d.moving, level).unwrap_or_default(),
                    tiles.image_locator(d.stationary, level).unwrap_or_default(),
                    Vec::new(),
                );
                state.table.mark_skipped(d, record);
                continue;
            }
            if let Some(store) = &state.store {
                match store.load(d) {
                    Ok(Some(record)) => {
                        info!(
                            "loaded {} matches for {d} from {}",
                            record.len(),
                            store.path_for(d).display()
                        );
                        state.table.mark_loaded(d, record);
                        continue;
                    }
                    Ok(None) => {}
                    Err(err) => warn!("{err}; recomputing {d}"),
                }
            }
            todo.push(d);
        }
        if todo.is_empty() {
            return;
        }

        let images = match self.load_images(pair, tiles) {
            Ok(images) => images,
            Err(err) => {
                warn!("pair {pair}: {err}");
                state.report.pair_failures.push(PairFailure {
                    a: pair.a,
                    b: pair.b,
                    reason: err.to_string(),
                });
                for d in todo {
                    state.table.mark_failed(d, err.to_string());
                }
                return;
            }
        };

        for d in todo {
            match self.compute_direction(d, tiles, meshes, &images) {
                Ok((record, candidates)) => {
                    if let Some(store) = &state.store {
                        if let Err(err) = store.save(d, &record) {
                            warn!("{err}");
                            state
                                .report
                                .record_persistence_failure(PersistenceFailure {
                                    path: store.path_for(d).display().to_string(),
                                    reason: err.to_string(),
                                    direction: Some([d.moving, d.stationary]),
                                });
                        }
                    }
                    state.table.mark_computed(d, record, candidates);
                }
                Err(err) => {
                    warn!("{d}: {err}");
                    state.table.mark_failed(d, err.to_string());
                }
            }
        }
    }

    fn load_images(&self, pair: PairTask, tiles: &TileRegistry) -> Result<PairImages, DirectionError> {
        let level = self.params.mipmap_level;
        let load = |index: usize| -> Result<GrayImageU8, DirectionError> {
            let locator = tiles.image_locator(index, level)?;
            debug!("PairMatcher: loading tile {index} image {locator}");
            Ok(self.images.load(locator)?)
        };
        let image_a = load(pair.a)?;
        let image_b = if pair.b == pair.a {
            image_a.clone()
        } else {
            load(pair.b)?
        };
        Ok(PairImages {
            a: pair.a,
            image_a,
            image_b,
        })
    }

    fn compute_direction(
        &self,
        d: DirectedPair,
        tiles: &TileRegistry,
        meshes: &MeshCache,
        images: &PairImages,
    ) -> Result<(CorrespondencePair, usize), DirectionError> {
        let level = self.params.mipmap_level;
        let mesh = meshes.get(d.moving)?;
        let moving_chain = tiles.transform_chain(d.moving)?;
        let stationary_chain = tiles.transform_chain(d.stationary)?;
        let to_stationary = moving_chain.then(&stationary_chain.inverse()?);

        let request = MatchRequest {
            moving_tile: d.moving,
            stationary_tile: d.stationary,
            moving: images.get(d.moving).as_view(),
            stationary: images.get(d.stationary).as_view(),
            transform: &to_stationary,
            vertices: &mesh.vertices,
            params: &self.params.block,
            block_radius: self.params.block.effective_block_radius(),
            workers: self.params.workers,
        };
        let raw = self.engine.match_blocks(&request)?;
        let candidates = raw.len();
        let kept = match &self.params.smoothness {
            Some(smoothness) => local_smoothness_filter(&raw, smoothness),
            None => raw,
        };
        let matches = project_matches(&kept, &*moving_chain, &*stationary_chain)?;
        info!(
            "{d}: {} matches ({} candidates, {} vertices)",
            matches.len(),
            candidates,
            mesh.vertices.len()
        );
        let record = CorrespondencePair::new(
            level,
            tiles.image_locator(d.moving, level)?,
            tiles.image_locator(d.stationary, level)?,
            matches,
        );
        Ok((record, candidates))
    }
}

/// Every pair index must address a loaded tile.
pub fn check_pair_indices(tiles: &TileRegistry, pairs: &[PairTask]) -> Result<(), PipelineError> {
    let count = tiles.len();
    for pair in pairs {
        for index in [pair.a, pair.b] {
            if index >= count {
                return Err(PipelineError::TileIndex {
                    pair: *pair,
                    index,
                    count,
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_errors_keep_the_source_message() {
        let source = TransformError::NotInvertible("affine model at chain position 1 is singular".into());
        let err = DirectionError::from(source.clone());
        assert_eq!(err.to_string(), source.to_string());
    }
}
