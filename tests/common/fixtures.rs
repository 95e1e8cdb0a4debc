use super::synthetic_image::checkerboard;
use mosaic_align::image::{GrayImageU8, ImageError, ImageSource};
use mosaic_align::matching::{CorrelationEngine, EngineError, MatchRequest, RawMatch};
use mosaic_align::tiles::{TileRegistry, TileSpec};
use mosaic_align::transform::{ModelKind, TransformSpec};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const TILE_SIZE: f64 = 100.0;
pub const TILE_STEP: f64 = 90.0;

pub fn locator(index: usize) -> String {
    format!("mem://tile{index}.png")
}

/// Tile `index` of a horizontal strip whose tiles start `step` px apart.
pub fn strip_tile(index: usize, step: f64) -> TileSpec {
    let offset = TransformSpec::leaf(
        ModelKind::Translation.class_name(),
        format!("{} 0", index as f64 * step),
    );
    TileSpec::new(TILE_SIZE, TILE_SIZE, TransformSpec::list(vec![offset]))
        .with_tile_id(format!("strip.{index}"))
        .with_image(0, locator(index))
}

/// Strip overlapping its neighbours by 10 px.
pub fn strip(count: usize) -> TileRegistry {
    strip_with_step(count, TILE_STEP)
}

pub fn strip_with_step(count: usize, step: f64) -> TileRegistry {
    TileRegistry::new((0..count).map(|i| strip_tile(i, step)).collect())
}

/// Engine that maps every mesh vertex exactly through the request transform
/// and keeps those landing inside the stationary tile.
#[derive(Clone, Default)]
pub struct StubEngine {
    pub calls: Arc<AtomicUsize>,
    pub seen: Arc<Mutex<Vec<(usize, usize)>>>,
    /// Moving tiles for which the engine reports a failure.
    pub fail_for: BTreeSet<usize>,
    /// Moving tile whose middle match is pushed off by `DISPLACEMENT` px in y.
    pub displaced: Option<usize>,
}

pub const DISPLACEMENT: f64 = 30.0;

impl StubEngine {
    pub fn failing_for(tiles: impl IntoIterator<Item = usize>) -> Self {
        Self {
            fail_for: tiles.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn displacing(tile: usize) -> Self {
        Self {
            displaced: Some(tile),
            ..Default::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn directions(&self) -> Vec<(usize, usize)> {
        self.seen.lock().unwrap().clone()
    }
}

impl CorrelationEngine for StubEngine {
    fn match_blocks(&self, request: &MatchRequest<'_>) -> Result<Vec<RawMatch>, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .unwrap()
            .push((request.moving_tile, request.stationary_tile));
        if self.fail_for.contains(&request.moving_tile) {
            return Err(EngineError(format!(
                "no correlation peak for tile {}",
                request.moving_tile
            )));
        }
        let mut matches: Vec<RawMatch> = request
            .vertices
            .iter()
            .filter_map(|&v| {
                let t = request.transform.apply(v)?;
                let inside = (0.0..=TILE_SIZE).contains(&t[0]) && (0.0..=TILE_SIZE).contains(&t[1]);
                inside.then_some(RawMatch {
                    source: v,
                    target: t,
                })
            })
            .collect();
        if self.displaced == Some(request.moving_tile) && !matches.is_empty() {
            let middle = matches.len() / 2;
            matches[middle].target[1] += DISPLACEMENT;
        }
        Ok(matches)
    }
}

/// Images held in memory, keyed by locator.
#[derive(Default)]
pub struct MemoryImages {
    pub images: HashMap<String, GrayImageU8>,
    pub loads: Arc<AtomicUsize>,
}

impl MemoryImages {
    /// Checkerboards for tiles `0..count` except `missing`.
    pub fn for_strip(count: usize, missing: &[usize]) -> Self {
        let images = (0..count)
            .filter(|i| !missing.contains(i))
            .map(|i| (locator(i), checkerboard(50, 50, 8)))
            .collect();
        Self {
            images,
            loads: Arc::default(),
        }
    }
}

impl ImageSource for MemoryImages {
    fn load(&self, locator: &str) -> Result<GrayImageU8, ImageError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.images.get(locator).cloned().ok_or_else(|| ImageError {
            locator: locator.to_string(),
            reason: "not in memory".to_string(),
        })
    }
}
