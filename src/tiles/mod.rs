//! Tile registry: tile specs, their transform chains and image locators.
//!
//! Tiles are addressed by their position in the input list for the duration of
//! a run. The JSON layout follows the render toolchain's tile specs:
//!
//! ```json
//! {
//!   "tileId": "150311.0",
//!   "width": 2048.0, "height": 2048.0,
//!   "mipmapLevels": { "0": { "imageUrl": "file:///data/150311.png" } },
//!   "transforms": { "type": "list", "specList": [ { "type": "ref", "refId": "lens" } ] }
//! }
//! ```
use crate::image::io::read_json_file;
use crate::transform::{spec_map_from_list, TransformError, TransformInstance, TransformSpec};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum TileError {
    #[error("failed to load {path}: {reason}")]
    Load { path: PathBuf, reason: String },
    #[error("tile index {index} out of range ({count} tiles)")]
    IndexOutOfRange { index: usize, count: usize },
    #[error("tile {index} has no image for mipmap level {level}")]
    MissingMipmap { index: usize, level: u32 },
    #[error("tile {index}: {source}")]
    Transform {
        index: usize,
        #[source]
        source: TransformError,
    },
    #[error("shared transforms {path}: {source}")]
    SharedTransforms {
        path: PathBuf,
        #[source]
        source: TransformError,
    },
}

/// Image (and optional mask) for one mipmap level.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MipmapEntry {
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask_url: Option<String>,
}

fn empty_transform_list() -> TransformSpec {
    TransformSpec::list(Vec::new())
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tile_id: Option<String>,
    /// Full-resolution width in pixels (`<= 0` when unknown).
    #[serde(default = "unknown_extent")]
    pub width: f64,
    #[serde(default = "unknown_extent")]
    pub height: f64,
    /// Level key is the decimal mipmap level, e.g. `"0"`.
    #[serde(default)]
    pub mipmap_levels: BTreeMap<String, MipmapEntry>,
    #[serde(default = "empty_transform_list")]
    pub transforms: TransformSpec,
}

fn unknown_extent() -> f64 {
    -1.0
}

impl TileSpec {
    pub fn new(width: f64, height: f64, transforms: TransformSpec) -> Self {
        Self {
            tile_id: None,
            width,
            height,
            mipmap_levels: BTreeMap::new(),
            transforms,
        }
    }

    pub fn with_tile_id(mut self, tile_id: impl Into<String>) -> Self {
        self.tile_id = Some(tile_id.into());
        self
    }

    pub fn with_image(mut self, level: u32, image_url: impl Into<String>) -> Self {
        self.mipmap_levels.insert(
            level.to_string(),
            MipmapEntry {
                image_url: image_url.into(),
                mask_url: None,
            },
        );
        self
    }

    pub fn image_url(&self, level: u32) -> Option<&str> {
        self.mipmap_levels
            .get(&level.to_string())
            .map(|entry| entry.image_url.as_str())
    }

    pub fn has_extent(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

/// Ordered tile list for one mosaic section.
#[derive(Clone, Debug, Default)]
pub struct TileRegistry {
    tiles: Vec<TileSpec>,
}

impl TileRegistry {
    pub fn new(tiles: Vec<TileSpec>) -> Self {
        Self { tiles }
    }

    /// Read a JSON array of tile specs.
    pub fn load_json(path: &Path) -> Result<Self, TileError> {
        let tiles: Vec<TileSpec> = read_json_file(path).map_err(|reason| TileError::Load {
            path: path.to_path_buf(),
            reason,
        })?;
        debug!("TileRegistry: loaded {} tiles from {}", tiles.len(), path.display());
        Ok(Self::new(tiles))
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn tiles(&self) -> &[TileSpec] {
        &self.tiles
    }

    pub fn get(&self, index: usize) -> Result<&TileSpec, TileError> {
        self.tiles.get(index).ok_or(TileError::IndexOutOfRange {
            index,
            count: self.tiles.len(),
        })
    }

    /// Resolve every tile's references against `specs`.
    pub fn resolve_references(&mut self, specs: &HashMap<String, TransformSpec>) {
        for tile in &mut self.tiles {
            tile.transforms.resolve_references(specs);
        }
    }

    /// Union of unresolved reference ids across all tiles.
    pub fn unresolved_ids(&self) -> BTreeSet<String> {
        let mut ids = BTreeSet::new();
        for tile in &self.tiles {
            tile.transforms.add_unresolved_ids(&mut ids);
        }
        ids
    }

    /// Validate every tile's transform chain, reporting the first failure.
    pub fn validate(&self) -> Result<(), TileError> {
        for (index, tile) in self.tiles.iter().enumerate() {
            tile.transforms
                .validate()
                .map_err(|source| TileError::Transform { index, source })?;
        }
        Ok(())
    }

    /// Memoized local → mosaic transform of tile `index`.
    pub fn transform_chain(&self, index: usize) -> Result<Arc<TransformInstance>, TileError> {
        self.get(index)?
            .transforms
            .instance()
            .map_err(|source| TileError::Transform { index, source })
    }

    pub fn image_locator(&self, index: usize, level: u32) -> Result<&str, TileError> {
        self.get(index)?
            .image_url(level)
            .ok_or(TileError::MissingMipmap { index, level })
    }
}

/// Read a JSON array of identified transform specs into a resolution map.
pub fn load_shared_transforms(path: &Path) -> Result<HashMap<String, TransformSpec>, TileError> {
    let specs: Vec<TransformSpec> = read_json_file(path).map_err(|reason| TileError::Load {
        path: path.to_path_buf(),
        reason,
    })?;
    spec_map_from_list(specs).map_err(|source| TileError::SharedTransforms {
        path: path.to_path_buf(),
        source,
    })
}
