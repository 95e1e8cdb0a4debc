//! Elastic meshes used as block-matching sample points.
//!
//! A [`MeshProvider`] turns a tile into a [`Mesh`]. The built-in
//! [`SpringMeshProvider`] lays out the triangular vertex lattice of a spring
//! mesh at the matching scale; vertices are reported in full-resolution
//! tile-local pixels so they can be pushed through the tile's transform chain
//! directly. Spring dynamics (stiffness, damping, stretch) are carried along
//! for the downstream solver and are not simulated here.
//!
//! [`MeshCache`] builds one mesh per tile index, in parallel, before any pair
//! that references the tile is matched.
use crate::tiles::{TileRegistry, TileSpec};
use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq)]
#[error("tile {index}: cannot build mesh: {reason}")]
pub struct MeshError {
    pub index: usize,
    pub reason: String,
}

/// Spring mesh parameters, in matching-scale pixels.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpringMeshParams {
    pub spring_length: f64,
    pub stiffness: f64,
    pub damping: f64,
    pub max_stretch: f64,
}

impl Default for SpringMeshParams {
    fn default() -> Self {
        Self {
            spring_length: 100.0,
            stiffness: 0.1,
            damping: 0.9,
            max_stretch: 2000.0,
        }
    }
}

/// Vertex lattice over one tile.
#[derive(Clone, Debug, PartialEq)]
pub struct Mesh {
    /// Full-resolution tile extent.
    pub width: f64,
    pub height: f64,
    /// Tile-local vertex positions (full-resolution pixels).
    pub vertices: Vec<[f64; 2]>,
    pub params: SpringMeshParams,
}

pub trait MeshProvider: Sync {
    fn build(&self, index: usize, tile: &TileSpec) -> Result<Mesh, MeshError>;
}

#[derive(Clone, Debug)]
pub struct SpringMeshProvider {
    pub params: SpringMeshParams,
    /// Scale of the matching level relative to full resolution.
    pub layer_scale: f64,
}

impl SpringMeshProvider {
    pub fn new(params: SpringMeshParams, layer_scale: f64) -> Self {
        Self {
            params,
            layer_scale,
        }
    }
}

impl MeshProvider for SpringMeshProvider {
    fn build(&self, index: usize, tile: &TileSpec) -> Result<Mesh, MeshError> {
        let fail = |reason: String| MeshError { index, reason };
        if !tile.has_extent() {
            return Err(fail(format!(
                "unknown tile extent {}x{}",
                tile.width, tile.height
            )));
        }
        if !(self.layer_scale.is_finite() && self.layer_scale > 0.0) {
            return Err(fail(format!("invalid layer scale {}", self.layer_scale)));
        }
        if !(self.params.spring_length.is_finite() && self.params.spring_length > 0.0) {
            return Err(fail(format!(
                "invalid spring length {}",
                self.params.spring_length
            )));
        }
        let scaled_w = (tile.width * self.layer_scale).ceil();
        let scaled_h = (tile.height * self.layer_scale).ceil();
        let vertices = triangular_lattice(scaled_w, scaled_h, self.params.spring_length)
            .into_iter()
            .map(|[x, y]| [x / self.layer_scale, y / self.layer_scale])
            .collect();
        Ok(Mesh {
            width: tile.width,
            height: tile.height,
            vertices,
            params: self.params.clone(),
        })
    }
}

/// Rows alternate between `num_x` vertices on the grid and `num_x - 1`
/// vertices shifted by half a column, giving near-equilateral triangles.
fn triangular_lattice(width: f64, height: f64, spring_length: f64) -> Vec<[f64; 2]> {
    let num_x = ((width / spring_length).ceil() as usize + 1).max(2);
    let dx = width / (num_x - 1) as f64;
    let ideal_dy = dx * 3f64.sqrt() / 2.0;
    let num_y = ((height / ideal_dy).round() as usize + 1).max(2);
    let dy = height / (num_y - 1) as f64;

    let mut vertices = Vec::with_capacity(num_x * num_y);
    for row in 0..num_y {
        let y = row as f64 * dy;
        if row % 2 == 0 {
            vertices.extend((0..num_x).map(|i| [i as f64 * dx, y]));
        } else {
            vertices.extend((0..num_x - 1).map(|i| [(i as f64 + 0.5) * dx, y]));
        }
    }
    vertices
}

/// One mesh per tile index, shared read-only across pairs.
#[derive(Debug, Default)]
pub struct MeshCache {
    meshes: BTreeMap<usize, Result<Arc<Mesh>, MeshError>>,
}

impl MeshCache {
    pub fn build<I>(provider: &dyn MeshProvider, tiles: &TileRegistry, indices: I) -> Self
    where
        I: IntoIterator<Item = usize>,
    {
        let indices: Vec<usize> = indices.into_iter().collect();
        let meshes: BTreeMap<usize, Result<Arc<Mesh>, MeshError>> = indices
            .par_iter()
            .map(|&index| {
                let mesh = tiles
                    .get(index)
                    .map_err(|err| MeshError {
                        index,
                        reason: err.to_string(),
                    })
                    .and_then(|tile| provider.build(index, tile))
                    .map(Arc::new);
                (index, mesh)
            })
            .collect();
        debug!(
            "MeshCache: built {} meshes ({} failed)",
            meshes.len(),
            meshes.values().filter(|m| m.is_err()).count()
        );
        Self { meshes }
    }

    pub fn get(&self, index: usize) -> Result<Arc<Mesh>, MeshError> {
        match self.meshes.get(&index) {
            Some(entry) => entry.clone(),
            None => Err(MeshError {
                index,
                reason: "mesh was not built for this run".to_string(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::TransformSpec;

    fn tile(w: f64, h: f64) -> TileSpec {
        TileSpec::new(w, h, TransformSpec::list(Vec::new()))
    }

    #[test]
    fn lattice_covers_tile_corners() {
        let provider = SpringMeshProvider::new(SpringMeshParams::default(), 0.5);
        let mesh = provider.build(0, &tile(400.0, 300.0)).unwrap();
        // 200x150 at scale 0.5 with springs of 100 px -> 3 columns
        assert!(mesh.vertices.contains(&[0.0, 0.0]));
        assert!(mesh.vertices.contains(&[400.0, 0.0]));
        let max_y = mesh.vertices.iter().map(|v| v[1]).fold(0.0, f64::max);
        assert!((max_y - 300.0).abs() < 1e-9);
        assert!(mesh
            .vertices
            .iter()
            .all(|v| v[0] >= 0.0 && v[0] <= 400.0 && v[1] >= 0.0 && v[1] <= 300.0));
    }

    #[test]
    fn odd_rows_are_offset() {
        let v = triangular_lattice(200.0, 200.0, 100.0);
        let second_row_y = v.iter().map(|p| p[1]).find(|&y| y > 0.0).unwrap();
        let odd: Vec<_> = v.iter().filter(|p| p[1] == second_row_y).collect();
        assert_eq!(odd.len(), 2);
        assert_eq!(odd[0][0], 50.0);
    }

    #[test]
    fn unknown_extent_fails_only_that_tile() {
        let tiles = TileRegistry::new(vec![tile(100.0, 100.0), tile(-1.0, -1.0)]);
        let provider = SpringMeshProvider::new(SpringMeshParams::default(), 1.0);
        let cache = MeshCache::build(&provider, &tiles, [0, 1, 7]);
        assert_eq!(cache.len(), 3);
        assert!(cache.get(0).is_ok());
        assert_eq!(cache.get(1).unwrap_err().index, 1);
        assert!(cache.get(7).unwrap_err().reason.contains("out of range"));
        assert!(cache.get(3).is_err());
    }
}
