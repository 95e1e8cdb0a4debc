use crate::matching::{BlockMatchParams, LocalModel, LocalSmoothnessParams};
use crate::mesh::SpringMeshParams;
use serde::Deserialize;

/// Overrides for [`BlockMatchParams`]; unset fields keep the defaults.
#[derive(Clone, Debug, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct BlockMatchConfig {
    pub layer_scale: Option<f64>,
    pub block_radius: Option<u32>,
    pub search_radius: Option<u32>,
    pub min_r: Option<f64>,
    pub max_curvature_r: Option<f64>,
    pub rod_r: Option<f64>,
}

impl BlockMatchConfig {
    pub fn resolve(&self) -> Result<BlockMatchParams, String> {
        let mut p = BlockMatchParams::default();
        if let Some(v) = self.layer_scale {
            p.layer_scale = v;
        }
        if let Some(v) = self.block_radius {
            p.block_radius = v;
        }
        if let Some(v) = self.search_radius {
            p.search_radius = v;
        }
        if let Some(v) = self.min_r {
            p.min_r = v;
        }
        if let Some(v) = self.max_curvature_r {
            p.max_curvature_r = v;
        }
        if let Some(v) = self.rod_r {
            p.rod_r = v;
        }
        if !(p.layer_scale.is_finite() && p.layer_scale > 0.0 && p.layer_scale <= 1.0) {
            return Err(format!("matching.layerScale must be in (0, 1], got {}", p.layer_scale));
        }
        Ok(p)
    }
}

#[derive(Clone, Debug, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct MeshConfig {
    pub spring_length: Option<f64>,
    pub stiffness: Option<f64>,
    pub damping: Option<f64>,
    pub max_stretch: Option<f64>,
}

impl MeshConfig {
    pub fn resolve(&self) -> Result<SpringMeshParams, String> {
        let mut p = SpringMeshParams::default();
        if let Some(v) = self.spring_length {
            p.spring_length = v;
        }
        if let Some(v) = self.stiffness {
            p.stiffness = v;
        }
        if let Some(v) = self.damping {
            p.damping = v;
        }
        if let Some(v) = self.max_stretch {
            p.max_stretch = v;
        }
        if !(p.spring_length.is_finite() && p.spring_length > 0.0) {
            return Err(format!("mesh.springLength must be positive, got {}", p.spring_length));
        }
        Ok(p)
    }
}

/// Smoothness model given by name (`"rigid"`) or legacy index (`1`).
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ModelSelector {
    Index(usize),
    Name(LocalModel),
}

#[derive(Clone, Debug, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct SmoothnessConfig {
    pub enabled: Option<bool>,
    pub model: Option<ModelSelector>,
    pub region_sigma: Option<f64>,
    pub max_local_epsilon: Option<f64>,
    pub max_local_trust: Option<f64>,
}

impl SmoothnessConfig {
    /// `None` when the filter is disabled (the default).
    pub fn resolve(&self) -> Result<Option<LocalSmoothnessParams>, String> {
        if !self.enabled.unwrap_or(false) {
            return Ok(None);
        }
        let mut p = LocalSmoothnessParams::default();
        match self.model {
            Some(ModelSelector::Name(model)) => p.model = model,
            Some(ModelSelector::Index(index)) => {
                p.model = LocalModel::from_index(index)
                    .ok_or_else(|| format!("smoothness.model index {index} is not in 0..=3"))?;
            }
            None => {}
        }
        if let Some(v) = self.region_sigma {
            p.region_sigma = v;
        }
        if let Some(v) = self.max_local_epsilon {
            p.max_local_epsilon = v;
        }
        if let Some(v) = self.max_local_trust {
            p.max_local_trust = v;
        }
        if !(p.region_sigma.is_finite() && p.region_sigma > 0.0) {
            return Err(format!(
                "smoothness.regionSigma must be positive, got {}",
                p.region_sigma
            ));
        }
        Ok(Some(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sections_resolve_to_defaults() {
        assert_eq!(
            BlockMatchConfig::default().resolve().unwrap(),
            BlockMatchParams::default()
        );
        assert_eq!(
            MeshConfig::default().resolve().unwrap(),
            SpringMeshParams::default()
        );
        assert_eq!(SmoothnessConfig::default().resolve().unwrap(), None);
    }

    #[test]
    fn smoothness_model_by_name_or_index() {
        let by_name: SmoothnessConfig =
            serde_json::from_str(r#"{ "enabled": true, "model": "affine" }"#).unwrap();
        assert_eq!(by_name.resolve().unwrap().unwrap().model, LocalModel::Affine);

        let by_index: SmoothnessConfig =
            serde_json::from_str(r#"{ "enabled": true, "model": 0, "regionSigma": 40 }"#).unwrap();
        let p = by_index.resolve().unwrap().unwrap();
        assert_eq!(p.model, LocalModel::Translation);
        assert_eq!(p.region_sigma, 40.0);

        let bad: SmoothnessConfig =
            serde_json::from_str(r#"{ "enabled": true, "model": 9 }"#).unwrap();
        assert!(bad.resolve().is_err());
    }

    #[test]
    fn layer_scale_is_bounded() {
        let cfg: BlockMatchConfig = serde_json::from_str(r#"{ "layerScale": 0 }"#).unwrap();
        assert!(cfg.resolve().is_err());
    }
}
