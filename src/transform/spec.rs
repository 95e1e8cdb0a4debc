//! Declarative transform specifications and their reference resolution.
//!
//! A spec is one of three variants:
//! - `leaf`: a primitive model (`className` + `dataString`);
//! - `ref`: a named reference (`refId`) that is substituted from an
//!   id → spec map during resolution;
//! - `list`: an ordered composition (`specList`), first child applied first.
//!
//! Resolution is a recursive rewrite: each `ref` node clones its target out of
//! the caller's map and then resolves inside the clone. Missing ids are left
//! unresolved so that a caller can resolve again once more specs arrive.
use super::instance::TransformInstance;
use super::memo::{InstanceCell, InstanceState};
use super::model::{Model2D, ModelKind};
use super::TransformError;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

/// Free-form provenance attached to a spec.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformSpecMetaData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Variant payload, discriminated by the JSON `type` field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SpecKind {
    #[serde(rename = "leaf", rename_all = "camelCase")]
    Leaf {
        class_name: String,
        data_string: String,
    },
    #[serde(rename = "ref", rename_all = "camelCase")]
    Ref {
        ref_id: String,
        #[serde(skip)]
        resolved: Option<Box<TransformSpec>>,
    },
    #[serde(rename = "list", rename_all = "camelCase")]
    List { spec_list: Vec<TransformSpec> },
}

/// A transform specification node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransformSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(rename = "metaData", default, skip_serializing_if = "Option::is_none")]
    meta_data: Option<TransformSpecMetaData>,
    #[serde(flatten)]
    kind: SpecKind,
    #[serde(skip)]
    instance: InstanceCell,
}

impl TransformSpec {
    fn from_kind(kind: SpecKind) -> Self {
        Self {
            id: None,
            meta_data: None,
            kind,
            instance: InstanceCell::default(),
        }
    }

    pub fn leaf(class_name: impl Into<String>, data_string: impl Into<String>) -> Self {
        Self::from_kind(SpecKind::Leaf {
            class_name: class_name.into(),
            data_string: data_string.into(),
        })
    }

    /// Leaf spec for an already-parsed primitive model.
    pub fn from_model(model: &Model2D) -> Self {
        let m = model.matrix();
        let data = match model.kind() {
            ModelKind::Homography => m.transpose().iter().map(|v| v.to_string()).collect::<Vec<_>>(),
            _ => [m[(0, 0)], m[(1, 0)], m[(0, 1)], m[(1, 1)], m[(0, 2)], m[(1, 2)]]
                .iter()
                .map(|v| v.to_string())
                .collect(),
        };
        let kind = match model.kind() {
            ModelKind::Homography => ModelKind::Homography,
            _ => ModelKind::Affine,
        };
        Self::leaf(kind.class_name(), data.join(" "))
    }

    pub fn reference(ref_id: impl Into<String>) -> Self {
        Self::from_kind(SpecKind::Ref {
            ref_id: ref_id.into(),
            resolved: None,
        })
    }

    pub fn list(spec_list: Vec<TransformSpec>) -> Self {
        Self::from_kind(SpecKind::List { spec_list })
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// JSON discriminator of this node.
    pub fn type_name(&self) -> &'static str {
        match self.kind {
            SpecKind::Leaf { .. } => "leaf",
            SpecKind::Ref { .. } => "ref",
            SpecKind::List { .. } => "list",
        }
    }

    pub fn meta_data(&self) -> Option<&TransformSpecMetaData> {
        self.meta_data.as_ref()
    }

    pub fn kind(&self) -> &SpecKind {
        &self.kind
    }

    fn label(&self) -> String {
        match &self.id {
            Some(id) => id.clone(),
            None => format!("<unnamed {}>", self.type_name()),
        }
    }

    /// True when no reference below this node is left unsubstituted.
    pub fn is_fully_resolved(&self) -> bool {
        match &self.kind {
            SpecKind::Leaf { .. } => true,
            SpecKind::Ref { resolved, .. } => resolved
                .as_ref()
                .is_some_and(|target| target.is_fully_resolved()),
            SpecKind::List { spec_list } => spec_list.iter().all(TransformSpec::is_fully_resolved),
        }
    }

    /// Add every unresolved reference id reachable from this node.
    pub fn add_unresolved_ids(&self, into: &mut BTreeSet<String>) {
        match &self.kind {
            SpecKind::Leaf { .. } => {}
            SpecKind::Ref { ref_id, resolved } => match resolved {
                Some(target) => target.add_unresolved_ids(into),
                None => {
                    into.insert(ref_id.clone());
                }
            },
            SpecKind::List { spec_list } => {
                for spec in spec_list {
                    spec.add_unresolved_ids(into);
                }
            }
        }
    }

    pub fn unresolved_ids(&self) -> BTreeSet<String> {
        let mut ids = BTreeSet::new();
        self.add_unresolved_ids(&mut ids);
        ids
    }

    /// Substitute references from `specs`. Absent ids stay unresolved; calling
    /// again after full resolution changes nothing.
    pub fn resolve_references(&mut self, specs: &HashMap<String, TransformSpec>) {
        let mut path = Vec::new();
        self.resolve_with_path(specs, &mut path);
    }

    fn resolve_with_path(&mut self, specs: &HashMap<String, TransformSpec>, path: &mut Vec<String>) {
        match &mut self.kind {
            SpecKind::Leaf { .. } => {}
            SpecKind::Ref { ref_id, resolved } => {
                if path.contains(ref_id) {
                    debug!("TransformSpec: reference cycle through '{}' left unresolved", ref_id);
                    return;
                }
                if resolved.is_none() {
                    if let Some(target) = specs.get(ref_id.as_str()) {
                        *resolved = Some(Box::new(target.clone()));
                    }
                }
                if let Some(target) = resolved.as_mut() {
                    path.push(ref_id.clone());
                    target.resolve_with_path(specs, path);
                    path.pop();
                }
            }
            SpecKind::List { spec_list } => {
                for spec in spec_list.iter_mut() {
                    spec.resolve_with_path(specs, path);
                }
            }
        }
    }

    fn unresolved_error(&self, ids: BTreeSet<String>) -> TransformError {
        TransformError::UnresolvedReferences {
            spec_id: self.label(),
            ids,
        }
    }

    /// Append the primitive leaves of this spec, in application order.
    ///
    /// Fails without appending anything when a reference is unresolved.
    pub fn flatten(&self, into: &mut Vec<TransformSpec>) -> Result<(), TransformError> {
        let unresolved = self.unresolved_ids();
        if !unresolved.is_empty() {
            return Err(self.unresolved_error(unresolved));
        }
        self.flatten_resolved(into);
        Ok(())
    }

    fn flatten_resolved(&self, into: &mut Vec<TransformSpec>) {
        match &self.kind {
            SpecKind::Leaf { .. } => into.push(self.clone()),
            SpecKind::Ref {
                resolved: Some(target),
                ..
            } => target.flatten_resolved(into),
            // checked by `flatten`
            SpecKind::Ref { resolved: None, .. } => {}
            SpecKind::List { spec_list } => {
                for spec in spec_list {
                    spec.flatten_resolved(into);
                }
            }
        }
    }

    /// List spec holding the flattened leaves; keeps this spec's id.
    pub fn flattened(&self) -> Result<TransformSpec, TransformError> {
        let mut leaves = Vec::new();
        self.flatten(&mut leaves)?;
        let mut out = TransformSpec::list(leaves);
        out.id = self.id.clone();
        out.meta_data = self.meta_data.clone();
        Ok(out)
    }

    /// Check resolution, then build (or reuse) the instance.
    pub fn validate(&self) -> Result<(), TransformError> {
        if self.instance.state().is_built() {
            return Ok(());
        }
        self.instance().map(|_| ())
    }

    /// Memoized instance, built on first access.
    ///
    /// Unresolved specs are reported without touching the cache, so a later
    /// resolution pass can still build them.
    pub fn instance(&self) -> Result<Arc<TransformInstance>, TransformError> {
        if let InstanceState::Built(instance) = self.instance.state() {
            return Ok(Arc::clone(instance));
        }
        let unresolved = self.unresolved_ids();
        if !unresolved.is_empty() {
            return Err(self.unresolved_error(unresolved));
        }
        self.instance.get_or_build(|| self.build_instance())
    }

    pub fn instance_state(&self) -> InstanceState<'_> {
        self.instance.state()
    }

    /// Drop the memoized instance (or sticky failure) of this node only.
    pub fn clear_instance(&mut self) {
        self.instance.clear();
    }

    fn build_instance(&self) -> Result<TransformInstance, TransformError> {
        match &self.kind {
            SpecKind::Leaf {
                class_name,
                data_string,
            } => {
                let kind = ModelKind::from_class_name(class_name).ok_or_else(|| {
                    TransformError::InvalidSpec {
                        spec_id: self.label(),
                        reason: format!("unsupported transform class '{class_name}'"),
                    }
                })?;
                let model = Model2D::from_data_string(kind, data_string).map_err(|reason| {
                    TransformError::InvalidSpec {
                        spec_id: self.label(),
                        reason,
                    }
                })?;
                Ok(TransformInstance::from_model(model))
            }
            SpecKind::Ref {
                resolved: Some(target),
                ..
            } => target.instance().map(|instance| (*instance).clone()),
            SpecKind::Ref {
                ref_id,
                resolved: None,
            } => Err(self.unresolved_error(BTreeSet::from([ref_id.clone()]))),
            SpecKind::List { spec_list } => {
                let mut chain = TransformInstance::identity();
                for spec in spec_list {
                    let child = spec.instance()?;
                    chain.concatenate(&child);
                }
                Ok(chain)
            }
        }
    }
}

/// Index identified specs by id. Specs without an id are skipped.
pub fn spec_map_from_list(
    specs: Vec<TransformSpec>,
) -> Result<HashMap<String, TransformSpec>, TransformError> {
    let mut map = HashMap::with_capacity(specs.len());
    for spec in specs {
        let Some(id) = spec.id.clone() else {
            debug!("spec_map_from_list: skipping {} spec without id", spec.type_name());
            continue;
        };
        if map.insert(id.clone(), spec).is_some() {
            return Err(TransformError::DuplicateId(id));
        }
    }
    Ok(map)
}
