//! Transform specification resolution engine.
//!
//! Overview
//! - [`spec`] – the declarative `leaf | ref | list` tree, reference
//!   resolution against an id → spec map, flattening and validation.
//! - [`model`] – primitive 2D models parsed from `className`/`dataString`.
//! - [`instance`] – executable transform chains built from resolved specs.
//! - `memo` – build-once cell backing [`TransformSpec::instance`].
//!
//! Key Ideas
//! - Specs are shared by reference (`ref` nodes) so large mosaics can point
//!   many tiles at a handful of calibration transforms. Resolution may run
//!   repeatedly against partial maps; whatever is still missing is reported
//!   by id.
//! - The built instance is memoized per node and only dropped by an explicit
//!   [`TransformSpec::clear_instance`].

pub mod instance;
mod memo;
pub mod model;
pub mod spec;

use std::collections::BTreeSet;
use thiserror::Error;

pub use instance::{CoordinateTransform, TransformInstance};
pub use memo::InstanceState;
pub use model::{Model2D, ModelKind};
pub use spec::{spec_map_from_list, SpecKind, TransformSpec, TransformSpecMetaData};

/// Failures raised while resolving, validating or building transforms.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum TransformError {
    #[error("spec '{spec_id}' has the following unresolved references: {ids:?}")]
    UnresolvedReferences {
        spec_id: String,
        ids: BTreeSet<String>,
    },
    #[error("invalid transform spec '{spec_id}': {reason}")]
    InvalidSpec { spec_id: String, reason: String },
    #[error("transform is not invertible: {0}")]
    NotInvertible(String),
    #[error("duplicate transform spec id '{0}'")]
    DuplicateId(String),
}
