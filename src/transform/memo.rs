//! Lazily built, memoized transform instance attached to each spec node.
use super::instance::TransformInstance;
use super::TransformError;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Observable state of a spec's memoized instance.
#[derive(Debug)]
pub enum InstanceState<'a> {
    Unbuilt,
    Built(&'a Arc<TransformInstance>),
    Failed(&'a TransformError),
}

impl InstanceState<'_> {
    pub fn is_built(&self) -> bool {
        matches!(self, InstanceState::Built(_))
    }
}

/// Build-once cell. A failed build is sticky until [`InstanceCell::clear`].
#[derive(Clone, Default)]
pub(crate) struct InstanceCell {
    cell: OnceLock<Result<Arc<TransformInstance>, TransformError>>,
}

impl InstanceCell {
    pub(crate) fn get_or_build<F>(&self, build: F) -> Result<Arc<TransformInstance>, TransformError>
    where
        F: FnOnce() -> Result<TransformInstance, TransformError>,
    {
        self.cell.get_or_init(|| build().map(Arc::new)).clone()
    }

    pub(crate) fn state(&self) -> InstanceState<'_> {
        match self.cell.get() {
            None => InstanceState::Unbuilt,
            Some(Ok(instance)) => InstanceState::Built(instance),
            Some(Err(err)) => InstanceState::Failed(err),
        }
    }

    pub(crate) fn clear(&mut self) {
        self.cell.take();
    }
}

// Cached state never participates in spec equality.
impl PartialEq for InstanceCell {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl fmt::Debug for InstanceCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.state() {
            InstanceState::Unbuilt => "unbuilt",
            InstanceState::Built(_) => "built",
            InstanceState::Failed(_) => "failed",
        };
        f.write_str(label)
    }
}
