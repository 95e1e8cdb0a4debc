//! Executable coordinate transforms built from resolved specifications.
use super::model::Model2D;
use super::TransformError;
use crate::homography::apply_homography_points;
use nalgebra::Matrix3;

/// Anything that maps a 2D point to another 2D point.
///
/// `None` signals that the point has no image under the transform (e.g. it
/// falls on the line at infinity of a projective model).
pub trait CoordinateTransform: Send + Sync {
    fn apply(&self, p: [f64; 2]) -> Option<[f64; 2]>;
}

/// Ordered chain of primitive models; the first model is applied first.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TransformInstance {
    models: Vec<Model2D>,
}

impl TransformInstance {
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn from_model(model: Model2D) -> Self {
        Self {
            models: vec![model],
        }
    }

    pub fn from_models(models: Vec<Model2D>) -> Self {
        Self { models }
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Append `other` so that it runs after the models already in `self`.
    pub fn concatenate(&mut self, other: &TransformInstance) {
        self.models.extend_from_slice(&other.models);
    }

    /// Chain that applies `self` and then `other`.
    pub fn then(&self, other: &TransformInstance) -> TransformInstance {
        let mut out = self.clone();
        out.concatenate(other);
        out
    }

    /// Inverse chain: models reversed, each inverted.
    pub fn inverse(&self) -> Result<TransformInstance, TransformError> {
        let models = self
            .models
            .iter()
            .rev()
            .enumerate()
            .map(|(idx, m)| {
                m.inverse().ok_or_else(|| {
                    TransformError::NotInvertible(format!(
                        "{:?} model at chain position {} is singular",
                        m.kind(),
                        self.models.len() - 1 - idx
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { models })
    }

    /// Collapse the chain into a single matrix `M_n · … · M_1`.
    pub fn matrix(&self) -> Matrix3<f64> {
        self.models
            .iter()
            .fold(Matrix3::identity(), |acc, m| m.matrix() * acc)
    }

    /// Map a batch of points through the collapsed chain.
    pub fn apply_points(&self, pts: &[[f64; 2]]) -> Option<Vec<[f64; 2]>> {
        apply_homography_points(&self.matrix(), pts)
    }
}

impl CoordinateTransform for TransformInstance {
    fn apply(&self, p: [f64; 2]) -> Option<[f64; 2]> {
        self.models.iter().try_fold(p, |q, m| m.apply(q))
    }
}
