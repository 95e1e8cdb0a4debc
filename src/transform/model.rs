//! Primitive 2D models addressed by class name.
//!
//! Every supported model is stored as a 3×3 projective matrix so that chains
//! can be applied, inverted and collapsed uniformly. The parameter layout of
//! each `dataString` follows the render toolchain:
//!
//! | class                | parameters                          |
//! |----------------------|-------------------------------------|
//! | `TranslationModel2D` | `tx ty`                             |
//! | `RigidModel2D`       | `theta tx ty`                       |
//! | `SimilarityModel2D`  | `s theta tx ty`                     |
//! | `AffineModel2D`      | `m00 m10 m01 m11 m02 m12`           |
//! | `HomographyModel2D`  | `m00 m01 m02 m10 m11 m12 m20 m21 m22` |
use crate::homography::{apply_homography_point, invert_homography, normalize_homography};
use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

const MIN_DET: f64 = 1e-12;

/// Supported primitive model families.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Translation,
    Rigid,
    Similarity,
    Affine,
    Homography,
}

impl ModelKind {
    /// Match a (possibly fully qualified) class name on its last segment.
    pub fn from_class_name(class_name: &str) -> Option<Self> {
        let short = class_name.rsplit('.').next().unwrap_or(class_name).trim();
        match short {
            "TranslationModel2D" => Some(Self::Translation),
            "RigidModel2D" => Some(Self::Rigid),
            "SimilarityModel2D" => Some(Self::Similarity),
            "AffineModel2D" => Some(Self::Affine),
            "HomographyModel2D" => Some(Self::Homography),
            _ => None,
        }
    }

    pub fn class_name(self) -> &'static str {
        match self {
            Self::Translation => "mpicbg.trakem2.transform.TranslationModel2D",
            Self::Rigid => "mpicbg.trakem2.transform.RigidModel2D",
            Self::Similarity => "mpicbg.trakem2.transform.SimilarityModel2D",
            Self::Affine => "mpicbg.trakem2.transform.AffineModel2D",
            Self::Homography => "mpicbg.trakem2.transform.HomographyModel2D",
        }
    }

    /// Number of values expected in the data string.
    pub fn parameter_count(self) -> usize {
        match self {
            Self::Translation => 2,
            Self::Rigid => 3,
            Self::Similarity => 4,
            Self::Affine => 6,
            Self::Homography => 9,
        }
    }
}

/// A primitive coordinate transform.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Model2D {
    kind: ModelKind,
    matrix: Matrix3<f64>,
}

impl Model2D {
    /// Parse a whitespace-separated data string for `kind`.
    pub fn from_data_string(kind: ModelKind, data: &str) -> Result<Self, String> {
        let values = data
            .split_whitespace()
            .map(|token| {
                token
                    .parse::<f64>()
                    .map_err(|e| format!("bad value '{token}': {e}"))
            })
            .collect::<Result<Vec<f64>, String>>()?;
        if values.len() != kind.parameter_count() {
            return Err(format!(
                "{:?} expects {} values, got {}",
                kind,
                kind.parameter_count(),
                values.len()
            ));
        }
        if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
            return Err(format!("non-finite parameter {bad}"));
        }
        let v = &values;
        let matrix = match kind {
            ModelKind::Translation => Matrix3::new(1.0, 0.0, v[0], 0.0, 1.0, v[1], 0.0, 0.0, 1.0),
            ModelKind::Rigid => rotation_scale(1.0, v[0], v[1], v[2]),
            ModelKind::Similarity => rotation_scale(v[0], v[1], v[2], v[3]),
            ModelKind::Affine => Matrix3::new(v[0], v[2], v[4], v[1], v[3], v[5], 0.0, 0.0, 1.0),
            ModelKind::Homography => {
                Matrix3::new(v[0], v[1], v[2], v[3], v[4], v[5], v[6], v[7], v[8])
            }
        };
        Self::from_matrix(kind, matrix)
    }

    /// Wrap an explicit matrix, rejecting degenerate geometry.
    pub fn from_matrix(kind: ModelKind, matrix: Matrix3<f64>) -> Result<Self, String> {
        let det = matrix.determinant();
        if !det.is_finite() || det.abs() <= MIN_DET {
            return Err(format!("degenerate {kind:?} model (det={det:e})"));
        }
        Ok(Self { kind, matrix })
    }

    pub fn translation(tx: f64, ty: f64) -> Self {
        Self {
            kind: ModelKind::Translation,
            matrix: Matrix3::new(1.0, 0.0, tx, 0.0, 1.0, ty, 0.0, 0.0, 1.0),
        }
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }

    pub fn apply(&self, p: [f64; 2]) -> Option<[f64; 2]> {
        apply_homography_point(&self.matrix, p)
    }

    /// Inverse model of the same family.
    pub fn inverse(&self) -> Option<Self> {
        let inv = invert_homography(&self.matrix)?;
        Some(Self {
            kind: self.kind,
            matrix: normalize_homography(&inv),
        })
    }
}

fn rotation_scale(scale: f64, theta: f64, tx: f64, ty: f64) -> Matrix3<f64> {
    let (s, c) = theta.sin_cos();
    Matrix3::new(
        scale * c,
        -scale * s,
        tx,
        scale * s,
        scale * c,
        ty,
        0.0,
        0.0,
        1.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn class_names_match_on_last_segment() {
        assert_eq!(
            ModelKind::from_class_name("mpicbg.trakem2.transform.AffineModel2D"),
            Some(ModelKind::Affine)
        );
        assert_eq!(
            ModelKind::from_class_name("RigidModel2D"),
            Some(ModelKind::Rigid)
        );
        assert_eq!(ModelKind::from_class_name("org.example.Warp"), None);
    }

    #[test]
    fn affine_data_string_is_column_major() {
        let m = Model2D::from_data_string(ModelKind::Affine, "1 0 0 1 10 20").unwrap();
        assert_eq!(m.apply([1.0, 2.0]), Some([11.0, 22.0]));

        let shear = Model2D::from_data_string(ModelKind::Affine, "1 0 0.5 1 0 0").unwrap();
        assert_eq!(shear.apply([0.0, 2.0]), Some([1.0, 2.0]));
    }

    #[test]
    fn rigid_rotates_about_origin() {
        let m = Model2D::from_data_string(
            ModelKind::Rigid,
            &format!("{} 0 0", std::f64::consts::FRAC_PI_2),
        )
        .unwrap();
        let p = m.apply([1.0, 0.0]).unwrap();
        assert_relative_eq!(p[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(p[1], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn inverse_round_trips_similarity() {
        let m = Model2D::from_data_string(ModelKind::Similarity, "2 0.3 5 -7").unwrap();
        let inv = m.inverse().unwrap();
        let q = inv.apply(m.apply([3.0, 4.0]).unwrap()).unwrap();
        assert_relative_eq!(q[0], 3.0, epsilon = 1e-9);
        assert_relative_eq!(q[1], 4.0, epsilon = 1e-9);
    }

    #[test]
    fn malformed_parameters_are_rejected() {
        assert!(Model2D::from_data_string(ModelKind::Translation, "1").is_err());
        assert!(Model2D::from_data_string(ModelKind::Translation, "1 x").is_err());
        assert!(Model2D::from_data_string(ModelKind::Affine, "0 0 0 0 1 1").is_err());
        assert!(Model2D::from_data_string(ModelKind::Similarity, "0 0 1 1").is_err());
        assert!(Model2D::from_data_string(ModelKind::Rigid, "NaN 0 0").is_err());
    }
}
