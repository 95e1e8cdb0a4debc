use nalgebra::{Matrix3, Vector3};

const EPS: f64 = 1e-12;

/// Map a single point through a 3×3 projective matrix.
///
/// Returns `None` when the point lands at infinity or any coordinate is not
/// finite.
pub fn apply_homography_point(h: &Matrix3<f64>, p: [f64; 2]) -> Option<[f64; 2]> {
    let v = h * Vector3::new(p[0], p[1], 1.0);
    let w = v[2];
    if !w.is_finite() || w.abs() <= EPS || !v[0].is_finite() || !v[1].is_finite() {
        return None;
    }
    Some([v[0] / w, v[1] / w])
}

pub fn apply_homography_points(h: &Matrix3<f64>, pts: &[[f64; 2]]) -> Option<Vec<[f64; 2]>> {
    let mut out = Vec::with_capacity(pts.len());
    for &p in pts {
        out.push(apply_homography_point(h, p)?);
    }
    Some(out)
}

/// Invert a projective matrix, rejecting singular or non-finite results.
pub fn invert_homography(h: &Matrix3<f64>) -> Option<Matrix3<f64>> {
    if h.determinant().abs() <= EPS {
        return None;
    }
    let inv = h.try_inverse()?;
    inv.iter().all(|v| v.is_finite()).then_some(inv)
}

/// Normalise so that `h[(2, 2)] == 1` when possible.
pub fn normalize_homography(h: &Matrix3<f64>) -> Matrix3<f64> {
    let s = h[(2, 2)];
    if s.is_finite() && s.abs() > EPS {
        h / s
    } else {
        *h
    }
}
