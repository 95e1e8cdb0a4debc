//! Local smoothness filter for raw block matches.
//!
//! Every candidate is checked against a model fitted to all *other* candidates,
//! weighted by a Gaussian of their distance to it. A candidate is rejected when
//! the model cannot be fitted, when its residual exceeds `max_local_epsilon`, or
//! when it exceeds `max_local_trust` times the weighted mean residual of the
//! neighbourhood. Rejections are applied per sweep and sweeps repeat until the
//! set is stable.
use super::engine::RawMatch;
use super::params::{LocalModel, LocalSmoothnessParams};
use log::debug;
use nalgebra::{Matrix2, Vector2};

const EPS: f64 = 1e-12;
/// Slack on the trust test so exactly consistent sets are not rejected on noise.
const TRUST_SLACK: f64 = 1e-9;

/// 2D affine map `x ↦ m·x + t`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LocalFit {
    pub m: Matrix2<f64>,
    pub t: Vector2<f64>,
}

impl LocalFit {
    pub fn apply(&self, p: [f64; 2]) -> [f64; 2] {
        let q = self.m * Vector2::new(p[0], p[1]) + self.t;
        [q.x, q.y]
    }

    fn residual(&self, m: &RawMatch) -> f64 {
        let q = self.apply(m.source);
        ((q[0] - m.target[0]).powi(2) + (q[1] - m.target[1]).powi(2)).sqrt()
    }
}

/// Weighted least-squares fit of `model` to `matches`; `None` when the data
/// does not determine the model.
pub fn fit_weighted(model: LocalModel, matches: &[RawMatch], weights: &[f64]) -> Option<LocalFit> {
    debug_assert_eq!(matches.len(), weights.len());
    let support = weights.iter().filter(|&&w| w > EPS).count();
    if support < model.min_matches() {
        return None;
    }
    let w_sum: f64 = weights.iter().sum();
    if !(w_sum > EPS) {
        return None;
    }

    let mut pc = Vector2::zeros();
    let mut qc = Vector2::zeros();
    for (m, &w) in matches.iter().zip(weights) {
        pc += w * Vector2::new(m.source[0], m.source[1]);
        qc += w * Vector2::new(m.target[0], m.target[1]);
    }
    pc /= w_sum;
    qc /= w_sum;

    let centered = || {
        matches.iter().zip(weights).map(move |(m, &w)| {
            let p = Vector2::new(m.source[0], m.source[1]) - pc;
            let q = Vector2::new(m.target[0], m.target[1]) - qc;
            (w, p, q)
        })
    };

    let m = match model {
        LocalModel::Translation => Matrix2::identity(),
        LocalModel::Rigid | LocalModel::Similarity => {
            // Closed-form 2D Procrustes.
            let (mut a, mut b, mut pp) = (0.0, 0.0, 0.0);
            for (w, p, q) in centered() {
                a += w * (p.x * q.x + p.y * q.y);
                b += w * (p.x * q.y - p.y * q.x);
                pp += w * p.norm_squared();
            }
            if model == LocalModel::Rigid {
                if a.abs() < EPS && b.abs() < EPS {
                    return None;
                }
                let theta = b.atan2(a);
                let (s, c) = theta.sin_cos();
                Matrix2::new(c, -s, s, c)
            } else {
                if pp < EPS {
                    return None;
                }
                let (c, s) = (a / pp, b / pp);
                Matrix2::new(c, -s, s, c)
            }
        }
        LocalModel::Affine => {
            let mut pp = Matrix2::zeros();
            let mut qp = Matrix2::zeros();
            for (w, p, q) in centered() {
                pp += w * p * p.transpose();
                qp += w * q * p.transpose();
            }
            if pp.determinant().abs() < EPS {
                return None;
            }
            qp * pp.try_inverse()?
        }
    };
    let t = qc - m * pc;
    let fit = LocalFit { m, t };
    (fit.m.iter().chain(fit.t.iter()).all(|v| v.is_finite())).then_some(fit)
}

fn gaussian_weights(matches: &[RawMatch], center: usize, sigma: f64) -> Vec<f64> {
    let c = matches[center].source;
    let denom = 2.0 * sigma * sigma;
    matches
        .iter()
        .enumerate()
        .map(|(j, m)| {
            if j == center {
                return 0.0;
            }
            let dx = m.source[0] - c[0];
            let dy = m.source[1] - c[1];
            (-(dx * dx + dy * dy) / denom).exp()
        })
        .collect()
}

fn accepts(matches: &[RawMatch], index: usize, params: &LocalSmoothnessParams) -> bool {
    let weights = gaussian_weights(matches, index, params.region_sigma);
    let Some(fit) = fit_weighted(params.model, matches, &weights) else {
        return false;
    };
    let residual = fit.residual(&matches[index]);
    if residual > params.max_local_epsilon {
        return false;
    }
    let w_sum: f64 = weights.iter().sum();
    let mean: f64 = matches
        .iter()
        .zip(&weights)
        .map(|(m, &w)| w * fit.residual(m))
        .sum::<f64>()
        / w_sum;
    residual <= params.max_local_trust * mean + TRUST_SLACK
}

/// Remove matches inconsistent with their local neighbourhood.
pub fn local_smoothness_filter(matches: &[RawMatch], params: &LocalSmoothnessParams) -> Vec<RawMatch> {
    let mut kept: Vec<RawMatch> = matches.to_vec();
    let mut sweeps = 0usize;
    loop {
        let keep: Vec<bool> = (0..kept.len())
            .map(|i| accepts(&kept, i, params))
            .collect();
        let before = kept.len();
        let mut flags = keep.iter();
        kept.retain(|_| *flags.next().unwrap_or(&false));
        sweeps += 1;
        if kept.len() == before || kept.is_empty() {
            break;
        }
    }
    debug!(
        "smoothness: {} of {} matches kept after {} sweeps ({:?})",
        kept.len(),
        matches.len(),
        sweeps,
        params.model
    );
    kept
}
