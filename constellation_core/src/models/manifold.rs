// constellation_core/src/models/manifold.rs

use dyn_clone::DynClone;
use nalgebra::{DMatrix, DVector};
use std::f64::consts::PI;
use std::fmt::Debug;

use crate::types::State;

// --- MANIFOLD TRAIT ---
// Generalized arithmetic for the space a state (or measurement) lives in.
// The sigma-point machinery never adds or subtracts vectors directly; it
// goes through one of these, so orientation-valued and other non-Euclidean
// state representations can supply their own mean/residual/sum.
pub trait Manifold: DynClone + Debug + Send + Sync {
    /// Number of rows of a point on the manifold (the state vector itself).
    fn point_dim(&self) -> usize;

    /// Number of rows of a tangent-space difference vector. This is the
    /// dimension of the covariance matrix, which may be smaller than
    /// `point_dim` (e.g. a unit quaternion with a 3-DoF error state).
    fn tangent_dim(&self) -> usize;

    /// Weighted average of a set of points stored as matrix columns.
    /// Replaces the plain weighted sum where that is not meaningful.
    /// Must be invariant to reordering of the columns.
    fn mean(&self, points: &DMatrix<f64>, weights: &DVector<f64>) -> State;

    /// Generalized subtraction: the tangent vector that carries `base` to
    /// `a`, i.e. `residual(sum(base, r), base) == r`.
    fn residual(&self, a: &State, base: &State) -> DVector<f64>;

    /// Generalized addition: applies the tangent update `delta` to `base`.
    fn sum(&self, base: &State, delta: &DVector<f64>) -> State;
}

// This macro automatically generates the implementation of `Clone` for `Box<dyn Manifold>`.
dyn_clone::clone_trait_object!(Manifold);

// --- Euclidean Space ---
/// Plain vector arithmetic; the default for states with no wrap-around or
/// constrained components.
#[derive(Debug, Clone, Copy)]
pub struct Euclidean {
    dim: usize,
}

impl Euclidean {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

impl Manifold for Euclidean {
    fn point_dim(&self) -> usize {
        self.dim
    }

    fn tangent_dim(&self) -> usize {
        self.dim
    }

    fn mean(&self, points: &DMatrix<f64>, weights: &DVector<f64>) -> State {
        points * weights
    }

    fn residual(&self, a: &State, base: &State) -> DVector<f64> {
        a - base
    }

    fn sum(&self, base: &State, delta: &DVector<f64>) -> State {
        base + delta
    }
}

// --- Circle-Valued Components ---
/// Euclidean space where selected components are angles in radians.
///
/// Angle components are averaged on the unit circle and their residuals
/// wrap to `(-pi, pi]`, so an estimate sitting near the +/-pi seam fuses
/// correctly instead of being dragged across the circle.
#[derive(Debug, Clone)]
pub struct WrappedAngles {
    dim: usize,
    is_angle: Vec<bool>,
}

impl WrappedAngles {
    pub fn new(dim: usize, angle_indices: &[usize]) -> Self {
        let mut is_angle = vec![false; dim];
        for &i in angle_indices {
            assert!(i < dim, "angle index {} out of range for dimension {}", i, dim);
            is_angle[i] = true;
        }
        Self { dim, is_angle }
    }
}

/// Normalizes an angle to `(-pi, pi]`.
fn wrap_angle(theta: f64) -> f64 {
    let two_pi = 2.0 * PI;
    let mut a = theta % two_pi;
    if a > PI {
        a -= two_pi;
    } else if a <= -PI {
        a += two_pi;
    }
    a
}

impl Manifold for WrappedAngles {
    fn point_dim(&self) -> usize {
        self.dim
    }

    fn tangent_dim(&self) -> usize {
        self.dim
    }

    fn mean(&self, points: &DMatrix<f64>, weights: &DVector<f64>) -> State {
        let mut mean = DVector::zeros(self.dim);
        for row in 0..self.dim {
            if self.is_angle[row] {
                let mut sin_acc = 0.0;
                let mut cos_acc = 0.0;
                for col in 0..points.ncols() {
                    sin_acc += weights[col] * points[(row, col)].sin();
                    cos_acc += weights[col] * points[(row, col)].cos();
                }
                mean[row] = sin_acc.atan2(cos_acc);
            } else {
                for col in 0..points.ncols() {
                    mean[row] += weights[col] * points[(row, col)];
                }
            }
        }
        mean
    }

    fn residual(&self, a: &State, base: &State) -> DVector<f64> {
        let mut diff = a - base;
        for row in 0..self.dim {
            if self.is_angle[row] {
                diff[row] = wrap_angle(diff[row]);
            }
        }
        diff
    }

    fn sum(&self, base: &State, delta: &DVector<f64>) -> State {
        let mut out = base + delta;
        for row in 0..self.dim {
            if self.is_angle[row] {
                out[row] = wrap_angle(out[row]);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const EPSILON: f64 = 1e-12;

    #[test]
    fn euclidean_residual_sum_round_trip() {
        let space = Euclidean::new(3);
        let p = DVector::from_row_slice(&[1.0, -2.0, 0.5]);
        let r = DVector::from_row_slice(&[0.1, 0.2, -0.3]);
        let recovered = space.residual(&space.sum(&p, &r), &p);
        for i in 0..3 {
            assert_abs_diff_eq!(recovered[i], r[i], epsilon = EPSILON);
        }
    }

    #[test]
    fn wrapped_residual_crosses_the_seam() {
        let space = WrappedAngles::new(1, &[0]);
        let a = DVector::from_element(1, PI - 0.1);
        let b = DVector::from_element(1, -PI + 0.1);
        // Short way around is -0.2 rad, not +2*pi - 0.2.
        let diff = space.residual(&a, &b);
        assert_abs_diff_eq!(diff[0], -0.2, epsilon = 1e-10);
    }

    #[test]
    fn wrapped_residual_sum_round_trip() {
        let space = WrappedAngles::new(2, &[1]);
        let p = DVector::from_row_slice(&[4.0, PI - 0.05]);
        let r = DVector::from_row_slice(&[-1.5, 0.2]);
        let recovered = space.residual(&space.sum(&p, &r), &p);
        assert_abs_diff_eq!(recovered[0], r[0], epsilon = EPSILON);
        assert_abs_diff_eq!(recovered[1], r[1], epsilon = 1e-10);
    }

    #[test]
    fn wrapped_mean_straddling_the_seam() {
        let space = WrappedAngles::new(1, &[0]);
        let points = DMatrix::from_row_slice(1, 2, &[PI - 0.1, -PI + 0.1]);
        let weights = DVector::from_row_slice(&[0.5, 0.5]);
        let mean = space.mean(&points, &weights);
        // A naive weighted sum would give 0.0, which is the far side of the
        // circle from both inputs.
        assert_abs_diff_eq!(mean[0].abs(), PI, epsilon = 1e-10);
    }

    #[test]
    fn mean_invariant_to_column_order() {
        let space = WrappedAngles::new(2, &[1]);
        let points = DMatrix::from_row_slice(2, 3, &[1.0, 2.0, 3.0, 0.3, -0.1, 0.4]);
        let swapped = DMatrix::from_row_slice(2, 3, &[3.0, 2.0, 1.0, 0.4, -0.1, 0.3]);
        let weights = DVector::from_element(3, 1.0 / 3.0);
        let m1 = space.mean(&points, &weights);
        let m2 = space.mean(&swapped, &weights);
        assert_abs_diff_eq!(m1[0], m2[0], epsilon = EPSILON);
        assert_abs_diff_eq!(m1[1], m2[1], epsilon = EPSILON);
    }
}
