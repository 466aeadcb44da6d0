// constellation_core/src/estimation/unscented.rs

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::errors::{FilterError, FilterResult};
use crate::models::manifold::Manifold;
use crate::types::State;
use crate::utils::linalg::{cholesky_sqrt, expect_dim, symmetrize};

/// Scaling parameters for the scaled symmetric sigma-point set.
///
/// `alpha` controls the spread of the points around the mean, `beta` folds
/// in prior knowledge of the distribution shape (2.0 is the usual choice
/// for Gaussians), and `kappa` is a secondary spread term. `alpha` must be
/// positive and `alpha^2 * (n + kappa)` must be nonzero for a transform of
/// tangent dimension `n`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SigmaParams {
    pub alpha: f64,
    pub beta: f64,
    pub kappa: f64,
}

impl Default for SigmaParams {
    /// The unscaled symmetric set: zero center weights, spread `sqrt(n)`,
    /// and both weight sets summing to exactly one.
    fn default() -> Self {
        Self {
            alpha: 1.0,
            beta: 0.0,
            kappa: 0.0,
        }
    }
}

impl SigmaParams {
    /// Julier's heuristic `kappa = 3 - n`, which matches a fourth moment of
    /// the Gaussian along each axis. Center covariance weight goes negative
    /// for `n > 3`.
    pub fn julier(n: usize) -> Self {
        Self {
            alpha: 1.0,
            beta: 0.0,
            kappa: 3.0 - n as f64,
        }
    }
}

/// Deterministic sampling of a mean/covariance pair into `2n + 1` weighted
/// points, and the weighted recombination of transformed points back into a
/// mean/covariance pair.
///
/// All vector arithmetic goes through the configured [`Manifold`], so the
/// same machinery serves Euclidean states and manifold-valued ones.
#[derive(Debug, Clone)]
pub struct UnscentedTransform {
    manifold: Box<dyn Manifold>,
    params: SigmaParams,
    lambda: f64,
    num_sigmas: usize,
    /// Weights for recombining the mean from sigma points.
    weights_m: DVector<f64>,
    /// Weights for recombining the covariance from sigma points.
    weights_c: DVector<f64>,
}

impl UnscentedTransform {
    pub fn new(manifold: Box<dyn Manifold>, params: SigmaParams) -> FilterResult<Self> {
        let n = manifold.tangent_dim();
        if n == 0 || manifold.point_dim() == 0 {
            return Err(FilterError::DimensionMismatch {
                what: "manifold dimension",
                expected: 1,
                actual: 0,
            });
        }

        let n_f = n as f64;
        let lambda = params.alpha.powi(2) * (n_f + params.kappa) - n_f;
        let num_sigmas = 2 * n + 1;

        // One shared weight for the non-center points; distinguished center
        // weights, which differ between mean and covariance so the spread
        // parameters can change without skewing the recombined covariance.
        let mut weights_m = DVector::from_element(num_sigmas, 0.5 / (n_f + lambda));
        let mut weights_c = weights_m.clone();
        weights_m[0] = lambda / (n_f + lambda);
        weights_c[0] = weights_m[0] + (1.0 - params.alpha.powi(2) + params.beta);

        Ok(Self {
            manifold,
            params,
            lambda,
            num_sigmas,
            weights_m,
            weights_c,
        })
    }

    /// Builds the measurement-space transform for an update bound to a
    /// state-space transform. The weight scheme and sigma count are copied
    /// from `state_ut`, since an update recombines points that were
    /// generated there.
    pub fn with_weights_from(
        manifold: Box<dyn Manifold>,
        state_ut: &UnscentedTransform,
    ) -> FilterResult<Self> {
        if manifold.tangent_dim() == 0 || manifold.point_dim() == 0 {
            return Err(FilterError::DimensionMismatch {
                what: "manifold dimension",
                expected: 1,
                actual: 0,
            });
        }
        Ok(Self {
            manifold,
            params: state_ut.params,
            lambda: state_ut.lambda,
            num_sigmas: state_ut.num_sigmas,
            weights_m: state_ut.weights_m.clone(),
            weights_c: state_ut.weights_c.clone(),
        })
    }

    pub fn num_sigmas(&self) -> usize {
        self.num_sigmas
    }

    pub fn params(&self) -> SigmaParams {
        self.params
    }

    pub fn point_dim(&self) -> usize {
        self.manifold.point_dim()
    }

    pub fn tangent_dim(&self) -> usize {
        self.manifold.tangent_dim()
    }

    pub fn weights_m(&self) -> &DVector<f64> {
        &self.weights_m
    }

    pub fn weights_c(&self) -> &DVector<f64> {
        &self.weights_c
    }

    /// Tangent-space difference of two points, through the manifold.
    pub fn residual(&self, a: &State, base: &State) -> DVector<f64> {
        self.manifold.residual(a, base)
    }

    /// Tangent-space update applied to a base point, through the manifold.
    pub fn sum(&self, base: &State, delta: &DVector<f64>) -> State {
        self.manifold.sum(base, delta)
    }

    /// Generates the `2n + 1` sigma points for a mean/covariance pair.
    ///
    /// The first point is the mean itself; each tangent dimension `i`
    /// contributes `mean (+) col_i` and `mean (-) col_i`, where `col_i` is a
    /// column of the scaled covariance square root.
    pub fn generate_sigma_points(
        &self,
        mean: &State,
        covariance: &DMatrix<f64>,
    ) -> FilterResult<DMatrix<f64>> {
        let n = self.manifold.tangent_dim();
        expect_dim("sigma mean rows", self.manifold.point_dim(), mean.nrows())?;
        expect_dim("sigma covariance rows", n, covariance.nrows())?;
        expect_dim("sigma covariance cols", n, covariance.ncols())?;

        let scaled = covariance * (n as f64 + self.lambda);
        let sqrt = cholesky_sqrt(&scaled)?;

        let mut sigmas = DMatrix::zeros(self.manifold.point_dim(), self.num_sigmas);
        sigmas.column_mut(0).copy_from(mean);
        for i in 0..n {
            let spread = sqrt.column(i).into_owned();
            let plus = self.manifold.sum(mean, &spread);
            let minus = self.manifold.sum(mean, &(-spread));
            sigmas.column_mut(i + 1).copy_from(&plus);
            sigmas.column_mut(i + 1 + n).copy_from(&minus);
        }
        Ok(sigmas)
    }

    /// Recombines a set of (possibly transformed) sigma points into a
    /// mean and a symmetrized covariance.
    pub fn recombine(&self, points: &DMatrix<f64>) -> FilterResult<(State, DMatrix<f64>)> {
        expect_dim("recombine point rows", self.manifold.point_dim(), points.nrows())?;
        expect_dim("recombine point cols", self.num_sigmas, points.ncols())?;

        let mean = self.manifold.mean(points, &self.weights_m);

        let n = self.manifold.tangent_dim();
        let mut covariance = DMatrix::zeros(n, n);
        for i in 0..self.num_sigmas {
            let r = self.manifold.residual(&points.column(i).into_owned(), &mean);
            covariance += self.weights_c[i] * &r * r.transpose();
        }
        symmetrize(&mut covariance);

        Ok((mean, covariance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::manifold::{Euclidean, WrappedAngles};
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;

    const EPSILON: f64 = 1e-9;

    fn assert_matrix_approx_eq(a: &DMatrix<f64>, b: &DMatrix<f64>, epsilon: f64) {
        assert_eq!(a.shape(), b.shape());
        for r in 0..a.nrows() {
            for c in 0..a.ncols() {
                assert_abs_diff_eq!(a[(r, c)], b[(r, c)], epsilon = epsilon);
            }
        }
    }

    fn spd_3x3() -> DMatrix<f64> {
        DMatrix::from_row_slice(3, 3, &[1.5, 0.3, 0.0, 0.3, 1.1, 0.2, 0.0, 0.2, 0.9])
    }

    #[test]
    fn round_trip_identity_default_params() {
        let ut = UnscentedTransform::new(Box::new(Euclidean::new(3)), SigmaParams::default())
            .unwrap();
        let mean = DVector::from_row_slice(&[0.5, -1.0, 2.0]);
        let cov = spd_3x3();

        let sigmas = ut.generate_sigma_points(&mean, &cov).unwrap();
        let (mean_rec, cov_rec) = ut.recombine(&sigmas).unwrap();

        for i in 0..3 {
            assert_abs_diff_eq!(mean_rec[i], mean[i], epsilon = EPSILON);
        }
        assert_matrix_approx_eq(&cov_rec, &cov, EPSILON);
    }

    #[test]
    fn round_trip_identity_julier_params() {
        let ut =
            UnscentedTransform::new(Box::new(Euclidean::new(2)), SigmaParams::julier(2)).unwrap();
        let mean = DVector::from_row_slice(&[1.0, -2.0]);
        let cov = DMatrix::from_row_slice(2, 2, &[0.5, 0.1, 0.1, 0.8]);

        let sigmas = ut.generate_sigma_points(&mean, &cov).unwrap();
        let (mean_rec, cov_rec) = ut.recombine(&sigmas).unwrap();

        assert_abs_diff_eq!(mean_rec[0], mean[0], epsilon = EPSILON);
        assert_abs_diff_eq!(mean_rec[1], mean[1], epsilon = EPSILON);
        assert_matrix_approx_eq(&cov_rec, &cov, EPSILON);
    }

    #[test]
    fn round_trip_identity_wrapped_angle_near_seam() {
        let ut = UnscentedTransform::new(
            Box::new(WrappedAngles::new(1, &[0])),
            SigmaParams::default(),
        )
        .unwrap();
        let mean = DVector::from_element(1, PI - 0.01);
        let cov = DMatrix::from_element(1, 1, 0.01);

        let sigmas = ut.generate_sigma_points(&mean, &cov).unwrap();
        let (mean_rec, cov_rec) = ut.recombine(&sigmas).unwrap();

        assert_abs_diff_eq!(mean_rec[0], mean[0], epsilon = EPSILON);
        assert_abs_diff_eq!(cov_rec[(0, 0)], 0.01, epsilon = EPSILON);
    }

    #[test]
    fn weight_sums_are_one_for_default_params() {
        for n in 1..=6 {
            let ut = UnscentedTransform::new(Box::new(Euclidean::new(n)), SigmaParams::default())
                .unwrap();
            assert_eq!(ut.num_sigmas(), 2 * n + 1);
            assert_abs_diff_eq!(ut.weights_m().sum(), 1.0, epsilon = EPSILON);
            assert_abs_diff_eq!(ut.weights_c().sum(), 1.0, epsilon = EPSILON);
        }
    }

    #[test]
    fn mean_weight_sum_is_one_for_julier_params() {
        for n in 1..=6 {
            let ut = UnscentedTransform::new(Box::new(Euclidean::new(n)), SigmaParams::julier(n))
                .unwrap();
            assert_abs_diff_eq!(ut.weights_m().sum(), 1.0, epsilon = EPSILON);
        }
    }

    #[test]
    fn center_point_is_the_mean_and_spread_is_scaled_sqrt() {
        let ut = UnscentedTransform::new(Box::new(Euclidean::new(3)), SigmaParams::default())
            .unwrap();
        let mean = DVector::from_row_slice(&[1.0, 2.0, 3.0]);
        let cov = spd_3x3();
        let sigmas = ut.generate_sigma_points(&mean, &cov).unwrap();

        for i in 0..3 {
            assert_abs_diff_eq!(sigmas[(i, 0)], mean[i], epsilon = EPSILON);
        }

        // With default params the scale factor is sqrt(n), and point i+1
        // sits at mean + column i of the scaled square root.
        let sqrt = cholesky_sqrt(&(&cov * 3.0)).unwrap();
        for i in 0..3 {
            for r in 0..3 {
                assert_abs_diff_eq!(
                    sigmas[(r, i + 1)] - mean[r],
                    sqrt[(r, i)],
                    epsilon = EPSILON
                );
                assert_abs_diff_eq!(
                    sigmas[(r, i + 4)] - mean[r],
                    -sqrt[(r, i)],
                    epsilon = EPSILON
                );
            }
        }
    }

    #[test]
    fn indefinite_covariance_is_rejected() {
        let ut = UnscentedTransform::new(Box::new(Euclidean::new(2)), SigmaParams::default())
            .unwrap();
        let mean = DVector::zeros(2);
        let cov = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 1.0]);
        assert_eq!(
            ut.generate_sigma_points(&mean, &cov),
            Err(FilterError::NotPositiveDefinite)
        );
    }

    #[test]
    fn recombine_validates_point_count() {
        let ut = UnscentedTransform::new(Box::new(Euclidean::new(2)), SigmaParams::default())
            .unwrap();
        let wrong = DMatrix::zeros(2, 4);
        assert!(matches!(
            ut.recombine(&wrong),
            Err(FilterError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn zero_dimension_manifold_is_rejected() {
        assert!(matches!(
            UnscentedTransform::new(Box::new(Euclidean::new(0)), SigmaParams::default()),
            Err(FilterError::DimensionMismatch { .. })
        ));
    }
}
