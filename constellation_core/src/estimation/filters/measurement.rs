// constellation_core/src/estimation/filters/measurement.rs

use nalgebra::{DMatrix, DVector};
use tracing::{debug, warn};

use crate::errors::{FilterError, FilterResult};
use crate::estimation::filters::ukf::UnscentedKalmanFilter;
use crate::estimation::unscented::UnscentedTransform;
use crate::estimation::FilterPhase;
use crate::models::manifold::Manifold;
use crate::models::measurement::MeasurementModel;
use crate::types::{Observation, SensorHandle};
use crate::utils::linalg::{decompose_spd, expect_dim, symmetrize};

/// The observation side of the Unscented Kalman Filter: one instance per
/// measurement source, bound to a filter at construction.
///
/// Owns the observation vector `z`, the measurement noise `R`, and its own
/// measurement-space unscented transform (whose weight scheme is drawn
/// from the filter's). Several instances may be bound to one filter and
/// applied in sequence within a single predicted cycle; each application
/// refines the filter's working estimate for the next.
pub struct MeasurementUpdate {
    /// UT transform for the measurement space.
    ut: UnscentedTransform,

    model: Box<dyn MeasurementModel>,
    sensor: SensorHandle,

    n_measurement: usize,
    n_cov: usize,
    n_state_cov: usize,
    num_sigmas: usize,

    /// Measured values, N_measurement x 1. Fed by the capture pipeline.
    z: Observation,
    /// Measurement noise, N_cov x N_cov. Zero until the caller sets it.
    r: DMatrix<f64>,

    /// Predicted measurement from the last applied update.
    z_est: Observation,
    /// Measurement covariance from the last applied update.
    pz: DMatrix<f64>,
    /// State/measurement cross-covariance from the last applied update.
    pxz: DMatrix<f64>,
    /// Innovation from the last applied update.
    y: DVector<f64>,
    /// Kalman gain from the last applied update.
    k: DMatrix<f64>,
}

impl MeasurementUpdate {
    /// Binds a measurement source to `filter`. The sigma-point count and
    /// recombination weights are taken from the filter's transform, since
    /// updates consume sigma points generated on the state side.
    pub fn new(
        filter: &UnscentedKalmanFilter,
        sensor: SensorHandle,
        model: Box<dyn MeasurementModel>,
        manifold: Box<dyn Manifold>,
    ) -> FilterResult<Self> {
        let n_measurement = manifold.point_dim();
        let n_cov = manifold.tangent_dim();
        if n_measurement == 0 || n_cov == 0 {
            return Err(FilterError::DimensionMismatch {
                what: "measurement dimensions",
                expected: 1,
                actual: 0,
            });
        }
        expect_dim("measurement model rows", n_measurement, model.measurement_dim())?;

        let ut = UnscentedTransform::with_weights_from(manifold, filter.transform())?;
        let n_state_cov = filter.cov_dim();
        let num_sigmas = filter.num_sigmas();

        Ok(Self {
            ut,
            model,
            sensor,
            n_measurement,
            n_cov,
            n_state_cov,
            num_sigmas,
            z: DVector::zeros(n_measurement),
            r: DMatrix::zeros(n_cov, n_cov),
            z_est: DVector::zeros(n_measurement),
            pz: DMatrix::zeros(n_cov, n_cov),
            pxz: DMatrix::zeros(n_state_cov, n_cov),
            y: DVector::zeros(n_cov),
            k: DMatrix::zeros(n_state_cov, n_cov),
        })
    }

    /// Stores the observation vector for the next `update`.
    pub fn set_measurement(&mut self, z: &Observation) -> FilterResult<()> {
        expect_dim("measurement rows", self.n_measurement, z.nrows())?;
        self.z.copy_from(z);
        Ok(())
    }

    /// Stores the measurement noise covariance `R`.
    pub fn set_noise(&mut self, r: &DMatrix<f64>) -> FilterResult<()> {
        expect_dim("measurement noise rows", self.n_cov, r.nrows())?;
        expect_dim("measurement noise cols", self.n_cov, r.ncols())?;
        self.r.copy_from(r);
        Ok(())
    }

    /// Fuses the stored observation into the filter's working estimate.
    ///
    /// Requires a predicted filter. The current state sigma points are
    /// projected through the measurement model, recombined into `Z_est` and
    /// `Pz` (plus `R`), and blended in via the Kalman gain, which is
    /// computed through a decomposition-based solve rather than an explicit
    /// inverse. Any failure, including `Pz` not decomposing, leaves the
    /// filter's `x`/`P` exactly as they were, and the caller should treat
    /// the observation as rejected for this cycle.
    pub fn update(&mut self, filter: &mut UnscentedKalmanFilter) -> FilterResult<()> {
        if filter.phase() != FilterPhase::Predicted {
            return Err(FilterError::InvalidSequence {
                operation: "update",
            });
        }
        expect_dim("filter sigma count", self.num_sigmas, filter.num_sigmas())?;
        expect_dim("filter covariance rows", self.n_state_cov, filter.cov_dim())?;

        // Refresh the state sigma points around the current working
        // estimate, so chained updates each linearize about the estimate
        // they are refining.
        let state_ut = filter.transform();
        let x = filter.state();
        let sigmas = match state_ut.generate_sigma_points(x, filter.covariance()) {
            Ok(s) => s,
            Err(e) => {
                warn!(sensor = self.sensor.0, "measurement rejected: {e}");
                return Err(e);
            }
        };

        // Project every sigma point into measurement space.
        let mut z_sigmas = DMatrix::zeros(self.n_measurement, self.num_sigmas);
        for i in 0..self.num_sigmas {
            let point = sigmas.column(i).into_owned();
            let z_point = self
                .model
                .measure(&point)
                .ok_or(FilterError::MeasurementFunction { sigma_index: i })?;
            expect_dim("measurement sigma rows", self.n_measurement, z_point.nrows())?;
            z_sigmas.set_column(i, &z_point);
        }

        let (z_est, mut pz) = self.ut.recombine(&z_sigmas)?;
        pz += &self.r;

        // Cross-covariance pairs state-space residuals with
        // measurement-space residuals, each through its own manifold.
        let weights_c = state_ut.weights_c();
        let mut pxz = DMatrix::zeros(self.n_state_cov, self.n_cov);
        for i in 0..self.num_sigmas {
            let rx = state_ut.residual(&sigmas.column(i).into_owned(), x);
            let rz = self.ut.residual(&z_sigmas.column(i).into_owned(), &z_est);
            pxz += weights_c[i] * &rx * rz.transpose();
        }

        // Kalman gain K = Pxz * Pz^-1.
        let pz_chol = match decompose_spd(&pz) {
            Ok(c) => c,
            Err(e) => {
                warn!(sensor = self.sensor.0, "measurement rejected: {e}");
                return Err(e);
            }
        };
        let k = pz_chol.solve(&pxz.transpose()).transpose();

        let y = self.ut.residual(&self.z, &z_est);
        let correction = &k * &y;
        let x_new = state_ut.sum(x, &correction);
        let mut p_new = filter.covariance() - &k * &pz * k.transpose();
        symmetrize(&mut p_new);

        debug!(
            sensor = self.sensor.0,
            innovation = y.norm(),
            "measurement applied"
        );

        // All fallible work is done; publish the results.
        self.z_est = z_est;
        self.pz = pz;
        self.pxz = pxz;
        self.y = y;
        self.k = k;
        filter.x = x_new;
        filter.p = p_new;
        filter.sigmas = sigmas;
        Ok(())
    }

    // --- Accessors ---

    pub fn sensor(&self) -> SensorHandle {
        self.sensor
    }

    pub fn measurement(&self) -> &Observation {
        &self.z
    }

    pub fn noise(&self) -> &DMatrix<f64> {
        &self.r
    }

    /// Predicted measurement `Z_est` from the last applied update.
    pub fn predicted_measurement(&self) -> &Observation {
        &self.z_est
    }

    /// Measurement covariance `Pz` (including `R`) from the last applied update.
    pub fn measurement_covariance(&self) -> &DMatrix<f64> {
        &self.pz
    }

    pub fn cross_covariance(&self) -> &DMatrix<f64> {
        &self.pxz
    }

    /// Innovation `y = z (-) Z_est` from the last applied update.
    pub fn innovation(&self) -> &DVector<f64> {
        &self.y
    }

    /// Kalman gain from the last applied update.
    pub fn gain(&self) -> &DMatrix<f64> {
        &self.k
    }
}
