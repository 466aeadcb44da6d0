// constellation_core/src/estimation/filters/ukf.rs

use nalgebra::DMatrix;
use tracing::warn;

use crate::errors::{FilterError, FilterResult};
use crate::estimation::unscented::{SigmaParams, UnscentedTransform};
use crate::estimation::FilterPhase;
use crate::models::manifold::Manifold;
use crate::models::process::ProcessModel;
use crate::types::State;
use crate::utils::linalg::{expect_dim, symmetrize};

/// The process side of the Unscented Kalman Filter.
///
/// Owns the prior estimate `(x_prior, P_prior)`, the process noise `Q`, and
/// the state-space unscented transform. A cycle is `predict` (once), any
/// number of measurement updates against the working estimate `(x, P)`, and
/// a final `commit` that folds the estimate back into the prior. A failed
/// predict or update never leaves partial state behind: the prior remains
/// authoritative until a successful cycle commits.
pub struct UnscentedKalmanFilter {
    /// UT transform for the state / process space.
    ut: UnscentedTransform,

    n_state: usize,
    n_cov: usize,

    /// Prior state vector, N_state x 1. Mutated only by `commit`.
    x_prior: State,
    /// Prior covariance, N_cov x N_cov. Mutated only by `commit`.
    p_prior: DMatrix<f64>,
    /// Process noise, N_cov x N_cov. Owned by the filter.
    q: DMatrix<f64>,

    process_model: Box<dyn ProcessModel>,

    /// Working state estimate, produced by `predict` and refined by updates.
    pub(crate) x: State,
    /// Working covariance estimate.
    pub(crate) p: DMatrix<f64>,
    /// Current state-space sigma points, N_state x num_sigmas.
    pub(crate) sigmas: DMatrix<f64>,

    phase: FilterPhase,
}

impl UnscentedKalmanFilter {
    /// Creates the filter. Takes ownership of the process noise `Q` if
    /// supplied; a missing `Q` means zero process noise. State and
    /// covariance dimensions come from the manifold (they may differ, e.g.
    /// a quaternion-bearing state with a smaller error-state covariance).
    pub fn new(
        initial_state: &State,
        initial_covariance: &DMatrix<f64>,
        process_noise: Option<DMatrix<f64>>,
        process_model: Box<dyn ProcessModel>,
        manifold: Box<dyn Manifold>,
        params: SigmaParams,
    ) -> FilterResult<Self> {
        let n_state = manifold.point_dim();
        let n_cov = manifold.tangent_dim();
        if n_state == 0 || n_cov == 0 {
            return Err(FilterError::DimensionMismatch {
                what: "filter dimensions",
                expected: 1,
                actual: 0,
            });
        }
        expect_dim("process model state rows", n_state, process_model.state_dim())?;
        expect_dim("initial state rows", n_state, initial_state.nrows())?;
        expect_dim("initial covariance rows", n_cov, initial_covariance.nrows())?;
        expect_dim("initial covariance cols", n_cov, initial_covariance.ncols())?;

        let q = match process_noise {
            Some(q) => {
                expect_dim("process noise rows", n_cov, q.nrows())?;
                expect_dim("process noise cols", n_cov, q.ncols())?;
                q
            }
            None => DMatrix::zeros(n_cov, n_cov),
        };

        let ut = UnscentedTransform::new(manifold, params)?;
        let num_sigmas = ut.num_sigmas();

        Ok(Self {
            n_state,
            n_cov,
            x_prior: initial_state.clone(),
            p_prior: initial_covariance.clone(),
            q,
            process_model,
            x: initial_state.clone(),
            p: initial_covariance.clone(),
            sigmas: DMatrix::zeros(n_state, num_sigmas),
            ut,
            phase: FilterPhase::Ready,
        })
    }

    /// Propagates the prior through the configured process model into the
    /// working estimate `(x, P)` and leaves the filter ready for updates.
    pub fn predict(&mut self, dt: f64) -> FilterResult<()> {
        self.predict_impl(dt, None)
    }

    /// Prediction with a one-shot substitute for the configured process
    /// model, e.g. to integrate augmented state components differently for
    /// a single cycle. The configured model is left in place.
    pub fn predict_with_model(&mut self, dt: f64, model: &dyn ProcessModel) -> FilterResult<()> {
        expect_dim("override model state rows", self.n_state, model.state_dim())?;
        self.predict_impl(dt, Some(model))
    }

    fn predict_impl(&mut self, dt: f64, override_model: Option<&dyn ProcessModel>) -> FilterResult<()> {
        let num_sigmas = self.ut.num_sigmas();

        let prior_sigmas = match self.ut.generate_sigma_points(&self.x_prior, &self.p_prior) {
            Ok(s) => s,
            Err(e) => {
                warn!("prediction rejected: {e}");
                return Err(e);
            }
        };

        // Push every sigma point through the nonlinear process model.
        let model = override_model.unwrap_or(&*self.process_model);
        let mut propagated = DMatrix::zeros(self.n_state, num_sigmas);
        for i in 0..num_sigmas {
            let point = prior_sigmas.column(i).into_owned();
            let next = model
                .propagate(&point, dt)
                .ok_or(FilterError::ProcessFunction { sigma_index: i })?;
            expect_dim("propagated sigma rows", self.n_state, next.nrows())?;
            propagated.set_column(i, &next);
        }

        let (x_new, mut p_new) = self.ut.recombine(&propagated)?;
        p_new += &self.q;
        symmetrize(&mut p_new);

        // Nothing visible was touched above; a failure leaves x/P and the
        // sigma buffer exactly as they were.
        self.x = x_new;
        self.p = p_new;
        self.sigmas = propagated;
        self.phase = FilterPhase::Predicted;
        Ok(())
    }

    /// Copies the working estimate back into the prior, closing the cycle.
    /// Also used for propagate-only cycles with no usable observation.
    pub fn commit(&mut self) -> FilterResult<()> {
        if self.phase != FilterPhase::Predicted {
            return Err(FilterError::InvalidSequence {
                operation: "commit",
            });
        }
        self.x_prior.copy_from(&self.x);
        self.p_prior.copy_from(&self.p);
        self.phase = FilterPhase::Ready;
        Ok(())
    }

    /// Re-seeds the prior, discarding any in-flight estimate. Used when the
    /// host application acquires a fresh absolute fix (e.g. re-locking onto
    /// the tracked device).
    pub fn set_prior(&mut self, x: &State, p: &DMatrix<f64>) -> FilterResult<()> {
        expect_dim("prior state rows", self.n_state, x.nrows())?;
        expect_dim("prior covariance rows", self.n_cov, p.nrows())?;
        expect_dim("prior covariance cols", self.n_cov, p.ncols())?;
        self.x_prior.copy_from(x);
        self.p_prior.copy_from(p);
        self.phase = FilterPhase::Ready;
        Ok(())
    }

    // --- Accessors ---

    /// Working state estimate. Meaningful once a predict has run.
    pub fn state(&self) -> &State {
        &self.x
    }

    /// Working covariance estimate. Meaningful once a predict has run.
    pub fn covariance(&self) -> &DMatrix<f64> {
        &self.p
    }

    pub fn prior_state(&self) -> &State {
        &self.x_prior
    }

    pub fn prior_covariance(&self) -> &DMatrix<f64> {
        &self.p_prior
    }

    /// Process noise, for in-place tuning (e.g. inflating the diagonal
    /// after a rejected cycle).
    pub fn process_noise_mut(&mut self) -> &mut DMatrix<f64> {
        &mut self.q
    }

    pub fn process_noise(&self) -> &DMatrix<f64> {
        &self.q
    }

    /// Current state-space sigma points (working buffer).
    pub fn sigma_points(&self) -> &DMatrix<f64> {
        &self.sigmas
    }

    pub fn transform(&self) -> &UnscentedTransform {
        &self.ut
    }

    pub fn num_sigmas(&self) -> usize {
        self.ut.num_sigmas()
    }

    pub fn state_dim(&self) -> usize {
        self.n_state
    }

    pub fn cov_dim(&self) -> usize {
        self.n_cov
    }

    pub fn phase(&self) -> FilterPhase {
        self.phase
    }
}
