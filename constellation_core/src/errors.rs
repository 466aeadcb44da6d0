// constellation_core/src/errors.rs

use thiserror::Error;

/// Everything that can go wrong inside the estimation engine.
///
/// `DimensionMismatch` and `InvalidSequence` indicate caller bugs and are
/// surfaced at the call that detects them. The remaining variants are
/// runtime conditions: the failing `predict`/`update` call rolls back any
/// partial work, so the filter's prior estimate stays authoritative and the
/// caller decides whether to retry next cycle or drop the measurement.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    /// An operand or configuration value had the wrong dimension.
    #[error("dimension mismatch for {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A covariance matrix could not be Cholesky-decomposed.
    #[error("covariance matrix is not symmetric positive-definite")]
    NotPositiveDefinite,

    /// The process model declined to propagate one of the sigma points.
    #[error("process model failed on sigma point {sigma_index}")]
    ProcessFunction { sigma_index: usize },

    /// The measurement model declined to project one of the sigma points.
    #[error("measurement model failed on sigma point {sigma_index}")]
    MeasurementFunction { sigma_index: usize },

    /// An operation was invoked outside the predict -> update -> commit order.
    #[error("{operation} called out of sequence; predict must run first")]
    InvalidSequence { operation: &'static str },
}

pub type FilterResult<T> = Result<T, FilterError>;
