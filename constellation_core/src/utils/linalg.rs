// constellation_core/src/utils/linalg.rs

use nalgebra::{Cholesky, DMatrix, Dyn};

use crate::errors::{FilterError, FilterResult};

/// Checks a declared dimension against the actual one.
///
/// All public engine entry points validate operand shapes through this
/// helper and fail with `DimensionMismatch` instead of letting nalgebra
/// panic deep inside an expression.
pub fn expect_dim(what: &'static str, expected: usize, actual: usize) -> FilterResult<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(FilterError::DimensionMismatch {
            what,
            expected,
            actual,
        })
    }
}

/// Lower-triangular square root `S` of a symmetric positive-definite
/// matrix, such that `S * S^T` reconstructs the input.
pub fn cholesky_sqrt(m: &DMatrix<f64>) -> FilterResult<DMatrix<f64>> {
    let chol = Cholesky::new(m.clone()).ok_or(FilterError::NotPositiveDefinite)?;
    Ok(chol.l())
}

/// Decomposes `a` (symmetric positive-definite), ready for repeated solves.
pub fn decompose_spd(a: &DMatrix<f64>) -> FilterResult<Cholesky<f64, Dyn>> {
    Cholesky::new(a.clone()).ok_or(FilterError::NotPositiveDefinite)
}

/// Solves `A * X = B` for `X` with `A` symmetric positive-definite, via
/// Cholesky decomposition rather than explicit inversion.
pub fn solve_spd(a: &DMatrix<f64>, b: &DMatrix<f64>) -> FilterResult<DMatrix<f64>> {
    Ok(decompose_spd(a)?.solve(b))
}

/// Forces `m` symmetric: `m = (m + m^T) / 2`.
///
/// Tiny floating-point errors accumulate off-diagonal asymmetry in
/// covariance updates; this is applied after every recombination and
/// correction.
pub fn symmetrize(m: &mut DMatrix<f64>) {
    let mt = m.transpose();
    *m += mt;
    *m *= 0.5;
}
