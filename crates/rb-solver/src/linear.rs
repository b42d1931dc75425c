//! Dense linear solve with shape and finiteness checks.

use crate::error::{SolverError, SolverResult};
use nalgebra::{DMatrix, DVector};
use rb_core::Real;

/// Solve `a x = b` by LU factorization.
pub fn solve_linear(a: &DMatrix<Real>, b: &DVector<Real>) -> SolverResult<DVector<Real>> {
    if !a.is_square() || a.nrows() != b.len() {
        return Err(SolverError::ProblemSetup {
            what: format!(
                "linear system shape mismatch: matrix {}x{}, rhs {}",
                a.nrows(),
                a.ncols(),
                b.len()
            ),
        });
    }
    if a.nrows() == 0 {
        return Ok(DVector::zeros(0));
    }
    let x = a
        .clone()
        .lu()
        .solve(b)
        .ok_or_else(|| SolverError::Numeric {
            what: "singular linear system".to_string(),
        })?;
    if x.iter().any(|v| !v.is_finite()) {
        return Err(SolverError::Numeric {
            what: "linear solve produced non-finite values".to_string(),
        });
    }
    Ok(x)
}
