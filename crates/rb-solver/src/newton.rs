//! Newton iteration with residual-norm backtracking.
//!
//! Used for nonlinear reduced systems and for every implicit time step.

use crate::error::{SolverError, SolverResult};
use crate::jacobian::DifferenceScheme;
use crate::linear::solve_linear;
use nalgebra::{DMatrix, DVector};
use rb_core::Real;
use serde::{Deserialize, Serialize};
use tracing::trace;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewtonConfig {
    pub max_iterations: usize,
    /// Stop when `|r| < abs_tol`
    pub abs_tol: Real,
    /// ... or when `|r| < rel_tol * |r(x0)|`
    pub rel_tol: Real,
    /// Step shrink factor per backtracking trial
    pub line_search_beta: Real,
    pub max_line_search_iters: usize,
    /// Used by callers that approximate the Jacobian
    pub difference: DifferenceScheme,
}

impl Default for NewtonConfig {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            abs_tol: 1e-10,
            rel_tol: 1e-10,
            line_search_beta: 0.5,
            max_line_search_iters: 20,
            difference: DifferenceScheme::Forward,
        }
    }
}

impl NewtonConfig {
    fn converged(&self, norm: Real, initial_norm: Real) -> bool {
        norm < self.abs_tol || norm < self.rel_tol * initial_norm
    }
}

#[derive(Clone, Debug)]
pub struct NewtonResult {
    pub x: DVector<Real>,
    pub residual_norm: Real,
    /// Jacobian solves performed
    pub iterations: usize,
}

/// Solve `residual(x) = 0` from `x0`.
///
/// Each iteration solves `J dx = -r` and halves (by `line_search_beta`) the
/// step until the residual norm decreases. Fails with `ConvergenceFailed`
/// on a singular Jacobian, a non-finite residual, a stalled line search or
/// when `max_iterations` is exhausted.
pub fn newton_solve<F, J>(
    x0: DVector<Real>,
    residual: F,
    jacobian: J,
    config: &NewtonConfig,
) -> SolverResult<NewtonResult>
where
    F: Fn(&DVector<Real>) -> SolverResult<DVector<Real>>,
    J: Fn(&DVector<Real>) -> SolverResult<DMatrix<Real>>,
{
    let mut x = x0;
    let mut r = residual(&x)?;
    let initial_norm = r.norm();
    let mut norm = initial_norm;
    let mut iterations = 0;

    while !config.converged(norm, initial_norm) {
        if !norm.is_finite() {
            return Err(SolverError::ConvergenceFailed {
                what: format!("non-finite residual after {iterations} iterations"),
            });
        }
        if iterations == config.max_iterations {
            return Err(SolverError::ConvergenceFailed {
                what: format!("no convergence in {iterations} iterations, |r| = {norm:e}"),
            });
        }

        let dx = solve_linear(&jacobian(&x)?, &(-&r)).map_err(|e| match e {
            SolverError::Numeric { what } => SolverError::ConvergenceFailed {
                what: format!("Jacobian solve failed at iteration {iterations}: {what}"),
            },
            other => other,
        })?;
        iterations += 1;

        let Some((step, x_next, r_next)) = backtrack(&x, &dx, norm, &residual, config)? else {
            return Err(SolverError::ConvergenceFailed {
                what: format!("line search stalled at iteration {iterations}, |r| = {norm:e}"),
            });
        };
        norm = r_next.norm();
        trace!(iteration = iterations, residual = norm, step, "newton iteration");
        x = x_next;
        r = r_next;
    }

    Ok(NewtonResult {
        x,
        residual_norm: norm,
        iterations,
    })
}

/// Largest `alpha = beta^k`, `k <= max_line_search_iters`, with
/// `|r(x + alpha dx)| < norm`. `None` when every trial fails to decrease.
fn backtrack<F>(
    x: &DVector<Real>,
    dx: &DVector<Real>,
    norm: Real,
    residual: &F,
    config: &NewtonConfig,
) -> SolverResult<Option<(Real, DVector<Real>, DVector<Real>)>>
where
    F: Fn(&DVector<Real>) -> SolverResult<DVector<Real>>,
{
    let mut alpha = 1.0;
    for _ in 0..=config.max_line_search_iters {
        let trial = x + alpha * dx;
        let r = residual(&trial)?;
        let trial_norm = r.norm();
        if trial_norm.is_finite() && trial_norm < norm {
            return Ok(Some((alpha, trial, r)));
        }
        alpha *= config.line_search_beta;
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_root_of_four() {
        let residual = |x: &DVector<Real>| -> SolverResult<DVector<Real>> {
            Ok(DVector::from_element(1, x[0] * x[0] - 4.0))
        };
        let jacobian = |x: &DVector<Real>| -> SolverResult<DMatrix<Real>> {
            Ok(DMatrix::from_element(1, 1, 2.0 * x[0]))
        };
        let result = newton_solve(
            DVector::from_element(1, 3.0),
            residual,
            jacobian,
            &NewtonConfig::default(),
        )
        .unwrap();
        assert!((result.x[0] - 2.0).abs() < 1e-8);
        assert!(result.residual_norm < 1e-10);
    }

    #[test]
    fn linear_residual_takes_one_iteration() {
        let a = DMatrix::from_row_slice(2, 2, &[4.0, 1.0, 1.0, 3.0]);
        let b = DVector::from_vec(vec![1.0, 2.0]);
        let residual = |x: &DVector<Real>| -> SolverResult<DVector<Real>> { Ok(&a * x - &b) };
        let jacobian = |_: &DVector<Real>| -> SolverResult<DMatrix<Real>> { Ok(a.clone()) };
        let result =
            newton_solve(DVector::zeros(2), residual, jacobian, &NewtonConfig::default()).unwrap();
        assert_eq!(result.iterations, 1);
        assert!((&a * &result.x - &b).norm() < 1e-12);
    }

    #[test]
    fn already_converged_start_does_no_work() {
        let residual = |x: &DVector<Real>| -> SolverResult<DVector<Real>> { Ok(x.clone()) };
        let jacobian = |_: &DVector<Real>| -> SolverResult<DMatrix<Real>> {
            Err(SolverError::Numeric {
                what: "must not be called".into(),
            })
        };
        let result =
            newton_solve(DVector::zeros(3), residual, jacobian, &NewtonConfig::default()).unwrap();
        assert_eq!(result.iterations, 0);
    }

    #[test]
    fn singular_jacobian_is_a_convergence_failure() {
        let residual =
            |_: &DVector<Real>| -> SolverResult<DVector<Real>> { Ok(DVector::from_element(1, 1.0)) };
        let jacobian = |_: &DVector<Real>| -> SolverResult<DMatrix<Real>> { Ok(DMatrix::zeros(1, 1)) };
        let err = newton_solve(DVector::zeros(1), residual, jacobian, &NewtonConfig::default())
            .unwrap_err();
        assert!(matches!(err, SolverError::ConvergenceFailed { .. }));
    }

    #[test]
    fn iteration_cap_is_enforced() {
        // x^2 + 1 has no real root
        let residual = |x: &DVector<Real>| -> SolverResult<DVector<Real>> {
            Ok(DVector::from_element(1, x[0] * x[0] + 1.0))
        };
        let jacobian = |x: &DVector<Real>| -> SolverResult<DMatrix<Real>> {
            Ok(DMatrix::from_element(1, 1, 2.0 * x[0]))
        };
        let config = NewtonConfig {
            max_iterations: 3,
            ..NewtonConfig::default()
        };
        let err = newton_solve(DVector::from_element(1, 0.5), residual, jacobian, &config)
            .unwrap_err();
        assert!(matches!(err, SolverError::ConvergenceFailed { .. }));
    }

    #[test]
    fn step_that_never_decreases_is_rejected() {
        // the Jacobian points uphill, so no fraction of the step helps
        let residual = |x: &DVector<Real>| -> SolverResult<DVector<Real>> {
            Ok(DVector::from_element(1, x[0] - 1.0))
        };
        let jacobian = |_: &DVector<Real>| -> SolverResult<DMatrix<Real>> {
            Ok(DMatrix::from_element(1, 1, -1.0))
        };
        let err = newton_solve(DVector::zeros(1), residual, jacobian, &NewtonConfig::default())
            .unwrap_err();
        match err {
            SolverError::ConvergenceFailed { what } => assert!(what.contains("line search")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
