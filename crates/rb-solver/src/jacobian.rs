//! Finite-difference Jacobians for residuals whose derivative is not
//! available in closed form (e.g. thetas that read resolved expressions).

use crate::error::{SolverError, SolverResult};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Difference quotient used when a Jacobian is approximated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DifferenceScheme {
    #[default]
    Forward,
    Central,
}

impl DifferenceScheme {
    pub fn jacobian<F>(self, x: &DVector<f64>, f: F, epsilon: f64) -> SolverResult<DMatrix<f64>>
    where
        F: Fn(&DVector<f64>) -> SolverResult<DVector<f64>>,
    {
        match self {
            Self::Forward => finite_difference_jacobian(x, f, epsilon),
            Self::Central => central_difference_jacobian(x, f, epsilon),
        }
    }
}

fn step_size(epsilon: f64, xj: f64) -> f64 {
    epsilon * xj.abs().max(1.0)
}

/// Forward differences: column j is `(f(x + h e_j) - f(x)) / h`.
pub fn finite_difference_jacobian<F>(
    x: &DVector<f64>,
    f: F,
    epsilon: f64,
) -> SolverResult<DMatrix<f64>>
where
    F: Fn(&DVector<f64>) -> SolverResult<DVector<f64>>,
{
    let f_x = f(x)?;
    let mut jac = DMatrix::zeros(f_x.len(), x.len());
    let mut probe = x.clone();

    for j in 0..x.len() {
        let h = step_size(epsilon, x[j]);
        probe[j] = x[j] + h;
        let f_probe = f(&probe)?;
        probe[j] = x[j];
        if f_probe.len() != f_x.len() {
            return Err(SolverError::Numeric {
                what: format!("residual length changed while probing column {j}"),
            });
        }
        jac.set_column(j, &((f_probe - &f_x) / h));
    }

    Ok(jac)
}

/// Central differences (second order, twice the residual evaluations).
pub fn central_difference_jacobian<F>(
    x: &DVector<f64>,
    f: F,
    epsilon: f64,
) -> SolverResult<DMatrix<f64>>
where
    F: Fn(&DVector<f64>) -> SolverResult<DVector<f64>>,
{
    let m = f(x)?.len();
    let mut jac = DMatrix::zeros(m, x.len());
    let mut probe = x.clone();

    for j in 0..x.len() {
        let h = step_size(epsilon, x[j]);
        probe[j] = x[j] + h;
        let f_plus = f(&probe)?;
        probe[j] = x[j] - h;
        let f_minus = f(&probe)?;
        probe[j] = x[j];
        if f_plus.len() != m || f_minus.len() != m {
            return Err(SolverError::Numeric {
                what: format!("residual length changed while probing column {j}"),
            });
        }
        jac.set_column(j, &((f_plus - f_minus) / (2.0 * h)));
    }

    Ok(jac)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rosenbrock_gradient(x: &DVector<f64>) -> SolverResult<DVector<f64>> {
        Ok(DVector::from_vec(vec![
            -2.0 * (1.0 - x[0]) - 400.0 * x[0] * (x[1] - x[0] * x[0]),
            200.0 * (x[1] - x[0] * x[0]),
        ]))
    }

    #[test]
    fn forward_differences_match_linear_map() {
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, -3.0, 0.5]);
        let f = |x: &DVector<f64>| -> SolverResult<DVector<f64>> { Ok(&a * x) };
        let jac = finite_difference_jacobian(&DVector::from_vec(vec![0.3, -1.0]), f, 1e-7).unwrap();
        assert!((jac - &a).abs().max() < 1e-6);
    }

    #[test]
    fn central_differences_match_hessian() {
        let x = DVector::from_vec(vec![0.5, 0.2]);
        let jac = central_difference_jacobian(&x, rosenbrock_gradient, 1e-6).unwrap();
        let exact = DMatrix::from_row_slice(
            2,
            2,
            &[
                2.0 - 400.0 * (x[1] - 3.0 * x[0] * x[0]),
                -400.0 * x[0],
                -400.0 * x[0],
                200.0,
            ],
        );
        assert!((jac - exact).abs().max() < 1e-4);
    }

    #[test]
    fn central_scheme_is_more_accurate() {
        let x = DVector::from_vec(vec![0.5, 0.2]);
        let exact = central_difference_jacobian(&x, rosenbrock_gradient, 1e-5).unwrap();
        let forward = DifferenceScheme::Forward
            .jacobian(&x, rosenbrock_gradient, 1e-4)
            .unwrap();
        let central = DifferenceScheme::Central
            .jacobian(&x, rosenbrock_gradient, 1e-4)
            .unwrap();
        assert!((&central - &exact).abs().max() < (&forward - &exact).abs().max());
    }
}
