//! Online step of the empirical interpolation method.
//!
//! A nonaffine coefficient field `g(x; mu)` is approximated by
//! `sum_m theta_m(mu) q_m(x)`, where the `theta_m` solve a lower-triangular
//! system collocated at the magic points. This turns a resolved expression
//! into affine weights a theta function can return.

use nalgebra::{DMatrix, DVector};
use rb_core::{RbError, RbResult, Real};

#[derive(Clone, Debug, PartialEq)]
pub struct EmpiricalInterpolation {
    magic_points: Vec<usize>,
    interpolation_matrix: DMatrix<Real>,
}

impl EmpiricalInterpolation {
    /// `interpolation_matrix[(i, j)] = q_j(x_i)`; must be square and lower triangular.
    pub fn new(magic_points: Vec<usize>, interpolation_matrix: DMatrix<Real>) -> RbResult<Self> {
        let m = magic_points.len();
        if interpolation_matrix.nrows() != m || interpolation_matrix.ncols() != m {
            return Err(RbError::dimension(
                "interpolation matrix",
                interpolation_matrix.nrows().max(interpolation_matrix.ncols()),
                m,
            ));
        }
        Ok(Self {
            magic_points,
            interpolation_matrix,
        })
    }

    pub fn len(&self) -> usize {
        self.magic_points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.magic_points.is_empty()
    }

    pub fn magic_points(&self) -> &[usize] {
        &self.magic_points
    }

    /// Interpolation coefficients using the first `m` basis functions.
    pub fn coefficients(&self, values: &DVector<Real>, m: Option<usize>) -> RbResult<Vec<Real>> {
        let m = m.unwrap_or(self.len());
        if m > self.len() {
            return Err(RbError::dimension("interpolation size", m, self.len()));
        }
        let mut rhs = DVector::zeros(m);
        for (i, &point) in self.magic_points[..m].iter().enumerate() {
            rhs[i] = *values
                .get(point)
                .ok_or_else(|| RbError::dimension("magic point", point + 1, values.len()))?;
        }
        let block = self.interpolation_matrix.view((0, 0), (m, m));
        let theta = block
            .solve_lower_triangular(&rhs)
            .ok_or_else(|| RbError::SolverDivergence {
                what: "singular interpolation matrix".to_string(),
            })?;
        Ok(theta.iter().copied().collect())
    }
}
