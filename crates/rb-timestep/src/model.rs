//! Residual-form transient model.

use nalgebra::{DMatrix, DVector};
use rb_core::{RbResult, Real};

/// A DAE `F(t, y, y_dot) = 0`.
///
/// `jacobian` returns `dF/dy + c * dF/dy_dot` where `c` is the derivative
/// coefficient of the active integrator (`y_dot = c * y + ...`).
pub trait ResidualModel {
    fn residual(&self, t: Real, y: &DVector<Real>, y_dot: &DVector<Real>) -> RbResult<DVector<Real>>;

    fn jacobian(
        &self,
        t: Real,
        y: &DVector<Real>,
        y_dot: &DVector<Real>,
        y_dot_coefficient: Real,
    ) -> RbResult<DMatrix<Real>>;

    /// Values imposed on the leading unknowns at time `t`, if any.
    fn boundary_values(&self, _t: Real) -> RbResult<Option<DVector<Real>>> {
        Ok(None)
    }
}

/// Closure-backed model: `(jacobian_eval, residual_eval, bc_eval)`.
pub struct Callbacks<J, R, B = fn(Real) -> RbResult<Option<DVector<Real>>>> {
    jacobian: J,
    residual: R,
    bc: Option<B>,
}

impl<J, R> Callbacks<J, R>
where
    J: Fn(Real, &DVector<Real>, &DVector<Real>, Real) -> RbResult<DMatrix<Real>>,
    R: Fn(Real, &DVector<Real>, &DVector<Real>) -> RbResult<DVector<Real>>,
{
    pub fn new(jacobian: J, residual: R) -> Self {
        Self {
            jacobian,
            residual,
            bc: None,
        }
    }
}

impl<J, R, B> Callbacks<J, R, B> {
    pub fn with_bc<B2>(self, bc: B2) -> Callbacks<J, R, B2>
    where
        B2: Fn(Real) -> RbResult<Option<DVector<Real>>>,
    {
        Callbacks {
            jacobian: self.jacobian,
            residual: self.residual,
            bc: Some(bc),
        }
    }
}

impl<J, R, B> ResidualModel for Callbacks<J, R, B>
where
    J: Fn(Real, &DVector<Real>, &DVector<Real>, Real) -> RbResult<DMatrix<Real>>,
    R: Fn(Real, &DVector<Real>, &DVector<Real>) -> RbResult<DVector<Real>>,
    B: Fn(Real) -> RbResult<Option<DVector<Real>>>,
{
    fn residual(&self, t: Real, y: &DVector<Real>, y_dot: &DVector<Real>) -> RbResult<DVector<Real>> {
        (self.residual)(t, y, y_dot)
    }

    fn jacobian(
        &self,
        t: Real,
        y: &DVector<Real>,
        y_dot: &DVector<Real>,
        y_dot_coefficient: Real,
    ) -> RbResult<DMatrix<Real>> {
        (self.jacobian)(t, y, y_dot, y_dot_coefficient)
    }

    fn boundary_values(&self, t: Real) -> RbResult<Option<DVector<Real>>> {
        match &self.bc {
            Some(bc) => bc(t),
            None => Ok(None),
        }
    }
}
