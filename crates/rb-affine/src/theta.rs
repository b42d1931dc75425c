//! Parameter-dependent scalar weights of an affine expansion.

use nalgebra::DVector;
use rb_core::{Mu, RbError, RbResult, Real};

/// What a theta function may read while it is evaluated.
///
/// `expression` hands back the interpolated value of a named parametrized
/// expression, which may require solving other problems first.
pub trait ThetaContext {
    fn mu(&self) -> Mu;

    fn time(&self) -> Real;

    fn expression(&self, name: &str) -> RbResult<DVector<Real>>;
}

/// `compute_theta(term)` for one problem.
pub trait ThetaFunction {
    fn compute_theta(&self, term: &str, ctx: &dyn ThetaContext) -> RbResult<Vec<Real>>;
}

impl<F> ThetaFunction for F
where
    F: Fn(&str, &dyn ThetaContext) -> RbResult<Vec<Real>>,
{
    fn compute_theta(&self, term: &str, ctx: &dyn ThetaContext) -> RbResult<Vec<Real>> {
        self(term, ctx)
    }
}

/// Context with a fixed `mu` and time and no expressions.
#[derive(Clone, Debug, Default)]
pub struct StaticContext {
    pub mu: Mu,
    pub time: Real,
}

impl StaticContext {
    pub fn new(mu: impl Into<Mu>) -> Self {
        Self {
            mu: mu.into(),
            time: 0.0,
        }
    }
}

impl ThetaContext for StaticContext {
    fn mu(&self) -> Mu {
        self.mu.clone()
    }

    fn time(&self) -> Real {
        self.time
    }

    fn expression(&self, name: &str) -> RbResult<DVector<Real>> {
        Err(RbError::UnknownExpression {
            name: name.to_string(),
        })
    }
}
