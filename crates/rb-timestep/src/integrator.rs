//! Implicit derivative rules.

use nalgebra::DVector;
use rb_core::Real;

/// An implicit multistep rule: `y_dot(t_{n+1}) = c * y_{n+1} + offset`.
pub trait Integrator {
    /// `history` holds accepted states, most recent last.
    fn derivative_rule(&self, dt: Real, history: &[DVector<Real>]) -> (Real, DVector<Real>);
}

/// Backward Euler (1st order, one previous state).
#[derive(Clone, Copy, Debug, Default)]
pub struct ImplicitEuler;

impl Integrator for ImplicitEuler {
    fn derivative_rule(&self, dt: Real, history: &[DVector<Real>]) -> (Real, DVector<Real>) {
        let y_n = &history[history.len() - 1];
        (1.0 / dt, -y_n / dt)
    }
}

/// BDF2 (2nd order). The first step falls back to backward Euler.
#[derive(Clone, Copy, Debug, Default)]
pub struct Bdf2;

impl Integrator for Bdf2 {
    fn derivative_rule(&self, dt: Real, history: &[DVector<Real>]) -> (Real, DVector<Real>) {
        if history.len() < 2 {
            return ImplicitEuler.derivative_rule(dt, history);
        }
        let y_n = &history[history.len() - 1];
        let y_nm1 = &history[history.len() - 2];
        (1.5 / dt, (y_nm1 - y_n * 4.0) / (2.0 * dt))
    }
}
