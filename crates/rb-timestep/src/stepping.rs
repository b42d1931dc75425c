//! Fixed-step implicit time stepping with a Newton solve per step.

use nalgebra::{DMatrix, DVector};
use rb_core::{RbError, RbResult, Real};
use rb_solver::{SolverResult, newton_solve};
use tracing::{debug, trace};

use crate::integrator::{Bdf2, ImplicitEuler, Integrator};
use crate::model::ResidualModel;
use crate::parameters::{IntegratorType, TimeSteppingParameters};

/// Summary of a completed run.
#[derive(Clone, Debug, PartialEq)]
pub struct TimeSteppingStatus {
    pub steps: usize,
    /// Newton iterations summed over all steps
    pub newton_iterations: usize,
    pub final_time: Real,
}

/// Recorded trajectory. Index 0 is the initial state; its derivative is
/// reported as zero.
#[derive(Clone, Debug)]
pub struct TimeSteppingOutcome {
    pub status: TimeSteppingStatus,
    pub times: Vec<Real>,
    pub states: Vec<DVector<Real>>,
    pub derivatives: Vec<DVector<Real>>,
}

impl TimeSteppingOutcome {
    pub fn final_state(&self) -> &DVector<Real> {
        &self.states[self.states.len() - 1]
    }

    pub fn final_derivative(&self) -> &DVector<Real> {
        &self.derivatives[self.derivatives.len() - 1]
    }
}

pub struct TimeStepping<M> {
    model: M,
    initial_state: DVector<Real>,
    parameters: TimeSteppingParameters,
}

impl<M: ResidualModel> TimeStepping<M> {
    pub fn new(model: M, initial_state: DVector<Real>) -> Self {
        Self {
            model,
            initial_state,
            parameters: TimeSteppingParameters::default(),
        }
    }

    pub fn with_parameters(mut self, parameters: TimeSteppingParameters) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn set_parameters(&mut self, parameters: TimeSteppingParameters) {
        self.parameters = parameters;
    }

    pub fn parameters(&self) -> &TimeSteppingParameters {
        &self.parameters
    }

    pub fn solve(&self) -> RbResult<TimeSteppingOutcome> {
        let params = &self.parameters;
        params.validate()?;

        let steps = params.step_count();
        if steps > params.max_steps {
            return Err(RbError::invalid_arg(format!(
                "horizon needs {} steps, max_steps is {}",
                steps, params.max_steps
            )));
        }
        let dt = if steps > 0 {
            (params.final_time - params.initial_time) / steps as Real
        } else {
            0.0
        };
        let rule: &dyn Integrator = match params.integrator {
            IntegratorType::ImplicitEuler => &ImplicitEuler,
            IntegratorType::Bdf2 => &Bdf2,
        };
        let newton = params.newton_config();
        let dim = self.initial_state.len();

        let mut times = vec![params.initial_time];
        let mut states = vec![self.initial_state.clone()];
        let mut derivatives = vec![DVector::zeros(dim)];
        let mut newton_iterations = 0;

        for step in 1..=steps {
            let t = params.initial_time + step as Real * dt;
            let (c, offset) = rule.derivative_rule(dt, &states);
            let constraint = self.model.boundary_values(t)?;
            if let Some(values) = &constraint {
                if values.len() > dim {
                    return Err(RbError::dimension("boundary values", values.len(), dim));
                }
            }

            let y_dot_of = |y: &DVector<Real>| c * y + &offset;
            let residual = |y: &DVector<Real>| -> SolverResult<DVector<Real>> {
                let mut r = self.model.residual(t, y, &y_dot_of(y))?;
                if r.len() != dim {
                    return Err(RbError::dimension("residual length", r.len(), dim).into());
                }
                if let Some(values) = &constraint {
                    for (i, value) in values.iter().enumerate() {
                        r[i] = y[i] - value;
                    }
                }
                Ok(r)
            };
            let jacobian = |y: &DVector<Real>| -> SolverResult<DMatrix<Real>> {
                let mut jac = self.model.jacobian(t, y, &y_dot_of(y), c)?;
                if let Some(values) = &constraint {
                    for i in 0..values.len() {
                        jac.row_mut(i).fill(0.0);
                        jac[(i, i)] = 1.0;
                    }
                }
                Ok(jac)
            };

            let mut guess = states[states.len() - 1].clone();
            if let Some(values) = &constraint {
                guess.rows_mut(0, values.len()).copy_from(values);
            }
            let result = newton_solve(guess, residual, jacobian, &newton)?;
            trace!(step, time = t, iterations = result.iterations, "time step");

            newton_iterations += result.iterations;
            derivatives.push(y_dot_of(&result.x));
            states.push(result.x);
            times.push(t);
        }

        debug!(steps, newton_iterations, "time stepping finished");
        Ok(TimeSteppingOutcome {
            status: TimeSteppingStatus {
                steps,
                newton_iterations,
                final_time: times[times.len() - 1],
            },
            times,
            states,
            derivatives,
        })
    }
}
