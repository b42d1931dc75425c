//! Generic online solve for truth and reduced problems.
//!
//! The same code runs both: the only difference is the operator store the
//! assembler reads and the system size `N` (full dimension for truth and
//! exact problems, the active reduced dimension otherwise).

use nalgebra::{DMatrix, DVector};
use rb_affine::{OperatorAssembler, ThetaContext};
use rb_core::{RbError, RbResult, Real};
use rb_solver::{SolverResult, newton_solve, solve_linear};
use rb_timestep::{ResidualModel, TimeStepping};
use tracing::debug;

use crate::context::SolveContext;
use crate::definition::{Formulation, terms};
use crate::engine::{Engine, ProblemEntry};
use crate::state::{Solution, Trajectory};

const FD_EPSILON: Real = 1e-7;

pub(crate) fn solve(engine: &Engine, entry: &ProblemEntry, size: usize) -> RbResult<Solution> {
    let ctx = SolveContext::new(engine, entry);
    let definition = &entry.definition;
    let assembler = OperatorAssembler::new(
        &definition.terms,
        &entry.operators,
        definition.theta.as_ref(),
    );

    match &definition.formulation {
        Formulation::Stationary {
            lhs,
            rhs,
            nonlinear,
        } => {
            let system = StationarySystem {
                ctx: &ctx,
                assembler: &assembler,
                lhs,
                rhs,
                size,
            };
            if *nonlinear {
                system.solve_nonlinear(engine)
            } else {
                system.solve_linear()
            }
        }
        Formulation::Parabolic {
            mass,
            stiffness,
            source,
            nonlinear,
        } => {
            let model = ParabolicModel {
                ctx: &ctx,
                assembler: &assembler,
                mass,
                stiffness,
                source,
                size,
                nonlinear: *nonlinear,
                constrained: definition.terms.contains(terms::DIRICHLET_BC),
            };
            solve_parabolic(engine, entry, model)
        }
    }
}

struct StationarySystem<'a> {
    ctx: &'a SolveContext<'a>,
    assembler: &'a OperatorAssembler<'a>,
    lhs: &'a str,
    rhs: &'a str,
    size: usize,
}

impl StationarySystem<'_> {
    fn residual(&self, x: &DVector<Real>) -> RbResult<DVector<Real>> {
        self.ctx.publish(x);
        let a = self.assembler.assemble_matrix(self.lhs, Some(self.size), self.ctx)?;
        let f = self.assembler.assemble_vector(self.rhs, Some(self.size), self.ctx)?;
        Ok(a * x - f)
    }

    fn solve_linear(&self) -> RbResult<Solution> {
        let a = self.assembler.assemble_matrix(self.lhs, Some(self.size), self.ctx)?;
        let f = self.assembler.assemble_vector(self.rhs, Some(self.size), self.ctx)?;
        let x = solve_linear(&a, &f)?;
        Ok(Solution::stationary(x))
    }

    fn solve_nonlinear(&self, engine: &Engine) -> RbResult<Solution> {
        let residual = |x: &DVector<Real>| -> SolverResult<DVector<Real>> { Ok(self.residual(x)?) };
        let newton = &engine.config().newton;
        let jacobian = |x: &DVector<Real>| newton.difference.jacobian(x, residual, FD_EPSILON);
        let initial = self
            .ctx
            .current()
            .unwrap_or_else(|| DVector::zeros(self.size));

        let result = newton_solve(initial, residual, jacobian, newton)?;
        debug!(
            iterations = result.iterations,
            residual = result.residual_norm,
            "nonlinear solve converged"
        );
        self.ctx.publish(&result.x);
        Ok(Solution::stationary(result.x))
    }
}

/// `M(t) y_dot + A(t) y - f(t)` over a problem's own operators.
struct ParabolicModel<'a> {
    ctx: &'a SolveContext<'a>,
    assembler: &'a OperatorAssembler<'a>,
    mass: &'a str,
    stiffness: &'a str,
    source: &'a str,
    size: usize,
    nonlinear: bool,
    constrained: bool,
}

impl ParabolicModel<'_> {
    fn matrices(&self, t: Real, y: &DVector<Real>) -> RbResult<(DMatrix<Real>, DMatrix<Real>)> {
        self.ctx.set_time(t);
        self.ctx.publish(y);
        let m = self.assembler.assemble_matrix(self.mass, Some(self.size), self.ctx)?;
        let a = self
            .assembler
            .assemble_matrix(self.stiffness, Some(self.size), self.ctx)?;
        Ok((m, a))
    }

    /// Forward differences in `y`, moving `y_dot` along with it.
    fn difference_jacobian(
        &self,
        t: Real,
        y: &DVector<Real>,
        y_dot: &DVector<Real>,
        c: Real,
    ) -> RbResult<DMatrix<Real>> {
        let base = self.residual(t, y, y_dot)?;
        let mut jac = DMatrix::zeros(base.len(), y.len());
        let mut y_probe = y.clone();
        let mut y_dot_probe = y_dot.clone();
        for j in 0..y.len() {
            let h = FD_EPSILON * y[j].abs().max(1.0);
            y_probe[j] = y[j] + h;
            y_dot_probe[j] = y_dot[j] + c * h;
            let probe = self.residual(t, &y_probe, &y_dot_probe)?;
            y_probe[j] = y[j];
            y_dot_probe[j] = y_dot[j];
            jac.set_column(j, &((probe - &base) / h));
        }
        self.ctx.publish(y);
        Ok(jac)
    }
}

impl ResidualModel for ParabolicModel<'_> {
    fn residual(&self, t: Real, y: &DVector<Real>, y_dot: &DVector<Real>) -> RbResult<DVector<Real>> {
        let (m, a) = self.matrices(t, y)?;
        let f = self
            .assembler
            .assemble_vector(self.source, Some(self.size), self.ctx)?;
        Ok(m * y_dot + a * y - f)
    }

    fn jacobian(
        &self,
        t: Real,
        y: &DVector<Real>,
        y_dot: &DVector<Real>,
        y_dot_coefficient: Real,
    ) -> RbResult<DMatrix<Real>> {
        if self.nonlinear {
            return self.difference_jacobian(t, y, y_dot, y_dot_coefficient);
        }
        let (m, a) = self.matrices(t, y)?;
        Ok(m * y_dot_coefficient + a)
    }

    fn boundary_values(&self, t: Real) -> RbResult<Option<DVector<Real>>> {
        if !self.constrained {
            return Ok(None);
        }
        self.ctx.set_time(t);
        let values = self.assembler.compute_theta(terms::DIRICHLET_BC, self.ctx)?;
        Ok(Some(DVector::from_vec(values)))
    }
}

fn solve_parabolic(
    engine: &Engine,
    entry: &ProblemEntry,
    model: ParabolicModel<'_>,
) -> RbResult<Solution> {
    let parameters = engine.config().time_stepping.clone();
    model.ctx.set_time(parameters.initial_time);
    let initial = initial_condition(entry, &model)?;
    model.ctx.publish(&initial);

    let ctx = model.ctx;
    let outcome = TimeStepping::new(model, initial)
        .with_parameters(parameters)
        .solve()?;
    ctx.set_time(outcome.status.final_time);

    let coefficients = outcome.final_state().clone();
    let derivative = outcome.final_derivative().clone();
    debug!(
        steps = outcome.status.steps,
        newton_iterations = outcome.status.newton_iterations,
        "time-stepped solve finished"
    );
    Ok(Solution {
        coefficients,
        derivative: Some(derivative),
        trajectory: Some(Trajectory {
            times: outcome.times,
            states: outcome.states,
            derivatives: outcome.derivatives,
        }),
    })
}

/// `X_N y0 = sum_k theta_k ic_k[:N]`, or zero without an initial-condition term.
fn initial_condition(entry: &ProblemEntry, model: &ParabolicModel<'_>) -> RbResult<DVector<Real>> {
    if !entry.definition.terms.contains(terms::INITIAL_CONDITION) {
        return Ok(DVector::zeros(model.size));
    }
    let rhs = model.assembler.assemble_vector(
        terms::INITIAL_CONDITION,
        Some(model.size),
        model.ctx as &dyn ThetaContext,
    )?;
    let inner_product = entry.operators.expansion(terms::INNER_PRODUCT)?;
    let operator = match (inner_product.len(), inner_product.get(0)) {
        (1, Some(operator)) => operator,
        (len, _) => {
            return Err(RbError::invalid_arg(format!(
                "inner product of problem {} must hold exactly one operator, found {}",
                entry.name, len
            )));
        }
    };
    let x = operator.slice(model.size)?.into_matrix()?;
    Ok(solve_linear(&x, &rhs)?)
}
