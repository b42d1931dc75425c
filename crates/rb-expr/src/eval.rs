//! Nodal evaluation of an expression onto a function space.

use crate::expr::Expr;
use crate::space::FunctionSpace;
use nalgebra::DVector;
use rb_core::{Mu, ProblemId, RbError, RbResult, Real};

/// Values an expression needs from its surroundings.
pub trait EvalEnv {
    fn mu(&self) -> &Mu;

    fn time(&self) -> Real;

    /// Nodal values of a solution (or one of its components) on the target space.
    fn solution(&self, problem: ProblemId, component: Option<&str>) -> RbResult<DVector<Real>>;
}

/// Interpolate `expr` onto `space`: one value per degree of freedom.
pub fn interpolate(expr: &Expr, space: &FunctionSpace, env: &dyn EvalEnv) -> RbResult<DVector<Real>> {
    let n = space.dim();
    let values = eval_node(expr, space, env, n)?;
    if values.len() != n {
        return Err(RbError::dimension("interpolated expression", values.len(), n));
    }
    Ok(values)
}

fn eval_node(expr: &Expr, space: &FunctionSpace, env: &dyn EvalEnv, n: usize) -> RbResult<DVector<Real>> {
    match expr {
        Expr::Constant(v) => Ok(DVector::from_element(n, *v)),
        Expr::Parameter(i) => {
            let mu = env.mu();
            let v = mu
                .get(*i)
                .ok_or_else(|| RbError::dimension("parameter index", i + 1, mu.len()))?;
            Ok(DVector::from_element(n, v))
        }
        Expr::Time => Ok(DVector::from_element(n, env.time())),
        Expr::Coordinate(axis) => space.coordinate(*axis),
        Expr::Solution(_) | Expr::Component { .. } => {
            let terminal = expr.identify_solution().ok_or_else(|| {
                RbError::invalid_arg("component taken of an expression that is not a solution")
            })?;
            let values = env.solution(terminal.problem, terminal.component.as_deref())?;
            if values.len() != n {
                return Err(RbError::dimension(
                    "solution on target space",
                    values.len(),
                    n,
                ));
            }
            Ok(values)
        }
        Expr::Unary { op, arg } => {
            let mut v = eval_node(arg, space, env, n)?;
            v.apply(|x| *x = op.apply(*x));
            Ok(v)
        }
        Expr::Binary { op, lhs, rhs } => {
            let a = eval_node(lhs, space, env, n)?;
            let b = eval_node(rhs, space, env, n)?;
            Ok(a.zip_map(&b, |x, y| op.apply(x, y)))
        }
    }
}
