//! Symbolic expressions over problem solutions and their nodal interpolation.
//!
//! Provides:
//! - `Expr`: a small expression tree whose terminals may read the solution
//!   (or a named component of it) of another parametrized problem
//! - pre-order traversal and solution-terminal identification
//! - `FunctionSpace` / `ComponentLayout`: the algebraic stand-ins for a
//!   Lagrange space and a mixed solution
//! - nodal evaluation of an expression onto a space

pub mod eval;
pub mod expr;
pub mod space;

pub use eval::{EvalEnv, interpolate};
pub use expr::{BinaryOp, Expr, ParametrizedExpression, PreOrder, SolutionTerminal, UnaryOp};
pub use space::{ComponentLayout, ComponentSpec, FunctionSpace};
