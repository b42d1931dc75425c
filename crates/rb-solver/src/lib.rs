//! Algebraic solvers used by the online phase.
//!
//! This crate provides a damped Newton solver for small dense nonlinear
//! systems, finite-difference Jacobians, and a checked LU linear solve.

pub mod error;
pub mod jacobian;
pub mod linear;
pub mod newton;

pub use error::{SolverError, SolverResult};
pub use jacobian::{DifferenceScheme, central_difference_jacobian, finite_difference_jacobian};
pub use linear::solve_linear;
pub use newton::{NewtonConfig, NewtonResult, newton_solve};
