//! Affine expansions of parametrized operators and their online assembly.
//!
//! A parametrized operator `A(mu)` is stored as `sum_k theta_k(mu) A_k`: the
//! parameter-independent `A_k` live in an [`AffineOperatorStore`], the scalar
//! weights come from a [`ThetaFunction`], and the [`OperatorAssembler`]
//! collapses both into one concrete matrix, vector or scalar of size N.

pub mod assembler;
pub mod expansion;
pub mod interpolation;
pub mod operator;
pub mod projection;
pub mod store;
pub mod theta;

pub use assembler::{OperatorAssembler, assemble};
pub use expansion::AffineExpansion;
pub use interpolation::EmpiricalInterpolation;
pub use operator::{AlgebraicOperator, TermOrder};
pub use projection::galerkin_project;
pub use store::{AffineOperatorStore, TermDeclarations};
pub use theta::{StaticContext, ThetaContext, ThetaFunction};
