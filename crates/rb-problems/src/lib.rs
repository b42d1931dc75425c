//! Parametrized problem registry and the online solve path.
//!
//! An [`Engine`] owns truth problems, their lazily created exact twins and
//! the reduced problems produced by training. Theta functions may ask for
//! named parametrized expressions; those are resolved across problems,
//! solving whatever truth or reduced problem they read from.

pub mod config;
mod context;
pub mod definition;
pub mod engine;
pub mod graph;
mod reduced_solver;
pub mod resolver;
pub mod state;

pub use config::EngineConfig;
pub use definition::{Capabilities, Formulation, ProblemBuilder, ProblemDefinition, terms};
pub use engine::Engine;
pub use graph::DependencyGraph;
pub use resolver::{ExpressionCache, ExpressionStructure};
pub use state::{ProblemRole, Solution, SolveState, Trajectory};
