//! Residual-form time stepping for (reduced) transient problems.
//!
//! Provides:
//! - `ResidualModel`: `residual(t, y, y_dot)` / `jacobian(t, y, y_dot, c)` / `bc(t)`
//! - `Callbacks`: a `ResidualModel` built from plain closures
//! - implicit Euler and BDF2 derivative rules with a Newton solve per step
//! - `TimeSteppingParameters`, configurable from serde or a flat options map

pub mod integrator;
pub mod model;
pub mod parameters;
pub mod stepping;

pub use integrator::{Bdf2, ImplicitEuler, Integrator};
pub use model::{Callbacks, ResidualModel};
pub use parameters::{IntegratorType, OptionValue, TimeSteppingParameters};
pub use stepping::{TimeStepping, TimeSteppingOutcome, TimeSteppingStatus};
