//! rb-core: stable foundation for reducedflow.
//!
//! Contains:
//! - numeric (Real + finiteness checks)
//! - ids (registry positions of problems)
//! - parameters (the parameter vector `mu` and its admissible range)
//! - error (shared error taxonomy)

pub mod error;
pub mod ids;
pub mod numeric;
pub mod parameters;

// Re-exports: nice ergonomics for downstream crates
pub use error::{RbError, RbResult};
pub use ids::ProblemId;
pub use numeric::*;
pub use parameters::{Mu, MuRange};
