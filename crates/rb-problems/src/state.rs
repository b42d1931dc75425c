//! Problem roles and the explicit solve state machine.

use nalgebra::DVector;
use rb_core::{ProblemId, Real};

/// How a registered problem relates to the others.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProblemRole {
    /// A full-order problem registered by the user.
    Truth,
    /// Independent full-order copy of `of`, solved when another problem
    /// references `of` from outside its own solve.
    Exact { of: ProblemId },
    /// Reduced counterpart of a trained truth problem.
    Reduced { truth: ProblemId },
}

/// Time history of a time-stepped solve.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Trajectory {
    pub times: Vec<Real>,
    pub states: Vec<DVector<Real>>,
    pub derivatives: Vec<DVector<Real>>,
}

/// Result of a completed solve, in the problem's own coordinates (full-order
/// degrees of freedom for truth problems, reduced coefficients otherwise).
#[derive(Clone, Debug, PartialEq)]
pub struct Solution {
    pub coefficients: DVector<Real>,
    pub derivative: Option<DVector<Real>>,
    pub trajectory: Option<Trajectory>,
}

impl Solution {
    pub fn stationary(coefficients: DVector<Real>) -> Self {
        Self {
            coefficients,
            derivative: None,
            trajectory: None,
        }
    }
}

/// `Unsolved -> Solving -> Solved`; a failed solve falls back to `Unsolved`.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum SolveState {
    #[default]
    Unsolved,
    /// In progress; `current` is the latest iterate, readable by expressions
    /// that reference this problem while it is being solved.
    Solving { current: DVector<Real> },
    Solved(Solution),
}

impl SolveState {
    pub fn is_solving(&self) -> bool {
        matches!(self, SolveState::Solving { .. })
    }

    /// In-progress iterate or stored solution, whichever is present.
    pub fn latest(&self) -> Option<&DVector<Real>> {
        match self {
            SolveState::Unsolved => None,
            SolveState::Solving { current } => Some(current),
            SolveState::Solved(solution) => Some(&solution.coefficients),
        }
    }
}
