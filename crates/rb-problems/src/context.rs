//! Theta-function context for a problem being solved.

use nalgebra::DVector;
use rb_affine::ThetaContext;
use rb_core::{Mu, RbResult, Real};

use crate::engine::{Engine, ProblemEntry};
use crate::resolver::{self, Driver};

/// Gives theta functions the owning problem's `mu` and time, and resolves
/// its named expressions through the engine.
pub(crate) struct SolveContext<'a> {
    engine: &'a Engine,
    entry: &'a ProblemEntry,
}

impl<'a> SolveContext<'a> {
    pub(crate) fn new(engine: &'a Engine, entry: &'a ProblemEntry) -> Self {
        Self { engine, entry }
    }

    pub(crate) fn set_time(&self, time: Real) {
        self.entry.runtime.borrow_mut().time = time;
    }

    /// Make `iterate` the in-progress solution seen by expressions.
    pub(crate) fn publish(&self, iterate: &DVector<Real>) {
        self.entry.publish(iterate);
    }

    pub(crate) fn current(&self) -> Option<DVector<Real>> {
        self.entry.in_progress()
    }
}

impl ThetaContext for SolveContext<'_> {
    fn mu(&self) -> Mu {
        self.entry.runtime.borrow().mu.clone().unwrap_or_default()
    }

    fn time(&self) -> Real {
        self.entry.runtime.borrow().time
    }

    fn expression(&self, name: &str) -> RbResult<DVector<Real>> {
        let expression = self.entry.definition.expression(name)?;
        let driver = Driver {
            mu: self.mu(),
            time: self.time(),
            problem: Some(self.entry.id),
        };
        resolver::resolve(self.engine, expression, &driver)
    }
}
