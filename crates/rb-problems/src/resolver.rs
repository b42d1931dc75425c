//! Cross-problem resolution of parametrized expressions.
//!
//! The first time an expression name is seen its tree is walked once to find
//! which truth problems (and which of their components) it reads; that
//! structure is cached. Every call then decides per referenced problem
//! whether to reuse an in-progress solution, solve the reduced problem (when
//! training is finished) or solve the exact twin, copies the requested
//! components into fresh placeholders and interpolates.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;

use nalgebra::DVector;
use rb_core::{Mu, ProblemId, RbError, RbResult, Real};
use rb_expr::{EvalEnv, Expr, ParametrizedExpression, interpolate};
use tracing::debug;

use crate::engine::Engine;
use crate::state::ProblemRole;

/// What an expression reads, discovered once per expression name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExpressionStructure {
    /// Referenced truth problems, unique, in discovery order.
    pub truth_problems: Vec<ProblemId>,
    /// Components read from each truth problem; `None` is the whole solution.
    pub components: BTreeMap<ProblemId, Vec<Option<String>>>,
    pub exact: BTreeMap<ProblemId, ProblemId>,
}

/// Structural cache keyed by expression name. Holds no parameter-dependent
/// data; entries are only added until [`ExpressionCache::clear`].
#[derive(Debug, Default)]
pub struct ExpressionCache {
    entries: RefCell<HashMap<String, Rc<ExpressionStructure>>>,
    discoveries: Cell<usize>,
    hits: Cell<usize>,
}

impl ExpressionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Rc<ExpressionStructure>> {
        let found = self.entries.borrow().get(name).cloned();
        if found.is_some() {
            self.hits.set(self.hits.get() + 1);
        }
        found
    }

    fn insert(&self, name: &str, structure: Rc<ExpressionStructure>) {
        self.discoveries.set(self.discoveries.get() + 1);
        self.entries.borrow_mut().insert(name.to_string(), structure);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.borrow().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Number of structural discoveries so far (not reset by `clear`).
    pub fn discoveries(&self) -> usize {
        self.discoveries.get()
    }

    pub fn hits(&self) -> usize {
        self.hits.get()
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}

/// Who asks for the expression: `mu` and time to evaluate at and, when the
/// request comes from a theta function, the problem being solved.
#[derive(Clone, Debug)]
pub(crate) struct Driver {
    pub(crate) mu: Mu,
    pub(crate) time: Real,
    pub(crate) problem: Option<ProblemId>,
}

pub(crate) fn resolve(
    engine: &Engine,
    expression: &ParametrizedExpression,
    driver: &Driver,
) -> RbResult<DVector<Real>> {
    let structure = match engine.cache().get(&expression.name) {
        Some(structure) => structure,
        None => {
            let structure = Rc::new(discover(engine, &expression.expr)?);
            engine.cache().insert(&expression.name, Rc::clone(&structure));
            structure
        }
    };

    let mut placeholders = BTreeMap::new();
    let mut truth_solves = Vec::new();
    let mut reduced_solves = Vec::new();

    for &truth in &structure.truth_problems {
        // An exact twin reads its own solution where its definition names the truth problem.
        let local = match driver.problem {
            Some(d) if engine.role(d)? == (ProblemRole::Exact { of: truth }) => d,
            _ => truth,
        };
        if let Some(current) = engine.in_progress(local)? {
            debug!(problem = %engine.name(local)?, "reusing in-progress solution");
            placeholders.insert(truth, fill(engine, &structure, truth, &current)?);
        } else if let Some(reduced) = engine.reduced_problem(truth)? {
            match engine.in_progress(reduced)? {
                Some(current) => {
                    debug!(problem = %engine.name(reduced)?, "reusing in-progress reduced solution");
                    let full = engine.expand(reduced, &current)?;
                    placeholders.insert(truth, fill(engine, &structure, truth, &full)?);
                }
                None => reduced_solves.push((truth, reduced)),
            }
        } else {
            let exact = structure
                .exact
                .get(&truth)
                .copied()
                .ok_or_else(|| RbError::UnknownProblem {
                    what: format!("exact problem of {truth}"),
                })?;
            truth_solves.push((truth, exact));
        }
    }

    for (truth, exact) in truth_solves {
        debug!(problem = %engine.name(exact)?, mu = %driver.mu, "requiring truth solve");
        engine.set_mu(exact, driver.mu.clone())?;
        let solution = engine.solve(exact)?;
        placeholders.insert(truth, fill(engine, &structure, truth, &solution)?);
    }

    for (truth, reduced) in reduced_solves {
        debug!(problem = %engine.name(reduced)?, mu = %driver.mu, "requiring reduced solve");
        engine.set_mu(reduced, driver.mu.clone())?;
        let coefficients = engine.solve(reduced)?;
        let full = engine.expand(reduced, &coefficients)?;
        placeholders.insert(truth, fill(engine, &structure, truth, &full)?);
    }

    let env = PlaceholderEnv {
        engine,
        mu: &driver.mu,
        time: driver.time,
        placeholders: &placeholders,
    };
    interpolate(&expression.expr, &expression.space, &env)
}

/// Walk the tree once, registering each distinct solution terminal.
fn discover(engine: &Engine, expr: &Expr) -> RbResult<ExpressionStructure> {
    // Node identity, not structural equality: two separate references to the
    // same solution are both terminals.
    let mut visited: HashSet<*const Expr> = HashSet::new();
    let mut structure = ExpressionStructure::default();

    for node in expr.pre_order() {
        if visited.contains(&(node as *const Expr)) {
            continue;
        }
        let Some(terminal) = node.identify_solution() else {
            continue;
        };

        let truth = engine.truth_of(terminal.problem)?;
        let entry = engine.entry(truth)?;
        let component = terminal.component.clone();
        if entry.definition.layout.range(component.as_deref()).is_none() {
            return Err(RbError::UnknownComponent {
                problem: entry.name.clone(),
                component: component.unwrap_or_default(),
            });
        }

        if !structure.exact.contains_key(&truth) {
            let exact = engine.exact_problem(truth)?;
            structure.truth_problems.push(truth);
            structure.exact.insert(truth, exact);
        }
        let components = structure.components.entry(truth).or_default();
        if !components.contains(&component) {
            components.push(component);
        }

        visited.insert(node as *const Expr);
        visited.insert(terminal.minimal as *const Expr);
        for nested in &terminal.nested {
            visited.insert(*nested as *const Expr);
        }
    }

    debug!(problems = structure.truth_problems.len(), "discovered expression structure");
    Ok(structure)
}

/// Zero placeholder for `truth` with every referenced component copied from
/// `source` (full-order degrees of freedom).
fn fill(
    engine: &Engine,
    structure: &ExpressionStructure,
    truth: ProblemId,
    source: &DVector<Real>,
) -> RbResult<DVector<Real>> {
    let entry = engine.entry(truth)?;
    let layout = &entry.definition.layout;
    let mut placeholder = DVector::zeros(layout.dim());
    for component in structure.components.get(&truth).into_iter().flatten() {
        layout.assign(&mut placeholder, source, component.as_deref())?;
    }
    Ok(placeholder)
}

struct PlaceholderEnv<'a> {
    engine: &'a Engine,
    mu: &'a Mu,
    time: Real,
    placeholders: &'a BTreeMap<ProblemId, DVector<Real>>,
}

impl EvalEnv for PlaceholderEnv<'_> {
    fn mu(&self) -> &Mu {
        self.mu
    }

    fn time(&self) -> Real {
        self.time
    }

    fn solution(&self, problem: ProblemId, component: Option<&str>) -> RbResult<DVector<Real>> {
        let truth = self.engine.truth_of(problem)?;
        let entry = self.engine.entry(truth)?;
        let placeholder = self
            .placeholders
            .get(&truth)
            .ok_or_else(|| RbError::UnknownProblem {
                what: entry.name.clone(),
            })?;
        entry
            .definition
            .layout
            .extract(placeholder, component)
            .ok_or_else(|| RbError::UnknownComponent {
                problem: entry.name.clone(),
                component: component.unwrap_or_default().to_string(),
            })
    }
}
