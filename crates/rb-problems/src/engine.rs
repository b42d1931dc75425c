//! Problem registry, solve entry point and offline training.

use std::cell::RefCell;
use std::rc::Rc;

use nalgebra::{DMatrix, DVector};
use rb_affine::{AffineOperatorStore, galerkin_project};
use rb_core::{Mu, ProblemId, RbError, RbResult, Real};
use rb_expr::ParametrizedExpression;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::definition::ProblemDefinition;
use crate::graph::DependencyGraph;
use crate::reduced_solver;
use crate::resolver::{self, Driver, ExpressionCache};
use crate::state::{ProblemRole, Solution, SolveState};

/// Mutable per-problem data. Borrowed only for short, non-reentrant spans.
#[derive(Debug, Default)]
pub(crate) struct ProblemRuntime {
    pub(crate) mu: Option<Mu>,
    pub(crate) time: Real,
    pub(crate) state: SolveState,
    pub(crate) solve_count: usize,
    pub(crate) reduced_dimension: Option<usize>,
    pub(crate) reduced: Option<ProblemId>,
    pub(crate) exact: Option<ProblemId>,
}

#[derive(Debug)]
pub(crate) struct ProblemEntry {
    pub(crate) id: ProblemId,
    pub(crate) name: String,
    pub(crate) role: ProblemRole,
    pub(crate) definition: Rc<ProblemDefinition>,
    pub(crate) operators: Rc<AffineOperatorStore>,
    pub(crate) basis: Option<DMatrix<Real>>,
    pub(crate) runtime: RefCell<ProblemRuntime>,
}

impl ProblemEntry {
    /// Size of the algebraic system: the layout dimension for full-order
    /// problems, the active reduced dimension otherwise.
    pub(crate) fn system_size(&self) -> usize {
        match &self.basis {
            Some(basis) => self
                .runtime
                .borrow()
                .reduced_dimension
                .unwrap_or(basis.ncols()),
            None => self.definition.layout.dim(),
        }
    }

    /// Replace the in-progress iterate. No-op unless the problem is solving.
    pub(crate) fn publish(&self, iterate: &DVector<Real>) {
        let mut runtime = self.runtime.borrow_mut();
        if let SolveState::Solving { current } = &mut runtime.state {
            current.clone_from(iterate);
        }
    }

    pub(crate) fn in_progress(&self) -> Option<DVector<Real>> {
        match &self.runtime.borrow().state {
            SolveState::Solving { current } => Some(current.clone()),
            _ => None,
        }
    }

    /// Map coefficients to full-order degrees of freedom (`Z[:, :N] * c`).
    pub(crate) fn expand(&self, coefficients: &DVector<Real>) -> RbResult<DVector<Real>> {
        let Some(basis) = &self.basis else {
            return Ok(coefficients.clone());
        };
        let n = coefficients.len();
        if n > basis.ncols() {
            return Err(RbError::dimension(
                format!("coefficients of problem {}", self.name),
                n,
                basis.ncols(),
            ));
        }
        Ok(basis.columns(0, n) * coefficients)
    }
}

/// Owns every problem and the structural expression cache.
///
/// All methods take `&self`: solves re-enter the engine through theta
/// functions, so per-problem data sits behind `RefCell`s that are never held
/// across a call back into user code.
#[derive(Debug, Default)]
pub struct Engine {
    problems: RefCell<Vec<Rc<ProblemEntry>>>,
    cache: ExpressionCache,
    config: EngineConfig,
    solve_stack: RefCell<Vec<ProblemId>>,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: EngineConfig) {
        self.config = config;
    }

    pub fn cache(&self) -> &ExpressionCache {
        &self.cache
    }

    pub fn reset_caches(&self) {
        self.cache.clear();
    }

    pub fn len(&self) -> usize {
        self.problems.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.problems.borrow().is_empty()
    }

    /// Register a truth problem with its full-order operators.
    pub fn add_problem(
        &self,
        definition: ProblemDefinition,
        operators: AffineOperatorStore,
    ) -> RbResult<ProblemId> {
        definition.validate_operators(&operators, definition.layout.dim())?;
        for entry in self.problems.borrow().iter() {
            if entry.name == definition.name {
                return Err(RbError::invalid_arg(format!(
                    "problem {} already registered",
                    definition.name
                )));
            }
            if entry.role != ProblemRole::Truth {
                continue;
            }
            if let Some(name) = definition
                .expressions
                .keys()
                .find(|name| entry.definition.expressions.contains_key(*name))
            {
                return Err(RbError::invalid_arg(format!(
                    "expression {} already declared by problem {}",
                    name, entry.name
                )));
            }
        }

        let name = definition.name.clone();
        let id = self.register(
            name.clone(),
            ProblemRole::Truth,
            Rc::new(definition),
            Rc::new(operators),
            None,
        );
        debug!(problem = %name, id = %id, "registered truth problem");
        Ok(id)
    }

    /// Declare a named expression on a registered truth problem. Expressions
    /// usually read problem ids, so they are attached after registration and
    /// before the problem gets exact or reduced counterparts.
    pub fn add_expression(
        &self,
        problem: ProblemId,
        expression: ParametrizedExpression,
    ) -> RbResult<()> {
        if let Some(owner) = self.problems.borrow().iter().find(|entry| {
            entry.role == ProblemRole::Truth
                && entry.definition.expressions.contains_key(&expression.name)
        }) {
            return Err(RbError::invalid_arg(format!(
                "expression {} already declared by problem {}",
                expression.name, owner.name
            )));
        }

        let mut problems = self.problems.borrow_mut();
        let slot = problems
            .get_mut(problem.index() as usize)
            .ok_or_else(|| RbError::UnknownProblem {
                what: problem.to_string(),
            })?;
        let name = slot.name.clone();
        let entry = Rc::get_mut(slot)
            .ok_or_else(|| RbError::invalid_arg(format!("problem {name} is being solved")))?;
        if entry.role != ProblemRole::Truth {
            return Err(RbError::invalid_arg(format!(
                "expressions belong to truth problems, {name} is not one"
            )));
        }
        let definition = Rc::get_mut(&mut entry.definition).ok_or_else(|| {
            RbError::invalid_arg(format!(
                "problem {name} already has exact or reduced counterparts"
            ))
        })?;
        debug!(problem = %name, expression = %expression.name, "declared expression");
        definition
            .expressions
            .insert(expression.name.clone(), expression);
        Ok(())
    }

    fn register(
        &self,
        name: String,
        role: ProblemRole,
        definition: Rc<ProblemDefinition>,
        operators: Rc<AffineOperatorStore>,
        basis: Option<DMatrix<Real>>,
    ) -> ProblemId {
        let mut problems = self.problems.borrow_mut();
        let id = ProblemId::from_index(problems.len() as u32);
        let reduced_dimension = basis.as_ref().map(DMatrix::ncols);
        problems.push(Rc::new(ProblemEntry {
            id,
            name,
            role,
            definition,
            operators,
            basis,
            runtime: RefCell::new(ProblemRuntime {
                reduced_dimension,
                ..ProblemRuntime::default()
            }),
        }));
        id
    }

    pub(crate) fn entry(&self, id: ProblemId) -> RbResult<Rc<ProblemEntry>> {
        self.problems
            .borrow()
            .get(id.index() as usize)
            .cloned()
            .ok_or_else(|| RbError::UnknownProblem {
                what: id.to_string(),
            })
    }

    pub(crate) fn entries(&self) -> Vec<Rc<ProblemEntry>> {
        self.problems.borrow().clone()
    }

    pub fn find(&self, name: &str) -> Option<ProblemId> {
        self.problems
            .borrow()
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.id)
    }

    pub fn name(&self, id: ProblemId) -> RbResult<String> {
        Ok(self.entry(id)?.name.clone())
    }

    pub fn role(&self, id: ProblemId) -> RbResult<ProblemRole> {
        Ok(self.entry(id)?.role)
    }

    /// The truth problem `id` stands for (itself for truth problems).
    pub fn truth_of(&self, id: ProblemId) -> RbResult<ProblemId> {
        Ok(match self.role(id)? {
            ProblemRole::Truth => id,
            ProblemRole::Exact { of } => of,
            ProblemRole::Reduced { truth } => truth,
        })
    }

    /// Fails with `InvalidArg`, leaving the previous `mu` in place, when the
    /// problem declares a parameter range that `mu` does not fit.
    pub fn set_mu(&self, id: ProblemId, mu: impl Into<Mu>) -> RbResult<()> {
        let entry = self.entry(id)?;
        let mu = mu.into();
        entry.definition.check_mu(&mu)?;
        entry.runtime.borrow_mut().mu = Some(mu);
        Ok(())
    }

    pub fn mu(&self, id: ProblemId) -> RbResult<Option<Mu>> {
        Ok(self.entry(id)?.runtime.borrow().mu.clone())
    }

    pub fn set_time(&self, id: ProblemId, time: Real) -> RbResult<()> {
        self.entry(id)?.runtime.borrow_mut().time = time;
        Ok(())
    }

    pub fn time(&self, id: ProblemId) -> RbResult<Real> {
        Ok(self.entry(id)?.runtime.borrow().time)
    }

    /// Solve `id` at its current `mu` and store the result.
    ///
    /// Returns the solution in the problem's own coordinates. While the solve
    /// runs the problem is `Solving` and expressions that read it get the
    /// in-progress iterate. Requesting a solve of a problem that is already
    /// `Solving` is a dependency cycle.
    pub fn solve(&self, id: ProblemId) -> RbResult<DVector<Real>> {
        let entry = self.entry(id)?;
        let mu = entry
            .runtime
            .borrow()
            .mu
            .clone()
            .ok_or_else(|| RbError::MissingParameter {
                problem: entry.name.clone(),
            })?;
        if entry.runtime.borrow().state.is_solving() {
            return Err(self.cycle_error(id));
        }

        let size = entry.system_size();
        let warm_start = entry.definition.formulation.is_nonlinear();
        {
            let mut runtime = entry.runtime.borrow_mut();
            let current = match runtime.state.latest() {
                Some(previous) if warm_start && previous.len() == size => previous.clone(),
                _ => DVector::zeros(size),
            };
            runtime.state = SolveState::Solving { current };
            runtime.solve_count += 1;
        }

        self.solve_stack.borrow_mut().push(id);
        info!(problem = %entry.name, mu = %mu, size, "solving");
        let outcome = reduced_solver::solve(self, &entry, size);
        self.solve_stack.borrow_mut().pop();

        let mut runtime = entry.runtime.borrow_mut();
        match outcome {
            Ok(solution) => {
                let coefficients = solution.coefficients.clone();
                runtime.state = SolveState::Solved(solution);
                Ok(coefficients)
            }
            Err(err) => {
                runtime.state = SolveState::Unsolved;
                debug!(problem = %entry.name, error = %err, "solve failed");
                Err(err)
            }
        }
    }

    fn cycle_error(&self, id: ProblemId) -> RbError {
        let stack = self.solve_stack.borrow().clone();
        let start = stack.iter().position(|s| *s == id).unwrap_or(0);
        let chain = stack[start..]
            .iter()
            .chain(std::iter::once(&id))
            .map(|s| self.name(*s).unwrap_or_else(|_| s.to_string()))
            .collect();
        RbError::DependencyCycle { chain }
    }

    pub fn is_solving(&self, id: ProblemId) -> RbResult<bool> {
        Ok(self.entry(id)?.runtime.borrow().state.is_solving())
    }

    pub fn state(&self, id: ProblemId) -> RbResult<SolveState> {
        Ok(self.entry(id)?.runtime.borrow().state.clone())
    }

    /// Latest solution in the problem's own coordinates: the in-progress
    /// iterate while solving, the stored solution afterwards.
    pub fn solution(&self, id: ProblemId) -> RbResult<Option<DVector<Real>>> {
        Ok(self.entry(id)?.runtime.borrow().state.latest().cloned())
    }

    pub fn stored_solution(&self, id: ProblemId) -> RbResult<Option<Solution>> {
        Ok(match &self.entry(id)?.runtime.borrow().state {
            SolveState::Solved(solution) => Some(solution.clone()),
            _ => None,
        })
    }

    /// Latest solution mapped to full-order degrees of freedom.
    pub fn full_order_solution(&self, id: ProblemId) -> RbResult<Option<DVector<Real>>> {
        let entry = self.entry(id)?;
        let latest = entry.runtime.borrow().state.latest().cloned();
        latest.map(|c| entry.expand(&c)).transpose()
    }

    pub(crate) fn in_progress(&self, id: ProblemId) -> RbResult<Option<DVector<Real>>> {
        Ok(self.entry(id)?.in_progress())
    }

    pub(crate) fn expand(&self, id: ProblemId, coefficients: &DVector<Real>) -> RbResult<DVector<Real>> {
        self.entry(id)?.expand(coefficients)
    }

    pub fn solve_count(&self, id: ProblemId) -> RbResult<usize> {
        Ok(self.entry(id)?.runtime.borrow().solve_count)
    }

    pub fn training_finished(&self, id: ProblemId) -> RbResult<bool> {
        Ok(self.reduced_problem(id)?.is_some())
    }

    pub fn reduced_problem(&self, id: ProblemId) -> RbResult<Option<ProblemId>> {
        Ok(self.entry(id)?.runtime.borrow().reduced)
    }

    /// The exact twin of a truth problem, created on first request. It shares
    /// definition and operators but keeps its own `mu` and solve state.
    pub fn exact_problem(&self, id: ProblemId) -> RbResult<ProblemId> {
        let entry = self.entry(id)?;
        match entry.role {
            ProblemRole::Truth => {}
            ProblemRole::Exact { .. } => return Ok(id),
            ProblemRole::Reduced { truth } => return self.exact_problem(truth),
        }
        if let Some(exact) = entry.runtime.borrow().exact {
            return Ok(exact);
        }
        let exact = self.register(
            format!("{}_exact", entry.name),
            ProblemRole::Exact { of: id },
            Rc::clone(&entry.definition),
            Rc::clone(&entry.operators),
            None,
        );
        entry.runtime.borrow_mut().exact = Some(exact);
        debug!(problem = %entry.name, exact = %exact, "created exact problem");
        Ok(exact)
    }

    pub fn basis(&self, id: ProblemId) -> RbResult<Option<DMatrix<Real>>> {
        Ok(self.entry(id)?.basis.clone())
    }

    /// Copy of the operators a problem assembles from: full-order for truth
    /// and exact problems, projected for reduced ones.
    pub fn operators(&self, id: ProblemId) -> RbResult<AffineOperatorStore> {
        Ok(self.entry(id)?.operators.as_ref().clone())
    }

    pub fn reduced_dimension(&self, id: ProblemId) -> RbResult<Option<usize>> {
        Ok(self.entry(id)?.runtime.borrow().reduced_dimension)
    }

    /// Use only the leading `n` basis functions in later reduced solves.
    /// A trained truth problem forwards to its reduced problem.
    pub fn set_reduced_dimension(&self, id: ProblemId, n: usize) -> RbResult<()> {
        let id = match self.role(id)? {
            ProblemRole::Reduced { .. } => id,
            _ => self.reduced_problem(id)?.ok_or_else(|| {
                RbError::invalid_arg(format!("problem {id} has no reduced basis"))
            })?,
        };
        let entry = self.entry(id)?;
        let available = entry.basis.as_ref().map_or(0, DMatrix::ncols);
        if n == 0 || n > available {
            return Err(RbError::dimension(
                format!("reduced dimension of problem {}", entry.name),
                n,
                available,
            ));
        }
        entry.runtime.borrow_mut().reduced_dimension = Some(n);
        Ok(())
    }

    /// Galerkin-project a truth problem onto `basis` (one column per basis
    /// function) and finish its training.
    pub fn train(&self, truth: ProblemId, basis: DMatrix<Real>) -> RbResult<ProblemId> {
        let entry = self.entry(truth)?;
        let reduced_operators = galerkin_project(&entry.operators, &basis)?;
        self.attach_reduced(truth, reduced_operators, basis)
    }

    /// Finish training with precomputed reduced operators, e.g. loaded from
    /// offline storage.
    pub fn attach_reduced(
        &self,
        truth: ProblemId,
        operators: AffineOperatorStore,
        basis: DMatrix<Real>,
    ) -> RbResult<ProblemId> {
        let entry = self.entry(truth)?;
        if entry.role != ProblemRole::Truth {
            return Err(RbError::invalid_arg(format!(
                "only truth problems can be trained, {} is not one",
                entry.name
            )));
        }
        let dim = entry.definition.layout.dim();
        if basis.nrows() != dim {
            return Err(RbError::dimension(
                format!("basis rows for problem {}", entry.name),
                basis.nrows(),
                dim,
            ));
        }
        if basis.ncols() == 0 {
            return Err(RbError::invalid_arg(format!(
                "empty basis for problem {}",
                entry.name
            )));
        }
        entry
            .definition
            .validate_operators(&operators, basis.ncols())?;

        let n = basis.ncols();
        let reduced = self.register(
            format!("{}_reduced", entry.name),
            ProblemRole::Reduced { truth },
            Rc::clone(&entry.definition),
            Rc::new(operators),
            Some(basis),
        );
        entry.runtime.borrow_mut().reduced = Some(reduced);
        info!(problem = %entry.name, basis_size = n, "training finished");
        Ok(reduced)
    }

    /// Evaluate an expression declared on `problem`, driven by that problem's
    /// `mu` and time.
    pub fn evaluate(&self, problem: ProblemId, expression: &str) -> RbResult<DVector<Real>> {
        let entry = self.entry(problem)?;
        let expression = entry.definition.expression(expression)?;
        let (mu, time) = {
            let runtime = entry.runtime.borrow();
            let mu = runtime.mu.clone().ok_or_else(|| RbError::MissingParameter {
                problem: entry.name.clone(),
            })?;
            (mu, runtime.time)
        };
        let driver = Driver {
            mu,
            time,
            problem: Some(problem),
        };
        resolver::resolve(self, expression, &driver)
    }

    /// Evaluate a free-standing expression at `mu`, outside any problem.
    pub fn evaluate_expression(
        &self,
        expression: &ParametrizedExpression,
        mu: impl Into<Mu>,
    ) -> RbResult<DVector<Real>> {
        let driver = Driver {
            mu: mu.into(),
            time: 0.0,
            problem: None,
        };
        resolver::resolve(self, expression, &driver)
    }

    /// Static graph of which truth problems read which.
    pub fn dependency_graph(&self) -> DependencyGraph {
        DependencyGraph::from_engine(self)
    }
}
