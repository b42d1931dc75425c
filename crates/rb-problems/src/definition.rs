//! Problem definitions: declared terms, layout, theta and formulation.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use rb_affine::{AffineOperatorStore, TermDeclarations, TermOrder, ThetaFunction};
use rb_core::{Mu, MuRange, RbError, RbResult, Real};
use rb_expr::{ComponentLayout, ParametrizedExpression};

/// Conventional term names.
pub mod terms {
    pub const LHS: &str = "a";
    pub const RHS: &str = "f";
    pub const MASS: &str = "m";
    pub const INITIAL_CONDITION: &str = "initial_condition";
    pub const INNER_PRODUCT: &str = "inner_product";
    pub const DIRICHLET_BC: &str = "dirichlet_bc";
}

/// Declared capabilities of a problem.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub time_dependent: bool,
    pub nonlinear: bool,
}

/// Which terms make up the algebraic system and how it is solved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Formulation {
    /// `A(mu) x = f(mu)`; with `nonlinear`, `A` and `f` may read `x` itself.
    Stationary {
        lhs: String,
        rhs: String,
        nonlinear: bool,
    },
    /// `M y_dot + A y = f`, integrated in time.
    Parabolic {
        mass: String,
        stiffness: String,
        source: String,
        nonlinear: bool,
    },
}

impl Formulation {
    pub fn from_capabilities(capabilities: Capabilities) -> Self {
        if capabilities.time_dependent {
            Formulation::Parabolic {
                mass: terms::MASS.to_string(),
                stiffness: terms::LHS.to_string(),
                source: terms::RHS.to_string(),
                nonlinear: capabilities.nonlinear,
            }
        } else {
            Formulation::Stationary {
                lhs: terms::LHS.to_string(),
                rhs: terms::RHS.to_string(),
                nonlinear: capabilities.nonlinear,
            }
        }
    }

    pub fn is_nonlinear(&self) -> bool {
        match self {
            Formulation::Stationary { nonlinear, .. } | Formulation::Parabolic { nonlinear, .. } => {
                *nonlinear
            }
        }
    }

    pub fn is_time_dependent(&self) -> bool {
        matches!(self, Formulation::Parabolic { .. })
    }

    /// Terms the solver assembles, with the order each must be declared with.
    pub fn required_terms(&self) -> Vec<(&str, TermOrder)> {
        match self {
            Formulation::Stationary { lhs, rhs, .. } => {
                vec![(lhs.as_str(), TermOrder::Matrix), (rhs.as_str(), TermOrder::Vector)]
            }
            Formulation::Parabolic {
                mass,
                stiffness,
                source,
                ..
            } => vec![
                (mass.as_str(), TermOrder::Matrix),
                (stiffness.as_str(), TermOrder::Matrix),
                (source.as_str(), TermOrder::Vector),
            ],
        }
    }
}

/// Everything about a problem that is shared by its truth, exact and reduced
/// incarnations.
pub struct ProblemDefinition {
    pub name: String,
    pub terms: TermDeclarations,
    pub layout: ComponentLayout,
    pub theta: Rc<dyn ThetaFunction>,
    pub formulation: Formulation,
    pub expressions: BTreeMap<String, ParametrizedExpression>,
    /// Admissible parameter domain; any `mu` is accepted when absent
    pub mu_range: Option<MuRange>,
}

impl fmt::Debug for ProblemDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProblemDefinition")
            .field("name", &self.name)
            .field("terms", &self.terms)
            .field("layout", &self.layout)
            .field("formulation", &self.formulation)
            .field("expressions", &self.expressions.keys().collect::<Vec<_>>())
            .field("mu_range", &self.mu_range)
            .finish_non_exhaustive()
    }
}

impl ProblemDefinition {
    pub fn expression(&self, name: &str) -> RbResult<&ParametrizedExpression> {
        self.expressions
            .get(name)
            .ok_or_else(|| RbError::UnknownExpression {
                name: name.to_string(),
            })
    }

    pub fn check_mu(&self, mu: &Mu) -> RbResult<()> {
        match &self.mu_range {
            Some(range) => range.check(mu).map_err(|err| match err {
                RbError::InvalidArg { what } => {
                    RbError::invalid_arg(format!("problem {}: {what}", self.name))
                }
                other => other,
            }),
            None => Ok(()),
        }
    }

    /// Check an operator store against the declared terms and the layout.
    pub fn validate_operators(&self, operators: &AffineOperatorStore, dim: usize) -> RbResult<()> {
        operators.validate(&self.terms)?;
        for (term, _) in self.formulation.required_terms() {
            operators.expansion(term)?;
        }
        if let Some(extent) = operators.extent() {
            if extent < dim {
                return Err(RbError::dimension(
                    format!("operators of problem {}", self.name),
                    dim,
                    extent,
                ));
            }
        }
        if self.terms.contains(terms::INITIAL_CONDITION) {
            let inner_product = operators.expansion(terms::INNER_PRODUCT)?;
            if inner_product.len() != 1 {
                return Err(RbError::invalid_arg(format!(
                    "problem {}: inner product expansion must hold exactly one operator, found {}",
                    self.name,
                    inner_product.len()
                )));
            }
        }
        Ok(())
    }
}

/// Declares a problem's capabilities and terms, then resolves them once into
/// a [`ProblemDefinition`].
pub struct ProblemBuilder {
    name: String,
    terms: TermDeclarations,
    layout: Option<ComponentLayout>,
    theta: Option<Rc<dyn ThetaFunction>>,
    capabilities: Capabilities,
    expressions: Vec<ParametrizedExpression>,
    mu_range: Option<Vec<(Real, Real)>>,
}

impl ProblemBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            terms: TermDeclarations::new(),
            layout: None,
            theta: None,
            capabilities: Capabilities::default(),
            expressions: Vec::new(),
            mu_range: None,
        }
    }

    pub fn term(mut self, term: impl Into<String>, order: TermOrder) -> Self {
        self.terms.declare(term, order);
        self
    }

    pub fn layout(mut self, layout: ComponentLayout) -> Self {
        self.layout = Some(layout);
        self
    }

    /// Shorthand for a single unnamed field.
    pub fn dimension(self, dim: usize) -> Self {
        self.layout(ComponentLayout::single(dim))
    }

    pub fn theta(mut self, theta: impl ThetaFunction + 'static) -> Self {
        self.theta = Some(Rc::new(theta));
        self
    }

    pub fn time_dependent(mut self) -> Self {
        self.capabilities.time_dependent = true;
        self
    }

    pub fn nonlinear(mut self) -> Self {
        self.capabilities.nonlinear = true;
        self
    }

    pub fn expression(mut self, expression: ParametrizedExpression) -> Self {
        self.expressions.push(expression);
        self
    }

    /// One `(min, max)` per parameter component.
    pub fn mu_range(mut self, bounds: Vec<(Real, Real)>) -> Self {
        self.mu_range = Some(bounds);
        self
    }

    pub fn build(self) -> RbResult<ProblemDefinition> {
        let layout = self.layout.ok_or_else(|| {
            RbError::invalid_arg(format!("problem {} has no layout", self.name))
        })?;
        let theta = self.theta.ok_or_else(|| {
            RbError::invalid_arg(format!("problem {} has no theta function", self.name))
        })?;
        let mu_range = self
            .mu_range
            .map(MuRange::new)
            .transpose()
            .map_err(|err| RbError::invalid_arg(format!("problem {}: {err}", self.name)))?;
        let formulation = Formulation::from_capabilities(self.capabilities);
        for (term, order) in formulation.required_terms() {
            let declared = self.terms.order(term)?;
            if declared != order {
                return Err(RbError::invalid_arg(format!(
                    "term {} of problem {} must have order {}",
                    term,
                    self.name,
                    order.arity()
                )));
            }
        }
        if self.terms.contains(terms::INITIAL_CONDITION) && !self.terms.contains(terms::INNER_PRODUCT)
        {
            return Err(RbError::InvalidTerm {
                term: terms::INNER_PRODUCT.to_string(),
            });
        }

        let mut expressions = BTreeMap::new();
        for expression in self.expressions {
            let name = expression.name.clone();
            if expressions.insert(name.clone(), expression).is_some() {
                return Err(RbError::invalid_arg(format!(
                    "expression {name} declared twice on problem {}",
                    self.name
                )));
            }
        }

        Ok(ProblemDefinition {
            name: self.name,
            terms: self.terms,
            layout,
            theta,
            formulation,
            expressions,
            mu_range,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rb_affine::ThetaContext;
    use rb_core::Real;

    fn unit_theta(_term: &str, _ctx: &dyn ThetaContext) -> RbResult<Vec<Real>> {
        Ok(vec![1.0])
    }

    #[test]
    fn capabilities_select_formulation() {
        let def = ProblemBuilder::new("heat")
            .term("m", TermOrder::Matrix)
            .term("a", TermOrder::Matrix)
            .term("f", TermOrder::Vector)
            .dimension(3)
            .theta(unit_theta)
            .time_dependent()
            .build()
            .unwrap();
        assert!(def.formulation.is_time_dependent());
        assert!(!def.formulation.is_nonlinear());
    }

    #[test]
    fn missing_required_term_is_invalid_term() {
        let err = ProblemBuilder::new("p")
            .term("a", TermOrder::Matrix)
            .dimension(2)
            .theta(unit_theta)
            .build()
            .unwrap_err();
        assert_eq!(err, RbError::InvalidTerm { term: "f".into() });
    }

    #[test]
    fn wrong_order_is_rejected() {
        let err = ProblemBuilder::new("p")
            .term("a", TermOrder::Vector)
            .term("f", TermOrder::Vector)
            .dimension(2)
            .theta(unit_theta)
            .build()
            .unwrap_err();
        assert!(matches!(err, RbError::InvalidArg { .. }));
    }

    #[test]
    fn initial_condition_needs_inner_product() {
        let err = ProblemBuilder::new("p")
            .term("m", TermOrder::Matrix)
            .term("a", TermOrder::Matrix)
            .term("f", TermOrder::Vector)
            .term("initial_condition", TermOrder::Vector)
            .dimension(2)
            .theta(unit_theta)
            .time_dependent()
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            RbError::InvalidTerm {
                term: "inner_product".into()
            }
        );
    }
}
