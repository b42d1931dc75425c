//! Per-problem operator storage and the declared operator roles.

use crate::expansion::AffineExpansion;
use crate::operator::TermOrder;
use rb_core::{RbError, RbResult};
use std::collections::BTreeMap;

/// The `terms` / `terms_order` declaration of a problem.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TermDeclarations {
    order: BTreeMap<String, TermOrder>,
}

impl TermDeclarations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(&mut self, term: impl Into<String>, order: TermOrder) {
        self.order.insert(term.into(), order);
    }

    pub fn with(mut self, term: impl Into<String>, order: TermOrder) -> Self {
        self.declare(term, order);
        self
    }

    pub fn contains(&self, term: &str) -> bool {
        self.order.contains_key(term)
    }

    /// Order of a declared term; undeclared terms are an `InvalidTerm` error.
    pub fn order(&self, term: &str) -> RbResult<TermOrder> {
        self.order
            .get(term)
            .copied()
            .ok_or_else(|| RbError::InvalidTerm {
                term: term.to_string(),
            })
    }

    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.order.keys().map(String::as_str)
    }
}

/// `operator[term]` lookup for one problem.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AffineOperatorStore {
    expansions: BTreeMap<String, AffineExpansion>,
}

impl AffineOperatorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or replace) the expansion for its term.
    pub fn insert(&mut self, expansion: AffineExpansion) {
        self.expansions
            .insert(expansion.term().to_string(), expansion);
    }

    pub fn with(mut self, expansion: AffineExpansion) -> Self {
        self.insert(expansion);
        self
    }

    pub fn contains(&self, term: &str) -> bool {
        self.expansions.contains_key(term)
    }

    pub fn expansion(&self, term: &str) -> RbResult<&AffineExpansion> {
        self.expansions
            .get(term)
            .ok_or_else(|| RbError::InvalidTerm {
                term: term.to_string(),
            })
    }

    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.expansions.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AffineExpansion> {
        self.expansions.values()
    }

    /// Slice every stored expansion to size `n`.
    pub fn slice(&self, n: usize) -> RbResult<Self> {
        let expansions = self
            .expansions
            .iter()
            .map(|(term, exp)| Ok((term.clone(), exp.slice(n)?)))
            .collect::<RbResult<BTreeMap<_, _>>>()?;
        Ok(Self { expansions })
    }

    /// Check that every stored term is declared with a matching order.
    pub fn validate(&self, declarations: &TermDeclarations) -> RbResult<()> {
        for exp in self.expansions.values() {
            let declared = declarations.order(exp.term())?;
            if declared != exp.order() {
                return Err(RbError::invalid_arg(format!(
                    "term {} stored with order {} but declared with order {}",
                    exp.term(),
                    exp.order().arity(),
                    declared.arity()
                )));
            }
        }
        Ok(())
    }

    /// Smallest extent over all non-scalar terms.
    pub fn extent(&self) -> Option<usize> {
        self.expansions
            .values()
            .filter_map(AffineExpansion::extent)
            .min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{DMatrix, DVector};

    #[test]
    fn unknown_term_is_invalid_term() {
        let store = AffineOperatorStore::new();
        assert!(matches!(
            store.expansion("a"),
            Err(RbError::InvalidTerm { .. })
        ));
    }

    #[test]
    fn validate_checks_declared_order() {
        let store = AffineOperatorStore::new()
            .with(AffineExpansion::new("f", vec![DVector::<f64>::zeros(3).into()]).unwrap());
        let ok = TermDeclarations::new().with("f", TermOrder::Vector);
        let wrong = TermDeclarations::new().with("f", TermOrder::Matrix);
        assert!(store.validate(&ok).is_ok());
        assert!(store.validate(&wrong).is_err());
        assert!(matches!(
            store.validate(&TermDeclarations::new()),
            Err(RbError::InvalidTerm { .. })
        ));
    }

    #[test]
    fn extent_is_minimum_over_terms() {
        let store = AffineOperatorStore::new()
            .with(AffineExpansion::new("a", vec![DMatrix::<f64>::zeros(4, 4).into()]).unwrap())
            .with(AffineExpansion::new("f", vec![DVector::<f64>::zeros(3).into()]).unwrap())
            .with(AffineExpansion::new("s", vec![1.0.into()]).unwrap());
        assert_eq!(store.extent(), Some(3));
    }
}
