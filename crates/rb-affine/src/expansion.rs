//! Ordered affine expansion of a single operator role.

use crate::operator::{AlgebraicOperator, TermOrder};
use rb_core::{RbError, RbResult};

/// The parameter-independent operators `A_0, A_1, ...` of one term.
///
/// All entries share one [`TermOrder`]; the position of an operator is the
/// index of the theta coefficient it is paired with.
#[derive(Clone, Debug, PartialEq)]
pub struct AffineExpansion {
    term: String,
    order: TermOrder,
    operators: Vec<AlgebraicOperator>,
}

impl AffineExpansion {
    /// Build an expansion, inferring its order from the first operator.
    pub fn new(term: impl Into<String>, operators: Vec<AlgebraicOperator>) -> RbResult<Self> {
        let term = term.into();
        let order = operators
            .first()
            .map(AlgebraicOperator::order)
            .ok_or_else(|| {
                RbError::invalid_arg(format!(
                    "affine expansion for term {term} needs at least one operator"
                ))
            })?;
        Self::with_order(term, order, operators)
    }

    pub fn with_order(
        term: impl Into<String>,
        order: TermOrder,
        operators: Vec<AlgebraicOperator>,
    ) -> RbResult<Self> {
        let term = term.into();
        if let Some(bad) = operators.iter().position(|op| op.order() != order) {
            return Err(RbError::invalid_arg(format!(
                "operator {bad} of term {term} has order {} (expected {})",
                operators[bad].order().arity(),
                order.arity()
            )));
        }
        Ok(Self {
            term,
            order,
            operators,
        })
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn order(&self) -> TermOrder {
        self.order
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&AlgebraicOperator> {
        self.operators.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AlgebraicOperator> {
        self.operators.iter()
    }

    /// Smallest extent over all operators (None for scalar terms).
    pub fn extent(&self) -> Option<usize> {
        self.operators.iter().filter_map(AlgebraicOperator::extent).min()
    }

    /// `[:n]` / `[:n, :n]` of every operator, in the same order.
    pub fn slice(&self, n: usize) -> RbResult<Self> {
        let operators = self
            .operators
            .iter()
            .map(|op| op.slice(n))
            .collect::<RbResult<Vec<_>>>()
            .map_err(|e| match e {
                RbError::DimensionMismatch {
                    requested,
                    available,
                    ..
                } => RbError::dimension(format!("term {}", self.term), requested, available),
                other => other,
            })?;
        Ok(Self {
            term: self.term.clone(),
            order: self.order,
            operators,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{DMatrix, DVector};

    #[test]
    fn mixed_orders_are_rejected() {
        let err = AffineExpansion::new(
            "a",
            vec![
                DMatrix::<f64>::identity(2, 2).into(),
                DVector::<f64>::zeros(2).into(),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, RbError::InvalidArg { .. }));
    }

    #[test]
    fn slice_preserves_index_correspondence() {
        let a0 = DMatrix::from_fn(3, 3, |i, j| (i * 3 + j) as f64);
        let a1 = DMatrix::from_fn(3, 3, |i, j| 100.0 + (i * 3 + j) as f64);
        let exp = AffineExpansion::new("a", vec![a0.into(), a1.into()]).unwrap();
        let sliced = exp.slice(2).unwrap();
        assert_eq!(sliced.len(), 2);
        let s1 = sliced.get(1).unwrap().clone().into_matrix().unwrap();
        assert_eq!(s1[(1, 1)], 104.0);
        assert_eq!(sliced.term(), "a");
    }

    #[test]
    fn slice_error_names_term() {
        let exp = AffineExpansion::new("f", vec![DVector::<f64>::zeros(2).into()]).unwrap();
        let msg = exp.slice(5).unwrap_err().to_string();
        assert!(msg.contains("term f"));
    }
}
