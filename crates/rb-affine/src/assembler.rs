//! Online assembly: `sum_k theta_k(mu) * operator_k[:N]`.

use crate::expansion::AffineExpansion;
use crate::operator::AlgebraicOperator;
use crate::store::{AffineOperatorStore, TermDeclarations};
use crate::theta::{ThetaContext, ThetaFunction};
use nalgebra::{DMatrix, DVector};
use rb_core::{RbError, RbResult, Real, ensure_all_finite};

/// Collapse an expansion with precomputed coefficients.
///
/// Accumulation runs left to right in expansion order. With `n = Some(N)` every
/// operator is restricted to its leading `N` block first.
pub fn assemble(
    expansion: &AffineExpansion,
    theta: &[Real],
    n: Option<usize>,
) -> RbResult<AlgebraicOperator> {
    if theta.len() != expansion.len() {
        return Err(RbError::ThetaLength {
            term: expansion.term().to_string(),
            expected: expansion.len(),
            actual: theta.len(),
        });
    }

    let restrict = |op: &AlgebraicOperator| -> RbResult<AlgebraicOperator> {
        match n {
            Some(n) => op.slice(n).map_err(|e| match e {
                RbError::DimensionMismatch {
                    requested,
                    available,
                    ..
                } => RbError::dimension(
                    format!("term {}", expansion.term()),
                    requested,
                    available,
                ),
                other => other,
            }),
            None => Ok(op.clone()),
        }
    };

    let mut operators = expansion.iter();
    let Some(first) = operators.next() else {
        return match n {
            Some(n) => Ok(AlgebraicOperator::zeros(expansion.order(), n)),
            None => Err(RbError::invalid_arg(format!(
                "cannot size the empty expansion of term {}",
                expansion.term()
            ))),
        };
    };

    let mut acc = restrict(first)?.scaled(theta[0]);
    for (op, &weight) in operators.zip(&theta[1..]) {
        acc.axpy(weight, &restrict(op)?)?;
    }
    Ok(acc)
}

/// Binds a problem's declarations, operators and theta function together.
pub struct OperatorAssembler<'a> {
    declarations: &'a TermDeclarations,
    store: &'a AffineOperatorStore,
    theta: &'a dyn ThetaFunction,
}

impl<'a> OperatorAssembler<'a> {
    pub fn new(
        declarations: &'a TermDeclarations,
        store: &'a AffineOperatorStore,
        theta: &'a dyn ThetaFunction,
    ) -> Self {
        Self {
            declarations,
            store,
            theta,
        }
    }

    /// Evaluate theta for a declared term and check it against the expansion length.
    pub fn compute_theta(&self, term: &str, ctx: &dyn ThetaContext) -> RbResult<Vec<Real>> {
        self.declarations.order(term)?;
        let theta = self.theta.compute_theta(term, ctx)?;
        ensure_all_finite(&theta, "theta coefficient")?;
        if let Ok(expansion) = self.store.expansion(term) {
            if expansion.len() != theta.len() {
                return Err(RbError::ThetaLength {
                    term: term.to_string(),
                    expected: expansion.len(),
                    actual: theta.len(),
                });
            }
        }
        Ok(theta)
    }

    pub fn assemble(
        &self,
        term: &str,
        n: Option<usize>,
        ctx: &dyn ThetaContext,
    ) -> RbResult<AlgebraicOperator> {
        let theta = self.compute_theta(term, ctx)?;
        let expansion = self.store.expansion(term)?;
        assemble(expansion, &theta, n)
    }

    pub fn assemble_matrix(
        &self,
        term: &str,
        n: Option<usize>,
        ctx: &dyn ThetaContext,
    ) -> RbResult<DMatrix<Real>> {
        self.assemble(term, n, ctx)?.into_matrix()
    }

    pub fn assemble_vector(
        &self,
        term: &str,
        n: Option<usize>,
        ctx: &dyn ThetaContext,
    ) -> RbResult<DVector<Real>> {
        self.assemble(term, n, ctx)?.into_vector()
    }

    pub fn assemble_scalar(&self, term: &str, ctx: &dyn ThetaContext) -> RbResult<Real> {
        self.assemble(term, None, ctx)?.into_scalar()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theta::StaticContext;

    fn store() -> (TermDeclarations, AffineOperatorStore) {
        let decl = TermDeclarations::new()
            .with("a", crate::TermOrder::Matrix)
            .with("f", crate::TermOrder::Vector)
            .with("s", crate::TermOrder::Scalar);
        let store = AffineOperatorStore::new()
            .with(
                AffineExpansion::new(
                    "a",
                    vec![
                        DMatrix::<f64>::identity(3, 3).into(),
                        DMatrix::<f64>::from_element(3, 3, 1.0).into(),
                    ],
                )
                .unwrap(),
            )
            .with(AffineExpansion::new("f", vec![DVector::from_vec(vec![1.0, 2.0, 3.0]).into()]).unwrap())
            .with(AffineExpansion::new("s", vec![2.0.into(), 3.0.into()]).unwrap());
        (decl, store)
    }

    fn theta(term: &str, ctx: &dyn ThetaContext) -> RbResult<Vec<Real>> {
        let mu = ctx.mu();
        match term {
            "a" => Ok(vec![1.0, mu[0]]),
            "f" => Ok(vec![mu[0]]),
            "s" => Ok(vec![1.0, 1.0]),
            "bad" => Ok(vec![1.0, 2.0, 3.0]),
            _ => Err(RbError::InvalidTerm {
                term: term.to_string(),
            }),
        }
    }

    #[test]
    fn weighted_sum_of_matrices() {
        let (decl, store) = store();
        let asm = OperatorAssembler::new(&decl, &store, &theta);
        let ctx = StaticContext::new([2.0]);
        let a = asm.assemble_matrix("a", Some(2), &ctx).unwrap();
        assert_eq!(a, DMatrix::from_row_slice(2, 2, &[3.0, 2.0, 2.0, 3.0]));
        let f = asm.assemble_vector("f", None, &ctx).unwrap();
        assert_eq!(f, DVector::from_vec(vec![2.0, 4.0, 6.0]));
        assert_eq!(asm.assemble_scalar("s", &ctx).unwrap(), 5.0);
    }

    #[test]
    fn undeclared_term_is_invalid_term() {
        let (decl, store) = store();
        let asm = OperatorAssembler::new(&decl, &store, &theta);
        let err = asm
            .assemble("m", None, &StaticContext::new([1.0]))
            .unwrap_err();
        assert_eq!(
            err,
            RbError::InvalidTerm {
                term: "m".to_string()
            }
        );
    }

    #[test]
    fn oversized_n_is_dimension_mismatch() {
        let (decl, store) = store();
        let asm = OperatorAssembler::new(&decl, &store, &theta);
        let err = asm
            .assemble_matrix("a", Some(4), &StaticContext::new([1.0]))
            .unwrap_err();
        assert!(matches!(err, RbError::DimensionMismatch { requested: 4, available: 3, .. }));
    }

    #[test]
    fn empty_expansion_assembles_to_zero_when_sized() {
        let exp = AffineExpansion::with_order("f", crate::TermOrder::Vector, vec![]).unwrap();
        let v = assemble(&exp, &[], Some(2)).unwrap().into_vector().unwrap();
        assert_eq!(v, DVector::zeros(2));
        assert!(assemble(&exp, &[], None).is_err());
    }
}
