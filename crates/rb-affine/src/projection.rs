//! Offline Galerkin projection of a truth operator store onto a basis.

use crate::expansion::AffineExpansion;
use crate::operator::AlgebraicOperator;
use crate::store::AffineOperatorStore;
use nalgebra::DMatrix;
use rb_core::{RbError, RbResult, Real};

/// Project every term: matrices become `Z^T A Z`, vectors `Z^T f`, scalars
/// are kept. Index order inside each expansion is preserved, so the reduced
/// store pairs with the same theta functions as the truth store.
pub fn galerkin_project(
    store: &AffineOperatorStore,
    basis: &DMatrix<Real>,
) -> RbResult<AffineOperatorStore> {
    let n = basis.nrows();
    let zt = basis.transpose();
    let mut reduced = AffineOperatorStore::new();

    for expansion in store.iter() {
        let mut operators = Vec::with_capacity(expansion.len());
        for op in expansion.iter() {
            let projected = match op {
                AlgebraicOperator::Scalar(s) => AlgebraicOperator::Scalar(*s),
                AlgebraicOperator::Vector(v) => {
                    if v.len() != n {
                        return Err(RbError::dimension(
                            format!("projection of term {}", expansion.term()),
                            v.len(),
                            n,
                        ));
                    }
                    AlgebraicOperator::Vector(&zt * v)
                }
                AlgebraicOperator::Matrix(m) => {
                    if m.nrows() != n || m.ncols() != n {
                        return Err(RbError::dimension(
                            format!("projection of term {}", expansion.term()),
                            m.nrows().max(m.ncols()),
                            n,
                        ));
                    }
                    AlgebraicOperator::Matrix(&zt * m * basis)
                }
            };
            operators.push(projected);
        }
        reduced.insert(AffineExpansion::with_order(
            expansion.term(),
            expansion.order(),
            operators,
        )?);
    }

    Ok(reduced)
}
