//! Parameter-independent algebraic operators.

use nalgebra::{DMatrix, DVector};
use rb_core::{RbError, RbResult, Real};

/// Arity of an operator role: bilinear forms are matrices, linear forms are
/// vectors, outputs are scalars.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TermOrder {
    Scalar,
    Vector,
    Matrix,
}

impl TermOrder {
    pub fn from_arity(arity: usize) -> RbResult<Self> {
        match arity {
            0 => Ok(TermOrder::Scalar),
            1 => Ok(TermOrder::Vector),
            2 => Ok(TermOrder::Matrix),
            other => Err(RbError::invalid_arg(format!(
                "term order must be 0, 1 or 2 (got {other})"
            ))),
        }
    }

    pub fn arity(self) -> usize {
        match self {
            TermOrder::Scalar => 0,
            TermOrder::Vector => 1,
            TermOrder::Matrix => 2,
        }
    }
}

/// One entry of an affine expansion.
#[derive(Clone, Debug, PartialEq)]
pub enum AlgebraicOperator {
    Scalar(Real),
    Vector(DVector<Real>),
    Matrix(DMatrix<Real>),
}

impl AlgebraicOperator {
    pub fn order(&self) -> TermOrder {
        match self {
            AlgebraicOperator::Scalar(_) => TermOrder::Scalar,
            AlgebraicOperator::Vector(_) => TermOrder::Vector,
            AlgebraicOperator::Matrix(_) => TermOrder::Matrix,
        }
    }

    /// Largest N for which `[:N]` / `[:N, :N]` is defined. Scalars have no extent.
    pub fn extent(&self) -> Option<usize> {
        match self {
            AlgebraicOperator::Scalar(_) => None,
            AlgebraicOperator::Vector(v) => Some(v.len()),
            AlgebraicOperator::Matrix(m) => Some(m.nrows().min(m.ncols())),
        }
    }

    /// Restrict to the leading `n` rows (and columns).
    pub fn slice(&self, n: usize) -> RbResult<Self> {
        match self {
            AlgebraicOperator::Scalar(s) => Ok(AlgebraicOperator::Scalar(*s)),
            AlgebraicOperator::Vector(v) => {
                if n > v.len() {
                    return Err(RbError::dimension("vector operator slice", n, v.len()));
                }
                Ok(AlgebraicOperator::Vector(v.rows(0, n).into_owned()))
            }
            AlgebraicOperator::Matrix(m) => {
                let available = m.nrows().min(m.ncols());
                if n > available {
                    return Err(RbError::dimension("matrix operator slice", n, available));
                }
                Ok(AlgebraicOperator::Matrix(m.view((0, 0), (n, n)).into_owned()))
            }
        }
    }

    /// `self += weight * other`; both sides must have the same shape.
    pub(crate) fn axpy(&mut self, weight: Real, other: &AlgebraicOperator) -> RbResult<()> {
        match (self, other) {
            (AlgebraicOperator::Scalar(acc), AlgebraicOperator::Scalar(s)) => {
                *acc += weight * s;
                Ok(())
            }
            (AlgebraicOperator::Vector(acc), AlgebraicOperator::Vector(v)) => {
                if acc.len() != v.len() {
                    return Err(RbError::dimension("vector accumulation", v.len(), acc.len()));
                }
                acc.axpy(weight, v, 1.0);
                Ok(())
            }
            (AlgebraicOperator::Matrix(acc), AlgebraicOperator::Matrix(m)) => {
                if acc.shape() != m.shape() {
                    return Err(RbError::dimension(
                        "matrix accumulation",
                        m.nrows(),
                        acc.nrows(),
                    ));
                }
                acc.zip_apply(m, |a, b| *a += weight * b);
                Ok(())
            }
            _ => Err(RbError::invalid_arg("mixed operator orders in one expansion")),
        }
    }

    pub(crate) fn scaled(&self, weight: Real) -> Self {
        match self {
            AlgebraicOperator::Scalar(s) => AlgebraicOperator::Scalar(weight * s),
            AlgebraicOperator::Vector(v) => AlgebraicOperator::Vector(v * weight),
            AlgebraicOperator::Matrix(m) => AlgebraicOperator::Matrix(m * weight),
        }
    }

    pub(crate) fn zeros(order: TermOrder, n: usize) -> Self {
        match order {
            TermOrder::Scalar => AlgebraicOperator::Scalar(0.0),
            TermOrder::Vector => AlgebraicOperator::Vector(DVector::zeros(n)),
            TermOrder::Matrix => AlgebraicOperator::Matrix(DMatrix::zeros(n, n)),
        }
    }

    pub fn into_matrix(self) -> RbResult<DMatrix<Real>> {
        match self {
            AlgebraicOperator::Matrix(m) => Ok(m),
            other => Err(RbError::invalid_arg(format!(
                "expected a matrix operator, found order {}",
                other.order().arity()
            ))),
        }
    }

    pub fn into_vector(self) -> RbResult<DVector<Real>> {
        match self {
            AlgebraicOperator::Vector(v) => Ok(v),
            other => Err(RbError::invalid_arg(format!(
                "expected a vector operator, found order {}",
                other.order().arity()
            ))),
        }
    }

    pub fn into_scalar(self) -> RbResult<Real> {
        match self {
            AlgebraicOperator::Scalar(s) => Ok(s),
            other => Err(RbError::invalid_arg(format!(
                "expected a scalar operator, found order {}",
                other.order().arity()
            ))),
        }
    }
}

impl From<DMatrix<Real>> for AlgebraicOperator {
    fn from(m: DMatrix<Real>) -> Self {
        AlgebraicOperator::Matrix(m)
    }
}

impl From<DVector<Real>> for AlgebraicOperator {
    fn from(v: DVector<Real>) -> Self {
        AlgebraicOperator::Vector(v)
    }
}

impl From<Real> for AlgebraicOperator {
    fn from(s: Real) -> Self {
        AlgebraicOperator::Scalar(s)
    }
}
