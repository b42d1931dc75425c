use crate::RbError;

/// Scalar type of every operator, coefficient and solution entry.
pub type Real = f64;

pub fn ensure_finite(v: Real, what: &'static str) -> Result<Real, RbError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(RbError::NonFinite { what, value: v })
    }
}

/// Check every entry of a slice, reporting the first non-finite one.
pub fn ensure_all_finite(values: &[Real], what: &'static str) -> Result<(), RbError> {
    values
        .iter()
        .try_for_each(|&v| ensure_finite(v, what).map(|_| ()))
}
