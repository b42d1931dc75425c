//! The online parameter vector `mu`.

use crate::error::{RbError, RbResult};
use crate::numeric::Real;
use core::fmt;
use core::ops::Index;

/// Ordered parameter values for one online query.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Mu(Vec<Real>);

impl Mu {
    pub fn new(values: impl Into<Vec<Real>>) -> Self {
        Self(values.into())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[Real] {
        &self.0
    }

    pub fn get(&self, index: usize) -> Option<Real> {
        self.0.get(index).copied()
    }
}

impl From<Vec<Real>> for Mu {
    fn from(values: Vec<Real>) -> Self {
        Self(values)
    }
}

impl<const N: usize> From<[Real; N]> for Mu {
    fn from(values: [Real; N]) -> Self {
        Self(values.to_vec())
    }
}

impl Index<usize> for Mu {
    type Output = Real;

    fn index(&self, index: usize) -> &Real {
        &self.0[index]
    }
}

impl fmt::Display for Mu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{v}")?;
        }
        write!(f, ")")
    }
}

/// Closed interval `[min, max]` per parameter component.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MuRange(Vec<(Real, Real)>);

impl MuRange {
    pub fn new(bounds: impl Into<Vec<(Real, Real)>>) -> RbResult<Self> {
        let bounds = bounds.into();
        for (i, &(min, max)) in bounds.iter().enumerate() {
            if !(min.is_finite() && max.is_finite() && min <= max) {
                return Err(RbError::invalid_arg(format!(
                    "mu range component {i} is [{min}, {max}]"
                )));
            }
        }
        Ok(Self(bounds))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn bounds(&self) -> &[(Real, Real)] {
        &self.0
    }

    /// `mu` has one value per component and each lies in its interval.
    pub fn check(&self, mu: &Mu) -> RbResult<()> {
        if mu.len() != self.len() {
            return Err(RbError::invalid_arg(format!(
                "mu {mu} has {} components, the range has {}",
                mu.len(),
                self.len()
            )));
        }
        let outside = self
            .0
            .iter()
            .zip(mu.as_slice())
            .position(|(&(min, max), &v)| !(min..=max).contains(&v));
        match outside {
            Some(i) => {
                let (min, max) = self.0[i];
                Err(RbError::invalid_arg(format!(
                    "mu {mu}: component {i} is outside [{min}, {max}]"
                )))
            }
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_lists_values() {
        let mu = Mu::from([1.0, 2.5]);
        assert_eq!(mu.to_string(), "(1, 2.5)");
        assert_eq!(mu[1], 2.5);
        assert_eq!(mu.get(2), None);
    }

    #[test]
    fn range_rejects_inverted_bounds() {
        assert!(MuRange::new(vec![(0.0, 1.0), (2.0, 2.0)]).is_ok());
        assert!(MuRange::new(vec![(1.0, 0.0)]).is_err());
        assert!(MuRange::new(vec![(Real::NAN, 1.0)]).is_err());
    }

    #[test]
    fn range_checks_length_and_bounds() {
        let range = MuRange::new(vec![(0.5, 1.5), (-1.0, 1.0)]).unwrap();
        assert!(range.check(&Mu::from([0.5, 1.0])).is_ok());
        assert!(range.check(&Mu::from([1.0])).is_err());
        assert!(range.check(&Mu::from([1.0, 0.0, 0.0])).is_err());
        assert!(range.check(&Mu::from([2.0, 0.0])).is_err());
        assert!(range.check(&Mu::from([1.0, Real::NAN])).is_err());
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn points_inside_pass_and_shifted_points_fail(
                bounds in prop::collection::vec((-1e3..1e3f64, 0.0..1e3f64), 1..6),
                t in 0.0..=1.0f64,
                k in any::<prop::sample::Index>(),
            ) {
                let bounds: Vec<(Real, Real)> =
                    bounds.into_iter().map(|(min, width)| (min, min + width)).collect();
                let range = MuRange::new(bounds.clone()).unwrap();

                let inside: Vec<Real> = bounds
                    .iter()
                    .map(|&(min, max)| (min + t * (max - min)).clamp(min, max))
                    .collect();
                prop_assert!(range.check(&Mu::from(inside.clone())).is_ok());

                let i = k.index(bounds.len());
                let mut outside = inside;
                outside[i] = bounds[i].1 + 1.0;
                prop_assert!(range.check(&Mu::from(outside)).is_err());
            }
        }
    }
}
