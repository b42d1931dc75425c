use core::fmt;
use core::num::NonZeroU32;

/// Position of a truth, exact or reduced problem in an engine's registry.
///
/// Ids are handed out in registration order and never reused, so they stay
/// valid as back-references (reduced -> truth, exact -> truth). Stored as
/// `index + 1` so that `Option<ProblemId>` costs nothing extra.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProblemId(NonZeroU32);

impl ProblemId {
    pub fn from_index(index: u32) -> Self {
        Self(NonZeroU32::MIN.saturating_add(index))
    }

    pub fn index(self) -> u32 {
        self.0.get() - 1
    }
}

impl fmt::Debug for ProblemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProblemId({})", self.index())
    }
}

impl fmt::Display for ProblemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_positions_survive() {
        for i in [0_u32, 1, 41, 10_000] {
            assert_eq!(ProblemId::from_index(i).index(), i);
        }
        assert!(ProblemId::from_index(1) < ProblemId::from_index(2));
    }

    #[test]
    fn optional_back_reference_is_free() {
        assert_eq!(
            core::mem::size_of::<ProblemId>(),
            core::mem::size_of::<Option<ProblemId>>()
        );
    }
}
