//! Selector claim tracking
//!
//! Every selector may be claimed by at most one target module.

use crate::error::PlanError;
use diamond_selector::{ModuleAddress, Selector};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// A target module staking a claim on a selector
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Claimant {
    /// Module address
    pub address: ModuleAddress,
    /// Module name
    pub name: String,
}

impl Display for Claimant {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.address)
    }
}

/// Index of selector claims across all target modules
#[derive(Debug, Default)]
pub(crate) struct ClaimIndex {
    claims: IndexMap<Selector, Claimant>,
}

impl ClaimIndex {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Record `claimant` for `selector`
    ///
    /// Re-claiming by the same module is a no-op.
    pub(crate) fn claim(&mut self, selector: Selector, claimant: &Claimant) -> Result<(), PlanError> {
        match self.claims.get(&selector) {
            Some(existing) if existing.address == claimant.address => Ok(()),
            Some(existing) => Err(PlanError::SelectorCollision {
                selector,
                first: existing.clone(),
                second: claimant.clone(),
            }),
            None => {
                self.claims.insert(selector, claimant.clone());
                Ok(())
            }
        }
    }

    /// Claimant of `selector`, if any
    pub(crate) fn claimant(&self, selector: Selector) -> Option<&Claimant> {
        self.claims.get(&selector)
    }

    pub(crate) fn is_claimed(&self, selector: Selector) -> bool {
        self.claims.contains_key(&selector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claimant(n: u8, name: &str) -> Claimant {
        Claimant {
            address: ModuleAddress::new([n; 20]),
            name: name.to_string(),
        }
    }

    #[test]
    fn second_module_collides() {
        let mut index = ClaimIndex::new();
        let selector = Selector::from_u32(0x1234_5678);
        index.claim(selector, &claimant(1, "A")).unwrap();
        index.claim(selector, &claimant(1, "A")).unwrap();

        let err = index.claim(selector, &claimant(2, "B")).unwrap_err();
        assert!(matches!(
            err,
            PlanError::SelectorCollision { ref first, ref second, .. }
                if first.name == "A" && second.name == "B"
        ));
        assert_eq!(index.claimant(selector).map(|c| c.name.as_str()), Some("A"));
        assert!(index.is_claimed(selector));
    }
}
