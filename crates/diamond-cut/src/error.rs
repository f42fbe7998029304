//! Planning errors

use crate::collision::Claimant;
use diamond_selector::{ExtractError, ModuleAddress, Selector};

/// Errors raised while computing a cut plan
///
/// All are raised before any cut is built; the table is never touched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    /// A target interface could not be turned into selectors
    #[error("interface of module '{module}' is invalid: {source}")]
    InterfaceParse {
        /// Module name
        module: String,
        /// Underlying extraction failure
        #[source]
        source: ExtractError,
    },

    /// Two target modules claim the same selector
    #[error("selector {selector} claimed by both {first} and {second}")]
    SelectorCollision {
        /// Contested selector
        selector: Selector,
        /// Module that claimed it first
        first: Claimant,
        /// Module that claimed it second
        second: Claimant,
    },

    /// A target module uses the reserved zero address
    #[error("module '{module}' uses the reserved zero address")]
    ReservedAddress {
        /// Module name
        module: String,
    },

    /// The same module address is listed twice
    #[error("module {address} is listed more than once")]
    DuplicateTarget {
        /// Repeated address
        address: ModuleAddress,
    },

    /// A selector is both claimed and purged
    #[error("selector {selector} is claimed by {module} and also purged")]
    PurgeConflict {
        /// Selector
        selector: Selector,
        /// Claiming module
        module: ModuleAddress,
    },

    /// A protected selector would be removed
    #[error("selector {selector} is protected and cannot be removed")]
    ProtectedSelector {
        /// Selector
        selector: Selector,
    },
}

impl PlanError {
    /// True for claim conflicts between target modules
    #[inline]
    #[must_use]
    pub fn is_collision(&self) -> bool {
        matches!(self, Self::SelectorCollision { .. })
    }
}
