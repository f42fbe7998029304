//! Deployed implementation modules

use diamond_selector::{ExtractError, ModuleAddress, ModuleInterface, Selector, SelectorExtractor, SelectorSet};
use serde::{Deserialize, Serialize};

/// A deployed implementation module
///
/// Immutable once built. A new version of a module is a new `Module` with
/// its own address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    address: ModuleAddress,
    name: String,
    selectors: SelectorSet,
}

impl Module {
    /// Create a module from an explicit selector list
    ///
    /// Duplicates collapse, first occurrence wins.
    #[must_use]
    pub fn new(
        address: ModuleAddress,
        name: impl Into<String>,
        selectors: impl IntoIterator<Item = Selector>,
    ) -> Self {
        Self {
            address,
            name: name.into(),
            selectors: selectors.into_iter().collect(),
        }
    }

    /// Create a module from its interface
    ///
    /// # Errors
    /// Returns [`ExtractError`] if the interface cannot be turned into selectors
    pub fn from_interface(
        address: ModuleAddress,
        interface: &ModuleInterface,
        extractor: &SelectorExtractor,
    ) -> Result<Self, ExtractError> {
        Ok(Self {
            address,
            name: interface.name().to_string(),
            selectors: extractor.extract(interface)?,
        })
    }

    /// Module address
    #[inline]
    #[must_use]
    pub fn address(&self) -> ModuleAddress {
        self.address
    }

    /// Module name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Selectors in declaration order
    #[inline]
    #[must_use]
    pub fn selectors(&self) -> &SelectorSet {
        &self.selectors
    }
}
