//! Upgrade targets
//!
//! An [`UpgradeTarget`] describes the desired end state: which modules
//! should serve which selectors, which selectors to drop, and which must
//! never be dropped.

use diamond_selector::{ModuleAddress, ModuleInterface, Selector};
use diamond_table::{Module, TableSnapshot};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// Where a target module's selectors come from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectorSource {
    /// Extract from the declared interface at planning time
    Interface(ModuleInterface),
    /// Already-derived selectors
    Selectors(Vec<Selector>),
}

/// A module that should serve its selectors after the upgrade
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetModule {
    /// Deployed address
    pub address: ModuleAddress,

    /// Human-readable name
    pub name: String,

    /// Selector source
    pub source: SelectorSource,

    /// Modules this one replaces; their unclaimed selectors are removed
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supersedes: Vec<ModuleAddress>,
}

impl TargetModule {
    /// Target whose selectors come from an interface
    #[must_use]
    pub fn from_interface(address: ModuleAddress, interface: ModuleInterface) -> Self {
        Self {
            address,
            name: interface.name().to_string(),
            source: SelectorSource::Interface(interface),
            supersedes: Vec::new(),
        }
    }

    /// Target with an explicit selector list
    #[must_use]
    pub fn from_selectors(
        address: ModuleAddress,
        name: impl Into<String>,
        selectors: impl IntoIterator<Item = Selector>,
    ) -> Self {
        Self {
            address,
            name: name.into(),
            source: SelectorSource::Selectors(selectors.into_iter().collect()),
            supersedes: Vec::new(),
        }
    }

    /// Declare a superseded module
    #[must_use]
    pub fn superseding(mut self, previous: ModuleAddress) -> Self {
        if !self.supersedes.contains(&previous) {
            self.supersedes.push(previous);
        }
        self
    }
}

impl From<&Module> for TargetModule {
    fn from(module: &Module) -> Self {
        Self::from_selectors(module.address(), module.name(), module.selectors().iter().copied())
    }
}

/// Desired routing after an upgrade
///
/// # Example
/// ```
/// use diamond_cut::{TargetModule, UpgradeTarget};
/// use diamond_selector::{ModuleAddress, ModuleInterface};
///
/// let v2 = ModuleAddress::new([2; 20]);
/// let v1 = ModuleAddress::new([1; 20]);
/// let target = UpgradeTarget::new().with_module(
///     TargetModule::from_interface(v2, ModuleInterface::new("CharV2", ["create()"]))
///         .superseding(v1),
/// );
/// assert_eq!(target.modules().len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeTarget {
    modules: Vec<TargetModule>,

    #[serde(default)]
    purge: IndexSet<Selector>,

    #[serde(default)]
    protected: IndexSet<Selector>,
}

impl UpgradeTarget {
    /// Empty target (plans to nothing)
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a target module
    #[must_use]
    pub fn with_module(mut self, module: TargetModule) -> Self {
        self.modules.push(module);
        self
    }

    /// Append several target modules
    #[must_use]
    pub fn with_modules(mut self, modules: impl IntoIterator<Item = TargetModule>) -> Self {
        self.modules.extend(modules);
        self
    }

    /// Add selectors to the purge denylist
    #[must_use]
    pub fn with_purge(mut self, selectors: impl IntoIterator<Item = Selector>) -> Self {
        self.purge.extend(selectors);
        self
    }

    /// Mark selectors that must never be removed
    #[must_use]
    pub fn with_protected(mut self, selectors: impl IntoIterator<Item = Selector>) -> Self {
        self.protected.extend(selectors);
        self
    }

    /// Purge every owned selector except the protected ones
    ///
    /// Call after [`UpgradeTarget::with_protected`].
    #[must_use]
    pub fn purge_all(mut self, snapshot: &TableSnapshot) -> Self {
        let owned: Vec<Selector> = snapshot
            .iter()
            .map(|(selector, _)| selector)
            .filter(|selector| !self.protected.contains(selector))
            .collect();
        self.purge.extend(owned);
        self
    }

    /// Target modules in declaration order
    #[inline]
    #[must_use]
    pub fn modules(&self) -> &[TargetModule] {
        &self.modules
    }

    /// Purge denylist
    #[inline]
    #[must_use]
    pub fn purge(&self) -> &IndexSet<Selector> {
        &self.purge
    }

    /// Protected selectors
    #[inline]
    #[must_use]
    pub fn protected(&self) -> &IndexSet<Selector> {
        &self.protected
    }

    /// True if the target names no modules and purges nothing
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty() && self.purge.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn purge_all_skips_protected() {
        let snapshot = TableSnapshot::from_routes([
            (Selector::from_u32(1), ModuleAddress::new([1; 20])),
            (Selector::from_u32(2), ModuleAddress::new([1; 20])),
            (Selector::from_u32(3), ModuleAddress::new([2; 20])),
        ]);
        let target = UpgradeTarget::new()
            .with_protected([Selector::from_u32(2)])
            .purge_all(&snapshot);
        assert_eq!(
            target.purge().iter().copied().collect::<Vec<_>>(),
            vec![Selector::from_u32(1), Selector::from_u32(3)]
        );
    }

    #[test]
    fn superseding_deduplicates() {
        let old = ModuleAddress::new([1; 20]);
        let module = TargetModule::from_selectors(ModuleAddress::new([2; 20]), "V2", [])
            .superseding(old)
            .superseding(old);
        assert_eq!(module.supersedes, vec![old]);
    }

    #[test]
    fn from_module_copies_selectors() {
        let module = Module::new(ModuleAddress::new([3; 20]), "Char", [Selector::from_u32(9)]);
        let target = TargetModule::from(&module);
        assert_eq!(target.name, "Char");
        assert_eq!(target.source, SelectorSource::Selectors(vec![Selector::from_u32(9)]));
    }
}
