//! Selector dispatch table
//!
//! [`DispatchTable`] maps each selector to at most one owning module.
//! Changes go through [`DispatchTable::transact`]: cuts are validated and
//! applied to a [`StagedTable`] copy, and the copy is published with one
//! write-lock swap. Readers see either the whole transaction or none of it.

use crate::cut::{CutAction, FacetCut};
use diamond_selector::{ModuleAddress, Selector};
use indexmap::IndexMap;
use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Read access to a selector routing table
pub trait TableReader {
    /// Owner of `selector`, or `None` if unowned
    fn resolve(&self, selector: Selector) -> Option<ModuleAddress>;

    /// Every routed selector, grouped by module in first-appearance order
    fn list_all(&self) -> Vec<(Selector, ModuleAddress)>;
}

/// Errors raised when a cut violates routing rules
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CutError {
    /// Cut names no selectors
    #[error("{action} cut has no selectors")]
    EmptySelectors {
        /// Offending action
        action: CutAction,
    },

    /// `Add`/`Replace` without a target module
    #[error("{action} cut has no target module")]
    MissingModule {
        /// Offending action
        action: CutAction,
    },

    /// `Add`/`Replace` targeting the reserved zero address
    #[error("{action} cut targets the zero address")]
    ZeroModule {
        /// Offending action
        action: CutAction,
    },

    /// `Remove` carrying a module
    #[error("remove cut must not carry a module, got {module}")]
    RemoveWithModule {
        /// Module found on the cut
        module: ModuleAddress,
    },

    /// `Add` of a selector that already has an owner
    #[error("cannot add {selector}: already owned by {owner}")]
    AlreadyOwned {
        /// Selector
        selector: Selector,
        /// Current owner
        owner: ModuleAddress,
    },

    /// `Replace` with the module that already owns the selector
    #[error("cannot replace {selector}: already owned by {module}")]
    SameModule {
        /// Selector
        selector: Selector,
        /// Current and requested owner
        module: ModuleAddress,
    },

    /// `Replace`/`Remove` of a selector nobody owns
    #[error("cannot {action} {selector}: selector is unowned")]
    NotOwned {
        /// Offending action
        action: CutAction,
        /// Selector
        selector: Selector,
    },
}

/// Routing state shared by the live and staged tables
#[derive(Debug, Clone, Default)]
struct Routes {
    entries: IndexMap<Selector, ModuleAddress>,
    revision: u64,
}

impl Routes {
    fn grouped(&self) -> Vec<(Selector, ModuleAddress)> {
        let mut groups: IndexMap<ModuleAddress, Vec<Selector>> = IndexMap::new();
        for (selector, owner) in &self.entries {
            groups.entry(*owner).or_default().push(*selector);
        }
        groups
            .into_iter()
            .flat_map(|(owner, selectors)| selectors.into_iter().map(move |s| (s, owner)))
            .collect()
    }
}

/// Shared selector to module routing table
///
/// # Example
/// ```
/// use diamond_selector::{ModuleAddress, Selector};
/// use diamond_table::{CutError, DispatchTable, FacetCut, TableReader};
///
/// let table = DispatchTable::new();
/// let module = ModuleAddress::new([7; 20]);
/// let selector = Selector::from_u32(0xa905_9cbb);
///
/// table
///     .transact(|staged| staged.apply_cut(&FacetCut::add(module, [selector])))
///     .unwrap();
/// assert_eq!(table.resolve(selector), Some(module));
/// ```
#[derive(Debug, Default)]
pub struct DispatchTable {
    routes: RwLock<Routes>,
}

impl DispatchTable {
    /// Create an empty table
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a table from a snapshot
    #[must_use]
    pub fn from_snapshot(snapshot: TableSnapshot) -> Self {
        Self {
            routes: RwLock::new(Routes {
                entries: snapshot.routes,
                revision: snapshot.revision,
            }),
        }
    }

    /// Consistent copy of the current routes
    #[must_use]
    pub fn snapshot(&self) -> TableSnapshot {
        let routes = self.routes.read();
        TableSnapshot {
            routes: routes.entries.clone(),
            revision: routes.revision,
        }
    }

    /// Number of committed transactions
    #[inline]
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.routes.read().revision
    }

    /// Number of routed selectors
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.read().entries.len()
    }

    /// True if nothing is routed
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.read().entries.is_empty()
    }

    /// Run `stage` against a private copy and publish it on success
    ///
    /// Writers are serialized; readers keep reading the previous routes
    /// until the swap. If `stage` fails nothing is published.
    ///
    /// # Errors
    /// Returns whatever error `stage` returns
    pub fn transact<T, E, F>(&self, stage: F) -> Result<T, E>
    where
        F: FnOnce(&mut StagedTable) -> Result<T, E>,
    {
        let current = self.routes.upgradable_read();
        let mut staged = StagedTable {
            entries: current.entries.clone(),
        };

        let output = stage(&mut staged)?;

        let mut routes = RwLockUpgradableReadGuard::upgrade(current);
        routes.entries = staged.entries;
        routes.revision += 1;
        debug!(
            revision = routes.revision,
            selectors = routes.entries.len(),
            "Published dispatch table"
        );

        Ok(output)
    }
}

impl TableReader for DispatchTable {
    fn resolve(&self, selector: Selector) -> Option<ModuleAddress> {
        self.routes.read().entries.get(&selector).copied()
    }

    fn list_all(&self) -> Vec<(Selector, ModuleAddress)> {
        self.routes.read().grouped()
    }
}

/// Private working copy used inside [`DispatchTable::transact`]
#[derive(Debug)]
pub struct StagedTable {
    entries: IndexMap<Selector, ModuleAddress>,
}

impl StagedTable {
    /// Validate and apply one cut
    ///
    /// Selectors are applied in order; the first violation aborts the cut.
    /// Partial effects are discarded with the staged copy.
    ///
    /// # Errors
    /// Returns [`CutError`] describing the first violated rule
    pub fn apply_cut(&mut self, cut: &FacetCut) -> Result<(), CutError> {
        if cut.selectors.is_empty() {
            return Err(CutError::EmptySelectors { action: cut.action });
        }

        match cut.action {
            CutAction::Add => {
                let module = Self::live_module(cut)?;
                for &selector in &cut.selectors {
                    if let Some(&owner) = self.entries.get(&selector) {
                        return Err(CutError::AlreadyOwned { selector, owner });
                    }
                    self.entries.insert(selector, module);
                }
            }
            CutAction::Replace => {
                let module = Self::live_module(cut)?;
                for &selector in &cut.selectors {
                    match self.entries.get_mut(&selector) {
                        None => {
                            return Err(CutError::NotOwned {
                                action: cut.action,
                                selector,
                            });
                        }
                        Some(owner) if *owner == module => {
                            return Err(CutError::SameModule { selector, module });
                        }
                        Some(owner) => *owner = module,
                    }
                }
            }
            CutAction::Remove => {
                if let Some(module) = cut.module {
                    return Err(CutError::RemoveWithModule { module });
                }
                for &selector in &cut.selectors {
                    if self.entries.shift_remove(&selector).is_none() {
                        return Err(CutError::NotOwned {
                            action: cut.action,
                            selector,
                        });
                    }
                }
            }
        }

        Ok(())
    }

    /// Owner of `selector` in the staged routes
    #[inline]
    #[must_use]
    pub fn resolve(&self, selector: Selector) -> Option<ModuleAddress> {
        self.entries.get(&selector).copied()
    }

    /// Number of staged routes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no routes are staged
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn live_module(cut: &FacetCut) -> Result<ModuleAddress, CutError> {
        match cut.module {
            None => Err(CutError::MissingModule { action: cut.action }),
            Some(module) if module.is_zero() => Err(CutError::ZeroModule { action: cut.action }),
            Some(module) => Ok(module),
        }
    }
}

/// Point-in-time copy of the routes
///
/// Iteration follows table order: the order selectors were first routed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSnapshot {
    routes: IndexMap<Selector, ModuleAddress>,
    revision: u64,
}

impl TableSnapshot {
    /// Build a snapshot from explicit routes
    #[must_use]
    pub fn from_routes(routes: impl IntoIterator<Item = (Selector, ModuleAddress)>) -> Self {
        Self {
            routes: routes.into_iter().collect(),
            revision: 0,
        }
    }

    /// Revision the snapshot was taken at
    #[inline]
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Number of routed selectors
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// True if nothing is routed
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Iterate routes in table order
    pub fn iter(&self) -> impl Iterator<Item = (Selector, ModuleAddress)> + '_ {
        self.routes.iter().map(|(s, m)| (*s, *m))
    }

    /// Selectors owned by `module`, in table order
    #[must_use]
    pub fn selectors_of(&self, module: ModuleAddress) -> Vec<Selector> {
        self.routes
            .iter()
            .filter(|(_, owner)| **owner == module)
            .map(|(selector, _)| *selector)
            .collect()
    }

    /// Distinct owners in first-appearance order
    #[must_use]
    pub fn modules(&self) -> Vec<ModuleAddress> {
        let mut seen = indexmap::IndexSet::new();
        for owner in self.routes.values() {
            seen.insert(*owner);
        }
        seen.into_iter().collect()
    }

    /// Table-order position of `selector`
    #[inline]
    #[must_use]
    pub fn position(&self, selector: Selector) -> Option<usize> {
        self.routes.get_index_of(&selector)
    }
}

impl TableReader for TableSnapshot {
    fn resolve(&self, selector: Selector) -> Option<ModuleAddress> {
        self.routes.get(&selector).copied()
    }

    fn list_all(&self) -> Vec<(Selector, ModuleAddress)> {
        Routes {
            entries: self.routes.clone(),
            revision: self.revision,
        }
        .grouped()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> ModuleAddress {
        ModuleAddress::new([n; 20])
    }

    fn sel(n: u32) -> Selector {
        Selector::from_u32(n)
    }

    fn seeded() -> DispatchTable {
        let table = DispatchTable::new();
        table
            .transact(|staged| {
                staged.apply_cut(&FacetCut::add(addr(1), [sel(1), sel(2)]))?;
                staged.apply_cut(&FacetCut::add(addr(2), [sel(3)]))
            })
            .unwrap();
        table
    }

    #[test]
    fn add_routes_selectors() {
        let table = seeded();
        assert_eq!(table.resolve(sel(1)), Some(addr(1)));
        assert_eq!(table.resolve(sel(3)), Some(addr(2)));
        assert_eq!(table.resolve(sel(9)), None);
        assert_eq!(table.revision(), 1);
    }

    #[test]
    fn add_rejects_owned_selector() {
        let table = seeded();
        let err = table
            .transact(|staged| staged.apply_cut(&FacetCut::add(addr(3), [sel(2)])))
            .unwrap_err();
        assert_eq!(
            err,
            CutError::AlreadyOwned {
                selector: sel(2),
                owner: addr(1)
            }
        );
    }

    #[test]
    fn add_rejects_zero_module() {
        let table = DispatchTable::new();
        let err = table
            .transact(|staged| staged.apply_cut(&FacetCut::add(ModuleAddress::ZERO, [sel(1)])))
            .unwrap_err();
        assert_eq!(err, CutError::ZeroModule { action: CutAction::Add });
    }

    #[test]
    fn replace_requires_different_owner() {
        let table = seeded();
        let err = table
            .transact(|staged| staged.apply_cut(&FacetCut::replace(addr(1), [sel(1)])))
            .unwrap_err();
        assert_eq!(
            err,
            CutError::SameModule {
                selector: sel(1),
                module: addr(1)
            }
        );

        let err = table
            .transact(|staged| staged.apply_cut(&FacetCut::replace(addr(3), [sel(42)])))
            .unwrap_err();
        assert!(matches!(err, CutError::NotOwned { .. }));
    }

    #[test]
    fn replace_keeps_table_position() {
        let table = seeded();
        table
            .transact(|staged| staged.apply_cut(&FacetCut::replace(addr(3), [sel(1)])))
            .unwrap();
        let snapshot = table.snapshot();
        assert_eq!(snapshot.position(sel(1)), Some(0));
        assert_eq!(snapshot.resolve(sel(1)), Some(addr(3)));
    }

    #[test]
    fn remove_rules() {
        let table = seeded();
        let with_module = FacetCut {
            module: Some(addr(1)),
            action: CutAction::Remove,
            selectors: vec![sel(1)],
        };
        assert!(matches!(
            table.transact(|staged| staged.apply_cut(&with_module)),
            Err(CutError::RemoveWithModule { .. })
        ));
        assert!(matches!(
            table.transact(|staged| staged.apply_cut(&FacetCut::remove([sel(77)]))),
            Err(CutError::NotOwned { .. })
        ));

        table
            .transact(|staged| staged.apply_cut(&FacetCut::remove([sel(1)])))
            .unwrap();
        assert_eq!(table.resolve(sel(1)), None);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn empty_cut_rejected() {
        let table = DispatchTable::new();
        let err = table
            .transact(|staged| staged.apply_cut(&FacetCut::remove([])))
            .unwrap_err();
        assert_eq!(err, CutError::EmptySelectors { action: CutAction::Remove });
    }

    #[test]
    fn failed_transaction_publishes_nothing() {
        let table = seeded();
        let before = table.snapshot();
        let result = table.transact(|staged| {
            staged.apply_cut(&FacetCut::add(addr(4), [sel(10)]))?;
            staged.apply_cut(&FacetCut::remove([sel(1)]))?;
            staged.apply_cut(&FacetCut::add(addr(4), [sel(3)]))
        });
        assert!(result.is_err());
        assert_eq!(table.snapshot(), before);
        assert_eq!(table.resolve(sel(10)), None);
    }

    #[test]
    fn list_all_groups_by_module() {
        let table = DispatchTable::new();
        table
            .transact(|staged| {
                staged.apply_cut(&FacetCut::add(addr(1), [sel(1)]))?;
                staged.apply_cut(&FacetCut::add(addr(2), [sel(2)]))?;
                staged.apply_cut(&FacetCut::add(addr(1), [sel(3)]))
            })
            .unwrap();
        assert_eq!(
            table.list_all(),
            vec![(sel(1), addr(1)), (sel(3), addr(1)), (sel(2), addr(2))]
        );
        assert_eq!(table.snapshot().list_all(), table.list_all());
        assert_eq!(table.snapshot().modules(), vec![addr(1), addr(2)]);
        assert_eq!(table.snapshot().selectors_of(addr(1)), vec![sel(1), sel(3)]);
    }

    #[test]
    fn snapshot_round_trip() {
        let table = seeded();
        let restored = DispatchTable::from_snapshot(table.snapshot());
        assert_eq!(restored.snapshot(), table.snapshot());

        let json = serde_json::to_string(&table.snapshot()).unwrap();
        let decoded: TableSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, table.snapshot());
    }
}
