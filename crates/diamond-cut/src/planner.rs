//! Cut planner
//!
//! Diffs an [`UpgradeTarget`] against a [`TableSnapshot`] and emits the
//! minimal ordered list of cuts. The planner never mutates the table.
//!
//! # Output order
//!
//! 1. `Add` groups, one per module, in declaration order
//! 2. `Replace` groups, one per module, in declaration order
//! 3. A single `Remove` group, selectors in current-table order

use crate::collision::{ClaimIndex, Claimant};
use crate::error::PlanError;
use crate::plan::CutPlan;
use crate::target::{SelectorSource, TargetModule, UpgradeTarget};
use diamond_selector::{ModuleAddress, Selector, SelectorExtractor, SelectorSet};
use diamond_table::{FacetCut, TableReader, TableSnapshot};
use indexmap::IndexSet;
use tracing::debug;

/// Computes cut plans
#[derive(Debug, Clone, Default)]
pub struct CutPlanner {
    extractor: SelectorExtractor,
}

/// A target module with its resolved selectors
struct Resolved<'a> {
    module: &'a TargetModule,
    claimant: Claimant,
    selectors: SelectorSet,
}

impl CutPlanner {
    /// Planner with a default extractor
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Planner using `extractor` for interface-sourced modules
    #[inline]
    #[must_use]
    pub fn with_extractor(extractor: SelectorExtractor) -> Self {
        Self { extractor }
    }

    /// Plan the cuts that take `snapshot` to `target`
    ///
    /// # Errors
    /// Returns [`PlanError`] if the target is inconsistent with itself or
    /// with the protected set. Nothing is planned in that case.
    pub fn plan(&self, snapshot: &TableSnapshot, target: &UpgradeTarget) -> Result<CutPlan, PlanError> {
        let resolved = self.resolve_modules(target)?;

        let mut claims = ClaimIndex::new();
        for entry in &resolved {
            for &selector in &entry.selectors {
                claims.claim(selector, &entry.claimant)?;
            }
        }

        let mut removals: IndexSet<Selector> = IndexSet::new();

        for &selector in target.purge() {
            if let Some(claimant) = claims.claimant(selector) {
                return Err(PlanError::PurgeConflict {
                    selector,
                    module: claimant.address,
                });
            }
            if target.protected().contains(&selector) {
                return Err(PlanError::ProtectedSelector { selector });
            }
            if snapshot.resolve(selector).is_some() {
                removals.insert(selector);
            } else {
                debug!(%selector, "Purged selector is not routed, skipping");
            }
        }

        for entry in &resolved {
            for &previous in &entry.module.supersedes {
                for selector in snapshot.selectors_of(previous) {
                    if claims.is_claimed(selector) {
                        continue;
                    }
                    if target.protected().contains(&selector) {
                        return Err(PlanError::ProtectedSelector { selector });
                    }
                    removals.insert(selector);
                }
            }
        }

        let mut adds = Vec::new();
        let mut replaces = Vec::new();
        for entry in &resolved {
            let address = entry.module.address;
            let mut added = Vec::new();
            let mut replaced = Vec::new();
            for &selector in &entry.selectors {
                match snapshot.resolve(selector) {
                    None => added.push(selector),
                    Some(owner) if owner != address => replaced.push(selector),
                    Some(_) => {}
                }
            }
            if !added.is_empty() {
                adds.push(FacetCut::add(address, added));
            }
            if !replaced.is_empty() {
                replaces.push(FacetCut::replace(address, replaced));
            }
        }

        removals.sort_by(|a, b| snapshot.position(*a).cmp(&snapshot.position(*b)));

        let mut cuts = adds;
        cuts.append(&mut replaces);
        if !removals.is_empty() {
            cuts.push(FacetCut::remove(removals));
        }

        let plan = CutPlan::new(cuts, snapshot.revision());
        debug!(
            cuts = plan.cuts().len(),
            touched = plan.touched_count(),
            base_revision = plan.base_revision(),
            "Planned cut"
        );
        Ok(plan)
    }

    fn resolve_modules<'a>(&self, target: &'a UpgradeTarget) -> Result<Vec<Resolved<'a>>, PlanError> {
        let mut seen: IndexSet<ModuleAddress> = IndexSet::new();
        let mut resolved = Vec::with_capacity(target.modules().len());

        for module in target.modules() {
            if module.address.is_zero() {
                return Err(PlanError::ReservedAddress {
                    module: module.name.clone(),
                });
            }
            if !seen.insert(module.address) {
                return Err(PlanError::DuplicateTarget {
                    address: module.address,
                });
            }

            let selectors = match &module.source {
                SelectorSource::Interface(interface) => {
                    self.extractor
                        .extract(interface)
                        .map_err(|source| PlanError::InterfaceParse {
                            module: module.name.clone(),
                            source,
                        })?
                }
                SelectorSource::Selectors(selectors) => selectors.iter().copied().collect(),
            };

            resolved.push(Resolved {
                module,
                claimant: Claimant {
                    address: module.address,
                    name: module.name.clone(),
                },
                selectors,
            });
        }

        Ok(resolved)
    }
}
