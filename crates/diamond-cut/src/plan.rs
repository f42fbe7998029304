//! Cut plans

use diamond_selector::{ModuleAddress, Selector};
use diamond_table::FacetCut;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Ordered cuts plus the owner every mentioned selector should end up with
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CutPlan {
    cuts: Vec<FacetCut>,
    expected: IndexMap<Selector, Option<ModuleAddress>>,
    base_revision: u64,
}

impl CutPlan {
    /// Build a plan from cuts; expectations are derived from the cuts
    #[must_use]
    pub fn new(cuts: Vec<FacetCut>, base_revision: u64) -> Self {
        let expected = cuts
            .iter()
            .flat_map(|cut| cut.selectors.iter().map(move |s| (*s, cut.resulting_owner())))
            .collect();
        Self {
            cuts,
            expected,
            base_revision,
        }
    }

    /// Cuts in application order
    #[inline]
    #[must_use]
    pub fn cuts(&self) -> &[FacetCut] {
        &self.cuts
    }

    /// Consume into the cut list
    #[inline]
    #[must_use]
    pub fn into_cuts(self) -> Vec<FacetCut> {
        self.cuts
    }

    /// True if the plan contains no cuts
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cuts.is_empty()
    }

    /// Table revision the plan was computed against
    #[inline]
    #[must_use]
    pub fn base_revision(&self) -> u64 {
        self.base_revision
    }

    /// Intended owner of `selector`
    ///
    /// `None` if the plan does not mention the selector, `Some(None)` if
    /// the plan removes it.
    #[inline]
    #[must_use]
    pub fn expected_owner(&self, selector: Selector) -> Option<Option<ModuleAddress>> {
        self.expected.get(&selector).copied()
    }

    /// Every selector the plan mentions, in cut order
    pub fn touched(&self) -> impl Iterator<Item = Selector> + '_ {
        self.expected.keys().copied()
    }

    /// `(selector, intended owner)` pairs in cut order
    pub fn expectations(&self) -> impl Iterator<Item = (Selector, Option<ModuleAddress>)> + '_ {
        self.expected.iter().map(|(s, m)| (*s, *m))
    }

    /// Number of selectors mentioned
    #[inline]
    #[must_use]
    pub fn touched_count(&self) -> usize {
        self.expected.len()
    }
}
