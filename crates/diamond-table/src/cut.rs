//! Cut actions

use diamond_selector::{ModuleAddress, Selector};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// What a [`FacetCut`] does to its selectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CutAction {
    /// Route currently unowned selectors to a module
    Add,
    /// Move owned selectors to a different module
    Replace,
    /// Make owned selectors unowned
    Remove,
}

impl CutAction {
    /// Numeric encoding used by the on-chain cut entry point
    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::Add => 0,
            Self::Replace => 1,
            Self::Remove => 2,
        }
    }

    /// Decode the on-chain numeric form
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Add),
            1 => Some(Self::Replace),
            2 => Some(Self::Remove),
            _ => None,
        }
    }
}

impl Display for CutAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Add => "add",
            Self::Replace => "replace",
            Self::Remove => "remove",
        };
        f.write_str(label)
    }
}

/// One group of selectors sharing an action and target module
///
/// `Remove` cuts carry no module (the unowned target).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetCut {
    /// Target module; `None` for `Remove`
    pub module: Option<ModuleAddress>,

    /// Action applied to every selector
    pub action: CutAction,

    /// Selectors in application order
    pub selectors: Vec<Selector>,
}

impl FacetCut {
    /// Route unowned selectors to `module`
    #[must_use]
    pub fn add(module: ModuleAddress, selectors: impl IntoIterator<Item = Selector>) -> Self {
        Self {
            module: Some(module),
            action: CutAction::Add,
            selectors: selectors.into_iter().collect(),
        }
    }

    /// Move owned selectors to `module`
    #[must_use]
    pub fn replace(module: ModuleAddress, selectors: impl IntoIterator<Item = Selector>) -> Self {
        Self {
            module: Some(module),
            action: CutAction::Replace,
            selectors: selectors.into_iter().collect(),
        }
    }

    /// Unroute owned selectors
    #[must_use]
    pub fn remove(selectors: impl IntoIterator<Item = Selector>) -> Self {
        Self {
            module: None,
            action: CutAction::Remove,
            selectors: selectors.into_iter().collect(),
        }
    }

    /// Owner every selector has after this cut applies
    #[inline]
    #[must_use]
    pub fn resulting_owner(&self) -> Option<ModuleAddress> {
        match self.action {
            CutAction::Remove => None,
            CutAction::Add | CutAction::Replace => self.module,
        }
    }
}

impl Display for FacetCut {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.module {
            Some(module) => write!(f, "{} {} -> {}", self.action, self.selectors.len(), module),
            None => write!(f, "{} {}", self.action, self.selectors.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_encoding() {
        for action in [CutAction::Add, CutAction::Replace, CutAction::Remove] {
            assert_eq!(CutAction::from_u8(action.as_u8()), Some(action));
        }
        assert_eq!(CutAction::from_u8(3), None);
    }

    #[test]
    fn remove_has_no_module() {
        let cut = FacetCut::remove([Selector::from_u32(7)]);
        assert_eq!(cut.module, None);
        assert_eq!(cut.resulting_owner(), None);
        assert_eq!(cut.to_string(), "remove 1");
    }

    #[test]
    fn serde_shape() {
        let cut = FacetCut::add(ModuleAddress::new([0xaa; 20]), [Selector::from_u32(0xa905_9cbb)]);
        let json = serde_json::to_value(&cut).unwrap();
        assert_eq!(json["action"], "add");
        assert_eq!(json["selectors"][0], "0xa9059cbb");
    }
}
