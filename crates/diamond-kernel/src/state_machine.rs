//! Upgrade lifecycle
//!
//! `Draft -> ModulesReady -> Planned -> Submitted -> Confirmed -> Verified -> Complete`,
//! with `Failed` reachable from every non-terminal state.

use crate::error::StateError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Stage of one upgrade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpgradeState {
    /// Request accepted, nothing done yet
    Draft,
    /// Module identities known
    ModulesReady,
    /// Cut plan computed
    Planned,
    /// Transaction handed to the authority
    Submitted,
    /// Success receipt observed
    Confirmed,
    /// Table matches the plan
    Verified,
    /// Addresses recorded; terminal
    Complete,
    /// Terminal failure
    Failed,
}

impl UpgradeState {
    /// Every state, in lifecycle order
    pub const ALL: [Self; 8] = [
        Self::Draft,
        Self::ModulesReady,
        Self::Planned,
        Self::Submitted,
        Self::Confirmed,
        Self::Verified,
        Self::Complete,
        Self::Failed,
    ];

    /// True for `Complete` and `Failed`
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }

    /// Next state on the success path
    #[must_use]
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Draft => Some(Self::ModulesReady),
            Self::ModulesReady => Some(Self::Planned),
            Self::Planned => Some(Self::Submitted),
            Self::Submitted => Some(Self::Confirmed),
            Self::Confirmed => Some(Self::Verified),
            Self::Verified => Some(Self::Complete),
            Self::Complete | Self::Failed => None,
        }
    }
}

impl Display for UpgradeState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Draft => "draft",
            Self::ModulesReady => "modules-ready",
            Self::Planned => "planned",
            Self::Submitted => "submitted",
            Self::Confirmed => "confirmed",
            Self::Verified => "verified",
            Self::Complete => "complete",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Validate a state transition
///
/// # Errors
/// Returns [`StateError`] if `to` is not reachable from `from` in one step
pub fn validate_transition(from: UpgradeState, to: UpgradeState) -> Result<(), StateError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(StateError { from, to })
    }
}

/// States reachable from `from` in one step
#[must_use]
pub fn allowed_transitions(from: UpgradeState) -> Vec<UpgradeState> {
    match from.next() {
        Some(next) => vec![next, UpgradeState::Failed],
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_path() {
        let mut state = UpgradeState::Draft;
        while let Some(next) = state.next() {
            validate_transition(state, next).unwrap();
            state = next;
        }
        assert_eq!(state, UpgradeState::Complete);
    }

    #[test]
    fn terminal_states_are_final() {
        for state in UpgradeState::ALL {
            assert!(validate_transition(UpgradeState::Complete, state).is_err());
            assert!(validate_transition(UpgradeState::Failed, state).is_err());
        }
    }

    #[test]
    fn no_skipping() {
        assert!(validate_transition(UpgradeState::Planned, UpgradeState::Confirmed).is_err());
        assert!(validate_transition(UpgradeState::Submitted, UpgradeState::Planned).is_err());
        assert!(validate_transition(UpgradeState::Verified, UpgradeState::Failed).is_ok());
    }
}
