//! Orchestrator errors

use crate::address_book::AddressBookError;
use crate::config::ConfigError;
use crate::deployer::DeployError;
use diamond_cut::PlanError;
use diamond_kernel::{
    AuditError, ExecutionError, StateError, SubmitError, UpgradeState, VerificationError,
};

/// Failure of one upgrade run, tagged with the stage it happened in
#[derive(Debug, thiserror::Error)]
#[error("upgrade failed while {stage}: {kind}")]
pub struct UpgradeError {
    /// State the upgrade was in when the error occurred
    pub stage: UpgradeState,
    /// What went wrong
    #[source]
    pub kind: UpgradeErrorKind,
}

impl UpgradeError {
    /// Tag `kind` with `stage`
    #[must_use]
    pub fn new(stage: UpgradeState, kind: impl Into<UpgradeErrorKind>) -> Self {
        Self {
            stage,
            kind: kind.into(),
        }
    }

    /// True if resubmitting the same transaction may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(&self.kind, UpgradeErrorKind::Execution(err) if err.is_retryable())
    }

    /// True if a human must act before trying again
    #[must_use]
    pub fn requires_operator(&self) -> bool {
        match &self.kind {
            UpgradeErrorKind::Execution(err) => matches!(
                err,
                ExecutionError::Unauthorized { .. } | ExecutionError::TransactionFailed { .. }
            ),
            UpgradeErrorKind::Authority(SubmitError::Unauthorized { .. })
            | UpgradeErrorKind::Verification(_)
            | UpgradeErrorKind::Aborted
            | UpgradeErrorKind::State(_) => true,
            _ => false,
        }
    }
}

/// Underlying cause of an [`UpgradeError`]
#[derive(Debug, thiserror::Error)]
pub enum UpgradeErrorKind {
    /// Invalid configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Module deployment failed
    #[error(transparent)]
    Deploy(#[from] DeployError),

    /// A `Recorded` module or previous version is missing from the address book
    #[error("no recorded deployment of '{name}' on {network}")]
    UnknownModule {
        /// Module name
        name: String,
        /// Network looked up
        network: String,
    },

    /// Cut planning failed
    #[error(transparent)]
    Plan(#[from] PlanError),

    /// Submission or confirmation failed
    #[error(transparent)]
    Execution(#[from] ExecutionError),

    /// Post-execution check failed
    #[error(transparent)]
    Verification(#[from] VerificationError),

    /// Reading the table failed
    #[error("authority error: {0}")]
    Authority(#[from] SubmitError),

    /// Address book could not be read
    #[error(transparent)]
    AddressBook(#[from] AddressBookError),

    /// Audit log could not be opened
    #[error(transparent)]
    Audit(#[from] AuditError),

    /// Illegal state transition
    #[error(transparent)]
    State(#[from] StateError),

    /// Operator aborted before submission
    #[error("aborted by operator")]
    Aborted,
}

#[cfg(test)]
mod tests {
    use super::*;
    use diamond_kernel::OperatorId;

    #[test]
    fn only_network_submission_is_retryable() {
        let network = UpgradeError::new(
            UpgradeState::Planned,
            ExecutionError::NetworkSubmission {
                message: "reset".into(),
            },
        );
        assert!(network.is_retryable());
        assert!(!network.requires_operator());

        let unauthorized = UpgradeError::new(
            UpgradeState::Planned,
            ExecutionError::Unauthorized {
                operator: OperatorId::new("mallory"),
            },
        );
        assert!(!unauthorized.is_retryable());
        assert!(unauthorized.requires_operator());

        let aborted = UpgradeError::new(UpgradeState::Planned, UpgradeErrorKind::Aborted);
        assert!(aborted.requires_operator());
        assert_eq!(aborted.to_string(), "upgrade failed while planned: aborted by operator");
    }
}
