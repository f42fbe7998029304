//! Kernel error types

use crate::state_machine::UpgradeState;
use crate::transaction::{OperatorId, Receipt, TxReference};
use diamond_selector::{owner_label, ModuleAddress, Selector};
use std::fmt::{self, Display, Formatter};

/// Errors returned by a [`CutAuthority`](crate::CutAuthority)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    /// Operator is not on the allowlist
    #[error("operator '{operator}' is not authorized to cut")]
    Unauthorized {
        /// Rejected identity
        operator: OperatorId,
    },

    /// Transport failure; the authority may or may not have the transaction
    #[error("network error: {message}")]
    Network {
        /// Transport detail
        message: String,
    },

    /// Reference was never issued by this authority
    #[error("unknown transaction reference {reference}")]
    UnknownReference {
        /// Unrecognised reference
        reference: TxReference,
    },
}

/// Initializer failure; the whole transaction is discarded
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("initializer reverted: {reason}")]
pub struct InitError {
    /// Revert reason
    pub reason: String,
}

impl InitError {
    /// Create an initializer failure
    #[inline]
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Errors raised by the [`CutExecutor`](crate::CutExecutor)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutionError {
    /// Operator is not on the allowlist; table unchanged
    #[error("unauthorized cut by '{operator}'")]
    Unauthorized {
        /// Rejected identity
        operator: OperatorId,
    },

    /// Submission did not reach the authority; safe to retry
    #[error("network submission failed: {message}")]
    NetworkSubmission {
        /// Transport detail
        message: String,
    },

    /// Authority returned a failure receipt; table unchanged
    #[error("transaction {} failed: {}", .receipt.reference, .receipt.failure_reason().unwrap_or("unknown"))]
    TransactionFailed {
        /// Failure receipt
        receipt: Box<Receipt>,
    },

    /// Authority does not know the reference being confirmed
    #[error("unknown transaction reference {reference}")]
    UnknownReference {
        /// Unrecognised reference
        reference: TxReference,
    },
}

impl ExecutionError {
    /// True only for transient submission failures
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NetworkSubmission { .. })
    }
}

impl From<SubmitError> for ExecutionError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::Unauthorized { operator } => Self::Unauthorized { operator },
            SubmitError::Network { message } => Self::NetworkSubmission { message },
            SubmitError::UnknownReference { reference } => Self::UnknownReference { reference },
        }
    }
}

/// One selector whose routing differs from the plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Mismatch {
    /// Selector
    pub selector: Selector,
    /// Owner the plan intended
    pub expected: Option<ModuleAddress>,
    /// Owner found in the table
    pub actual: Option<ModuleAddress>,
}

impl Display for Mismatch {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: expected {}, found {}",
            self.selector,
            owner_label(self.expected),
            owner_label(self.actual)
        )
    }
}

/// Errors raised by the [`VerificationService`](crate::VerificationService)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerificationError {
    /// The receipt being verified is not a success receipt
    #[error("cannot verify unsuccessful transaction {reference}")]
    NotSuccessful {
        /// Receipt reference
        reference: TxReference,
    },

    /// Table does not match the plan
    #[error("verification mismatch on {} selector(s): {}", .mismatches.len(), render_mismatches(.mismatches))]
    Mismatch {
        /// Every differing selector
        mismatches: Vec<Mismatch>,
    },
}

fn render_mismatches(mismatches: &[Mismatch]) -> String {
    mismatches
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Illegal upgrade state transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal transition {from} -> {to}")]
pub struct StateError {
    /// Current state
    pub from: UpgradeState,
    /// Requested state
    pub to: UpgradeState,
}

/// Audit log errors
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    /// Mirror file could not be read or written
    #[error("audit I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record could not be encoded or decoded
    #[error("audit encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// Hash chain is broken
    #[error("audit chain broken at record {sequence}")]
    IntegrityViolation {
        /// First bad record
        sequence: u64,
    },
}
