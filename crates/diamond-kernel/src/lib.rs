//! Diamond Kernel
//!
//! Executes cut plans against a dispatch table authority and checks the
//! result.
//!
//! # Core Concepts
//!
//! - [`UpgradeTransaction`]: ordered cuts plus an optional [`InitCall`], keyed by [`TransactionId`]
//! - [`CutAuthority`]: owner of the table; [`LocalAuthority`] is the in-process one
//! - [`CutExecutor`]: submit, then poll for a terminal [`Receipt`]
//! - [`VerificationService`]: re-reads every planned selector after success
//! - [`UpgradeState`]: lifecycle with [`validate_transition`]
//! - [`AuditLog`]: SHA-256 chained record of every finished upgrade

mod audit;
mod authority;
mod error;
mod executor;
mod local;
mod state_machine;
mod transaction;
mod verify;

pub use audit::{AuditEntry, AuditLog, AuditOutcome, AuditRecord};
pub use authority::{CutAuthority, Initializer};
pub use error::{
    AuditError, ExecutionError, InitError, Mismatch, StateError, SubmitError, VerificationError,
};
pub use executor::{CutExecutor, DEFAULT_POLL_INTERVAL};
pub use local::LocalAuthority;
pub use state_machine::{allowed_transitions, validate_transition, UpgradeState};
pub use transaction::{
    InitCall, OperatorId, Receipt, ReceiptStatus, TransactionId, TxReference, UpgradeTransaction,
};
pub use verify::{VerificationReport, VerificationService};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
