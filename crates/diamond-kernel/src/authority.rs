//! Cut authority seam
//!
//! A [`CutAuthority`] is whatever actually owns the dispatch table: a local
//! in-process table, or a remote service reached over the network.

use crate::error::{InitError, SubmitError};
use crate::transaction::{OperatorId, Receipt, TxReference, UpgradeTransaction};
use async_trait::async_trait;
use diamond_table::{StagedTable, TableSnapshot};

/// Applies upgrade transactions to a dispatch table
#[async_trait]
pub trait CutAuthority: Send + Sync {
    /// Submit a transaction on behalf of `operator`
    ///
    /// Submitting a transaction id that was already accepted returns the
    /// original reference without applying it again.
    ///
    /// # Errors
    /// - [`SubmitError::Unauthorized`] if `operator` may not cut
    /// - [`SubmitError::Network`] on transport failure
    async fn submit(
        &self,
        operator: &OperatorId,
        transaction: &UpgradeTransaction,
    ) -> Result<TxReference, SubmitError>;

    /// Terminal receipt for `reference`, or `None` while still pending
    ///
    /// # Errors
    /// - [`SubmitError::UnknownReference`] if the reference was never issued
    /// - [`SubmitError::Network`] on transport failure
    async fn receipt(&self, reference: TxReference) -> Result<Option<Receipt>, SubmitError>;

    /// Consistent copy of the current routes
    ///
    /// # Errors
    /// Returns [`SubmitError::Network`] on transport failure
    async fn snapshot(&self) -> Result<TableSnapshot, SubmitError>;
}

/// One-time migration run against the staged table
///
/// Runs after every cut of the transaction applied. Returning an error
/// discards the whole transaction.
pub trait Initializer: Send + Sync {
    /// Run the migration
    ///
    /// # Errors
    /// Returns [`InitError`] to revert the transaction
    fn initialize(&self, table: &StagedTable, calldata: &[u8]) -> Result<(), InitError>;
}

impl<F> Initializer for F
where
    F: Fn(&StagedTable, &[u8]) -> Result<(), InitError> + Send + Sync,
{
    fn initialize(&self, table: &StagedTable, calldata: &[u8]) -> Result<(), InitError> {
        self(table, calldata)
    }
}
