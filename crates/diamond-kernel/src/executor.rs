//! Cut executor
//!
//! Hands [`UpgradeTransaction`]s to a [`CutAuthority`] and waits for their
//! terminal receipts.

use crate::authority::CutAuthority;
use crate::error::{ExecutionError, SubmitError};
use crate::transaction::{OperatorId, Receipt, TxReference, UpgradeTransaction};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default pause between receipt polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Submits transactions as one operator and confirms them
#[derive(Clone)]
pub struct CutExecutor {
    authority: Arc<dyn CutAuthority>,
    operator: OperatorId,
    poll_interval: Duration,
}

impl CutExecutor {
    /// Executor submitting to `authority` as `operator`
    #[must_use]
    pub fn new(authority: Arc<dyn CutAuthority>, operator: OperatorId) -> Self {
        Self {
            authority,
            operator,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Set the receipt polling interval
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Submitting identity
    #[inline]
    #[must_use]
    pub fn operator(&self) -> &OperatorId {
        &self.operator
    }

    /// Underlying authority
    #[inline]
    #[must_use]
    pub fn authority(&self) -> &Arc<dyn CutAuthority> {
        &self.authority
    }

    /// Submit without waiting for the outcome
    ///
    /// # Errors
    /// - [`ExecutionError::Unauthorized`] if the operator may not cut
    /// - [`ExecutionError::NetworkSubmission`] if the authority was unreachable
    pub async fn submit(&self, transaction: &UpgradeTransaction) -> Result<TxReference, ExecutionError> {
        debug!(
            transaction = %transaction.id,
            operator = %self.operator,
            cuts = transaction.cuts.len(),
            "Submitting transaction"
        );
        let reference = self.authority.submit(&self.operator, transaction).await?;
        info!(transaction = %transaction.id, %reference, "Transaction submitted");
        Ok(reference)
    }

    /// Wait for the terminal receipt of `reference`
    ///
    /// There is no client-side timeout: pending receipts and transport
    /// errors while polling are retried until the authority answers.
    ///
    /// # Errors
    /// - [`ExecutionError::TransactionFailed`] on a failure receipt
    /// - [`ExecutionError::UnknownReference`] if the authority never issued it
    pub async fn confirm(&self, reference: TxReference) -> Result<Receipt, ExecutionError> {
        loop {
            match self.authority.receipt(reference).await {
                Ok(Some(receipt)) if receipt.is_success() => {
                    info!(%reference, revision = ?receipt.revision, "Transaction confirmed");
                    return Ok(receipt);
                }
                Ok(Some(receipt)) => {
                    warn!(
                        %reference,
                        reason = receipt.failure_reason().unwrap_or_default(),
                        "Transaction failed"
                    );
                    return Err(ExecutionError::TransactionFailed {
                        receipt: Box::new(receipt),
                    });
                }
                Ok(None) => debug!(%reference, "Receipt pending"),
                Err(SubmitError::Network { message }) => {
                    warn!(%reference, %message, "Receipt poll failed, retrying");
                }
                Err(other) => return Err(other.into()),
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Submit and wait for the terminal receipt
    ///
    /// # Errors
    /// Any error of [`CutExecutor::submit`] or [`CutExecutor::confirm`]
    pub async fn execute(&self, transaction: &UpgradeTransaction) -> Result<Receipt, ExecutionError> {
        let reference = self.submit(transaction).await?;
        self.confirm(reference).await
    }
}

impl std::fmt::Debug for CutExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CutExecutor")
            .field("operator", &self.operator)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}
