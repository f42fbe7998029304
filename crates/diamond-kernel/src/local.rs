//! In-process cut authority
//!
//! [`LocalAuthority`] owns a [`DispatchTable`] directly. Transactions are
//! applied synchronously at submission, so receipts are available at once.

use crate::authority::{CutAuthority, Initializer};
use crate::error::{InitError, SubmitError};
use crate::transaction::{
    OperatorId, Receipt, ReceiptStatus, TransactionId, TxReference, UpgradeTransaction,
};
use async_trait::async_trait;
use diamond_selector::ModuleAddress;
use diamond_table::{CutError, DispatchTable, TableSnapshot};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Why a transaction was rejected while staging
#[derive(Debug, thiserror::Error)]
enum ApplyError {
    #[error("cut {index} rejected: {source}")]
    Cut {
        index: usize,
        #[source]
        source: CutError,
    },

    #[error("no initializer registered for {target}")]
    MissingInitializer { target: ModuleAddress },

    #[error(transparent)]
    Init(#[from] InitError),
}

#[derive(Debug, Default)]
struct Ledger {
    submitted: HashMap<TransactionId, TxReference>,
    receipts: HashMap<TxReference, Receipt>,
}

/// Dispatch table owner with an operator allowlist
pub struct LocalAuthority {
    table: Arc<DispatchTable>,
    owner: OperatorId,
    operators: RwLock<HashSet<OperatorId>>,
    initializers: RwLock<HashMap<ModuleAddress, Arc<dyn Initializer>>>,
    ledger: Mutex<Ledger>,
}

impl LocalAuthority {
    /// Authority over `table`, administered by `owner`
    #[must_use]
    pub fn new(table: Arc<DispatchTable>, owner: OperatorId) -> Self {
        Self {
            table,
            owner,
            operators: RwLock::new(HashSet::new()),
            initializers: RwLock::new(HashMap::new()),
            ledger: Mutex::new(Ledger::default()),
        }
    }

    /// The governed table
    #[inline]
    #[must_use]
    pub fn table(&self) -> &Arc<DispatchTable> {
        &self.table
    }

    /// Table owner
    #[inline]
    #[must_use]
    pub fn owner(&self) -> &OperatorId {
        &self.owner
    }

    /// True if `operator` may submit cuts
    #[must_use]
    pub fn is_authorized(&self, operator: &OperatorId) -> bool {
        *operator == self.owner || self.operators.read().contains(operator)
    }

    /// Allow `operator` to submit cuts
    ///
    /// # Errors
    /// Returns [`SubmitError::Unauthorized`] unless `caller` is the owner
    pub fn add_operator(&self, caller: &OperatorId, operator: OperatorId) -> Result<(), SubmitError> {
        self.require_owner(caller)?;
        info!(%operator, "Operator added");
        self.operators.write().insert(operator);
        Ok(())
    }

    /// Revoke `operator`
    ///
    /// The owner cannot be revoked.
    ///
    /// # Errors
    /// Returns [`SubmitError::Unauthorized`] unless `caller` is the owner
    pub fn remove_operator(&self, caller: &OperatorId, operator: &OperatorId) -> Result<bool, SubmitError> {
        self.require_owner(caller)?;
        let removed = self.operators.write().remove(operator);
        if removed {
            info!(%operator, "Operator removed");
        }
        Ok(removed)
    }

    /// Register the initializer invoked for [`InitCall`](crate::InitCall)s targeting `module`
    pub fn register_initializer(&self, module: ModuleAddress, initializer: Arc<dyn Initializer>) {
        self.initializers.write().insert(module, initializer);
    }

    fn require_owner(&self, caller: &OperatorId) -> Result<(), SubmitError> {
        if *caller == self.owner {
            Ok(())
        } else {
            Err(SubmitError::Unauthorized {
                operator: caller.clone(),
            })
        }
    }

    /// Stage, initialize and publish; returns the reference of the stored receipt
    fn apply(&self, transaction: &UpgradeTransaction) -> TxReference {
        let mut ledger = self.ledger.lock();
        if let Some(reference) = ledger.submitted.get(&transaction.id) {
            debug!(transaction = %transaction.id, %reference, "Duplicate submission, returning original reference");
            return *reference;
        }

        let initializer = transaction
            .init
            .as_ref()
            .map(|init| (init, self.initializers.read().get(&init.target).cloned()));

        let outcome = self.table.transact(|staged| {
            for (index, cut) in transaction.cuts.iter().enumerate() {
                staged
                    .apply_cut(cut)
                    .map_err(|source| ApplyError::Cut { index, source })?;
            }
            if let Some((init, registered)) = &initializer {
                let run = registered
                    .as_ref()
                    .ok_or(ApplyError::MissingInitializer { target: init.target })?;
                run.initialize(staged, &init.calldata)?;
            }
            Ok::<(), ApplyError>(())
        });

        let reference = TxReference::new();
        let receipt = match outcome {
            Ok(()) => {
                let revision = self.table.revision();
                info!(
                    transaction = %transaction.id,
                    %reference,
                    cuts = transaction.cuts.len(),
                    revision,
                    "Cut applied"
                );
                Receipt {
                    reference,
                    transaction_id: transaction.id,
                    status: ReceiptStatus::Success,
                    revision: Some(revision),
                }
            }
            Err(err) => {
                warn!(transaction = %transaction.id, %reference, error = %err, "Cut rejected");
                Receipt {
                    reference,
                    transaction_id: transaction.id,
                    status: ReceiptStatus::Failure {
                        reason: err.to_string(),
                    },
                    revision: None,
                }
            }
        };

        ledger.submitted.insert(transaction.id, reference);
        ledger.receipts.insert(reference, receipt);
        reference
    }
}

impl std::fmt::Debug for LocalAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalAuthority")
            .field("owner", &self.owner)
            .field("operators", &self.operators.read().len())
            .field("initializers", &self.initializers.read().len())
            .field("revision", &self.table.revision())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl CutAuthority for LocalAuthority {
    async fn submit(
        &self,
        operator: &OperatorId,
        transaction: &UpgradeTransaction,
    ) -> Result<TxReference, SubmitError> {
        if !self.is_authorized(operator) {
            warn!(%operator, transaction = %transaction.id, "Unauthorized cut rejected");
            return Err(SubmitError::Unauthorized {
                operator: operator.clone(),
            });
        }
        Ok(self.apply(transaction))
    }

    async fn receipt(&self, reference: TxReference) -> Result<Option<Receipt>, SubmitError> {
        self.ledger
            .lock()
            .receipts
            .get(&reference)
            .cloned()
            .map(Some)
            .ok_or(SubmitError::UnknownReference { reference })
    }

    async fn snapshot(&self) -> Result<TableSnapshot, SubmitError> {
        Ok(self.table.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::InitCall;
    use diamond_selector::Selector;
    use diamond_table::{FacetCut, TableReader};

    fn addr(n: u8) -> ModuleAddress {
        ModuleAddress::new([n; 20])
    }

    fn authority() -> LocalAuthority {
        LocalAuthority::new(Arc::new(DispatchTable::new()), OperatorId::new("owner"))
    }

    #[tokio::test]
    async fn owner_is_always_authorized() {
        let authority = authority();
        let tx = UpgradeTransaction::new(vec![FacetCut::add(addr(1), [Selector::from_u32(1)])]);
        let reference = authority.submit(&OperatorId::new("owner"), &tx).await.unwrap();
        let receipt = authority.receipt(reference).await.unwrap().unwrap();
        assert!(receipt.is_success());
        assert_eq!(receipt.revision, Some(1));
    }

    #[tokio::test]
    async fn allowlist_is_owner_administered() {
        let authority = authority();
        let owner = OperatorId::new("owner");
        let ops = OperatorId::new("ops");

        assert!(authority.add_operator(&ops, ops.clone()).is_err());
        authority.add_operator(&owner, ops.clone()).unwrap();
        assert!(authority.is_authorized(&ops));

        assert!(authority.remove_operator(&owner, &ops).unwrap());
        assert!(!authority.is_authorized(&ops));

        let tx = UpgradeTransaction::new(vec![FacetCut::add(addr(1), [Selector::from_u32(1)])]);
        assert_eq!(
            authority.submit(&ops, &tx).await,
            Err(SubmitError::Unauthorized { operator: ops })
        );
        assert!(authority.table().is_empty());
    }

    #[tokio::test]
    async fn missing_initializer_fails_transaction() {
        let authority = authority();
        let tx = UpgradeTransaction::new(vec![FacetCut::add(addr(1), [Selector::from_u32(1)])])
            .with_init(InitCall::new(addr(1), Vec::new()));
        let reference = authority.submit(&OperatorId::new("owner"), &tx).await.unwrap();
        let receipt = authority.receipt(reference).await.unwrap().unwrap();
        assert!(receipt.failure_reason().unwrap().contains("no initializer"));
        assert_eq!(authority.table().resolve(Selector::from_u32(1)), None);
    }

    #[tokio::test]
    async fn initializer_sees_staged_cuts() {
        let authority = authority();
        let selector = Selector::from_u32(0xe1c7_392a);
        authority.register_initializer(
            addr(1),
            Arc::new(move |staged: &diamond_table::StagedTable, calldata: &[u8]| {
                if staged.resolve(selector) == Some(addr(1)) && calldata == [1] {
                    Ok(())
                } else {
                    Err(InitError::new("cuts not staged"))
                }
            }),
        );
        let tx = UpgradeTransaction::new(vec![FacetCut::add(addr(1), [selector])])
            .with_init(InitCall::new(addr(1), vec![1]));
        let reference = authority.submit(&OperatorId::new("owner"), &tx).await.unwrap();
        assert!(authority.receipt(reference).await.unwrap().unwrap().is_success());
    }

    #[tokio::test]
    async fn unknown_reference() {
        let authority = authority();
        let reference = TxReference::new();
        assert_eq!(
            authority.receipt(reference).await,
            Err(SubmitError::UnknownReference { reference })
        );
    }
}
