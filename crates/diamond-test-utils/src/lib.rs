//! Testing utilities for the diamond cut workspace
//!
//! Shared fixtures and authority doubles.

#![allow(missing_docs)]

use async_trait::async_trait;
use diamond_kernel::{
    CutAuthority, LocalAuthority, OperatorId, Receipt, SubmitError, TxReference,
    UpgradeTransaction,
};
use diamond_selector::{ModuleAddress, ModuleInterface, Selector};
use diamond_table::{DispatchTable, FacetCut, TableSnapshot};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const OWNER: &str = "owner";

pub fn addr(n: u8) -> ModuleAddress {
    ModuleAddress::new([n; 20])
}

pub fn sel(n: u32) -> Selector {
    Selector::from_u32(n)
}

pub fn owner() -> OperatorId {
    OperatorId::new(OWNER)
}

pub fn local_authority() -> Arc<LocalAuthority> {
    Arc::new(LocalAuthority::new(Arc::new(DispatchTable::new()), owner()))
}

pub fn seeded_authority(routes: impl IntoIterator<Item = (Selector, ModuleAddress)>) -> Arc<LocalAuthority> {
    let table = DispatchTable::from_snapshot(TableSnapshot::from_routes(routes));
    Arc::new(LocalAuthority::new(Arc::new(table), owner()))
}

/// `count` interfaces named `{prefix}{i}`, each declaring `{prefix}{i}_{j}()` for every `j`
pub fn numbered_interfaces(prefix: &str, count: usize, signatures_each: usize) -> Vec<ModuleInterface> {
    let mut interfaces = Vec::with_capacity(count);
    for i in 0..count {
        let mut signatures = Vec::with_capacity(signatures_each);
        for j in 0..signatures_each {
            signatures.push(format!("{prefix}{i}_{j}()"));
        }
        interfaces.push(ModuleInterface::new(format!("{prefix}{i}"), signatures));
    }
    interfaces
}

pub fn selector_of(signature: &str) -> Selector {
    Selector::from_signature(signature).unwrap()
}

fn take(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// Fails the first `n` submissions with a network error
pub struct FlakyAuthority {
    pub inner: Arc<LocalAuthority>,
    failures: AtomicUsize,
    pub attempts: AtomicUsize,
}

impl FlakyAuthority {
    pub fn new(inner: Arc<LocalAuthority>, failures: usize) -> Self {
        Self {
            inner,
            failures: AtomicUsize::new(failures),
            attempts: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CutAuthority for FlakyAuthority {
    async fn submit(
        &self,
        operator: &OperatorId,
        transaction: &UpgradeTransaction,
    ) -> Result<TxReference, SubmitError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if take(&self.failures) {
            return Err(SubmitError::Network {
                message: "connection reset by peer".into(),
            });
        }
        self.inner.submit(operator, transaction).await
    }

    async fn receipt(&self, reference: TxReference) -> Result<Option<Receipt>, SubmitError> {
        self.inner.receipt(reference).await
    }

    async fn snapshot(&self) -> Result<TableSnapshot, SubmitError> {
        self.inner.snapshot().await
    }
}

/// Applies a rival cut right after the first successful receipt is read
pub struct CompetingAuthority {
    pub inner: Arc<LocalAuthority>,
    rival: Mutex<Option<FacetCut>>,
}

impl CompetingAuthority {
    pub fn new(inner: Arc<LocalAuthority>, rival: FacetCut) -> Self {
        Self {
            inner,
            rival: Mutex::new(Some(rival)),
        }
    }
}

#[async_trait]
impl CutAuthority for CompetingAuthority {
    async fn submit(
        &self,
        operator: &OperatorId,
        transaction: &UpgradeTransaction,
    ) -> Result<TxReference, SubmitError> {
        self.inner.submit(operator, transaction).await
    }

    async fn receipt(&self, reference: TxReference) -> Result<Option<Receipt>, SubmitError> {
        let receipt = self.inner.receipt(reference).await?;
        if receipt.as_ref().is_some_and(Receipt::is_success) {
            let rival = self.rival.lock().take();
            if let Some(cut) = rival {
                self.inner
                    .table()
                    .transact(|staged| staged.apply_cut(&cut))
                    .unwrap();
            }
        }
        Ok(receipt)
    }

    async fn snapshot(&self) -> Result<TableSnapshot, SubmitError> {
        self.inner.snapshot().await
    }
}
