//! Post-execution verification

use crate::error::{Mismatch, VerificationError};
use crate::transaction::{Receipt, TxReference};
use diamond_cut::CutPlan;
use diamond_table::TableReader;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// Summary of a successful verification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    /// Verified transaction
    pub reference: TxReference,
    /// Selectors checked
    pub checked: usize,
}

/// Re-reads the table and checks it against the plan
#[derive(Debug, Clone, Copy, Default)]
pub struct VerificationService;

impl VerificationService {
    /// Create a verification service
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Check every selector `plan` mentions against `table`
    ///
    /// # Errors
    /// - [`VerificationError::NotSuccessful`] if `receipt` is a failure receipt
    /// - [`VerificationError::Mismatch`] listing every differing selector
    pub fn verify<R>(&self, plan: &CutPlan, receipt: &Receipt, table: &R) -> Result<VerificationReport, VerificationError>
    where
        R: TableReader + ?Sized,
    {
        if !receipt.is_success() {
            return Err(VerificationError::NotSuccessful {
                reference: receipt.reference,
            });
        }

        let mismatches: Vec<Mismatch> = plan
            .expectations()
            .filter_map(|(selector, expected)| {
                let actual = table.resolve(selector);
                (actual != expected).then_some(Mismatch {
                    selector,
                    expected,
                    actual,
                })
            })
            .collect();

        if !mismatches.is_empty() {
            let err = VerificationError::Mismatch { mismatches };
            error!(reference = %receipt.reference, error = %err, "Verification failed");
            return Err(err);
        }

        info!(reference = %receipt.reference, checked = plan.touched_count(), "Verification passed");
        Ok(VerificationReport {
            reference: receipt.reference,
            checked: plan.touched_count(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::{ReceiptStatus, TransactionId};
    use diamond_selector::{ModuleAddress, Selector};
    use diamond_table::{FacetCut, TableSnapshot};

    fn success() -> Receipt {
        Receipt {
            reference: TxReference::new(),
            transaction_id: TransactionId::new(),
            status: ReceiptStatus::Success,
            revision: Some(1),
        }
    }

    #[test]
    fn matching_table_passes() {
        let module = ModuleAddress::new([1; 20]);
        let plan = CutPlan::new(vec![FacetCut::add(module, [Selector::from_u32(1)])], 0);
        let table = TableSnapshot::from_routes([(Selector::from_u32(1), module)]);
        let report = VerificationService::new().verify(&plan, &success(), &table).unwrap();
        assert_eq!(report.checked, 1);
    }

    #[test]
    fn every_mismatch_is_listed() {
        let module = ModuleAddress::new([1; 20]);
        let rogue = ModuleAddress::new([9; 20]);
        let plan = CutPlan::new(
            vec![
                FacetCut::add(module, [Selector::from_u32(1), Selector::from_u32(2)]),
                FacetCut::remove([Selector::from_u32(3)]),
            ],
            0,
        );
        let table = TableSnapshot::from_routes([
            (Selector::from_u32(1), module),
            (Selector::from_u32(2), rogue),
            (Selector::from_u32(3), rogue),
        ]);
        let err = VerificationService::new().verify(&plan, &success(), &table).unwrap_err();
        let VerificationError::Mismatch { mismatches } = err else {
            panic!("expected mismatch");
        };
        assert_eq!(
            mismatches,
            vec![
                Mismatch {
                    selector: Selector::from_u32(2),
                    expected: Some(module),
                    actual: Some(rogue)
                },
                Mismatch {
                    selector: Selector::from_u32(3),
                    expected: None,
                    actual: Some(rogue)
                },
            ]
        );
    }

    #[test]
    fn failure_receipt_cannot_be_verified() {
        let mut receipt = success();
        receipt.status = ReceiptStatus::Failure { reason: "x".into() };
        let result = VerificationService::new().verify(&CutPlan::default(), &receipt, &TableSnapshot::default());
        assert!(matches!(result, Err(VerificationError::NotSuccessful { .. })));
    }
}
