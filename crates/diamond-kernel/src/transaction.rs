//! Upgrade transactions and receipts

use diamond_cut::CutPlan;
use diamond_selector::ModuleAddress;
use diamond_table::FacetCut;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use ulid::Ulid;

/// Idempotency key of an upgrade transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(Ulid);

impl TransactionId {
    /// Generate a fresh id
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Underlying ULID
    #[inline]
    #[must_use]
    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for TransactionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "tx-{}", self.0)
    }
}

impl FromStr for TransactionId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s.strip_prefix("tx-").unwrap_or(s)).map(Self)
    }
}

/// Opaque reference returned by a [`CutAuthority`](crate::CutAuthority)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxReference(Ulid);

impl TxReference {
    /// Generate a fresh reference
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for TxReference {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for TxReference {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "ref-{}", self.0)
    }
}

/// Identity of a party submitting cuts
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperatorId(String);

impl OperatorId {
    /// Create an operator identity
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identity string
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for OperatorId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OperatorId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// One-time initializer call run after all cuts of a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitCall {
    /// Module whose initializer runs
    pub target: ModuleAddress,

    /// Opaque call data
    #[serde(with = "calldata_hex")]
    pub calldata: Vec<u8>,
}

impl InitCall {
    /// Create an initializer call
    #[inline]
    #[must_use]
    pub fn new(target: ModuleAddress, calldata: impl Into<Vec<u8>>) -> Self {
        Self {
            target,
            calldata: calldata.into(),
        }
    }
}

mod calldata_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        hex::decode(text.strip_prefix("0x").unwrap_or(&text)).map_err(serde::de::Error::custom)
    }
}

/// Ordered cuts plus an optional initializer, applied as one unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeTransaction {
    /// Idempotency key
    pub id: TransactionId,

    /// Cuts in application order
    pub cuts: Vec<FacetCut>,

    /// Initializer run after every cut succeeded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init: Option<InitCall>,
}

impl UpgradeTransaction {
    /// New transaction with a fresh id
    #[must_use]
    pub fn new(cuts: Vec<FacetCut>) -> Self {
        Self {
            id: TransactionId::new(),
            cuts,
            init: None,
        }
    }

    /// Transaction carrying the cuts of `plan`
    #[must_use]
    pub fn from_plan(plan: &CutPlan) -> Self {
        Self::new(plan.cuts().to_vec())
    }

    /// Attach an initializer call
    #[must_use]
    pub fn with_init(mut self, init: InitCall) -> Self {
        self.init = Some(init);
        self
    }

    /// Reuse an existing id (retries of the same logical transaction)
    #[must_use]
    pub fn with_id(mut self, id: TransactionId) -> Self {
        self.id = id;
        self
    }
}

/// Terminal outcome of a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReceiptStatus {
    /// All cuts and the initializer applied
    Success,
    /// Nothing applied
    Failure {
        /// Why the transaction was rejected
        reason: String,
    },
}

/// Receipt for a submitted transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Reference returned at submission
    pub reference: TxReference,

    /// Transaction the receipt belongs to
    pub transaction_id: TransactionId,

    /// Outcome
    pub status: ReceiptStatus,

    /// Table revision after a successful transaction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<u64>,
}

impl Receipt {
    /// True for a success receipt
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.status, ReceiptStatus::Success)
    }

    /// Failure reason, if any
    #[must_use]
    pub fn failure_reason(&self) -> Option<&str> {
        match &self.status {
            ReceiptStatus::Success => None,
            ReceiptStatus::Failure { reason } => Some(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diamond_selector::Selector;

    #[test]
    fn transaction_id_display_and_parse() {
        let id = TransactionId::new();
        let text = id.to_string();
        assert!(text.starts_with("tx-"));
        assert_eq!(text.parse::<TransactionId>().unwrap(), id);
    }

    #[test]
    fn with_id_keeps_key() {
        let id = TransactionId::new();
        let tx = UpgradeTransaction::new(Vec::new()).with_id(id);
        assert_eq!(tx.id, id);
    }

    #[test]
    fn init_call_serializes_hex() {
        let tx = UpgradeTransaction::new(vec![FacetCut::remove([Selector::from_u32(1)])])
            .with_init(InitCall::new(ModuleAddress::new([1; 20]), vec![0xe1, 0xc7]));
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["init"]["calldata"], "0xe1c7");
        let decoded: UpgradeTransaction = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, tx);
    }

    #[test]
    fn receipt_failure_reason() {
        let receipt = Receipt {
            reference: TxReference::new(),
            transaction_id: TransactionId::new(),
            status: ReceiptStatus::Failure {
                reason: "reverted".into(),
            },
            revision: None,
        };
        assert!(!receipt.is_success());
        assert_eq!(receipt.failure_reason(), Some("reverted"));
    }
}
