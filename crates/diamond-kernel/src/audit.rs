//! Append-only audit log
//!
//! Records are hash-chained with SHA-256: each record stores the hash of
//! its predecessor, so any edit breaks [`AuditLog::verify_integrity`].
//! A log may be mirrored to a JSON-lines file; reopening the file resumes
//! the chain.

use crate::error::AuditError;
use crate::transaction::{Receipt, TransactionId, TxReference};
use chrono::{DateTime, Utc};
use diamond_cut::CutPlan;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

const GENESIS: [u8; 32] = [0u8; 32];

/// Terminal outcome recorded for one upgrade
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AuditOutcome {
    /// Upgrade reached `Complete`
    Complete,
    /// Upgrade reached `Failed`
    Failed {
        /// Stage the failure happened in
        stage: String,
        /// Error message
        error: String,
    },
}

/// Data supplied when appending a record
#[derive(Debug, Clone, Default)]
pub struct AuditEntry {
    /// Transaction, if one was built
    pub transaction_id: Option<TransactionId>,
    /// Authority reference, if the transaction was submitted
    pub reference: Option<TxReference>,
    /// Plan, if one was computed
    pub plan: Option<CutPlan>,
    /// Receipt, if one was observed
    pub receipt: Option<Receipt>,
}

/// One chained audit record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Position in the log, starting at 0
    pub sequence: u64,
    /// Append time
    pub timestamp: DateTime<Utc>,
    /// Transaction id
    pub transaction_id: Option<TransactionId>,
    /// Authority reference
    pub reference: Option<TxReference>,
    /// Cut plan
    pub plan: Option<CutPlan>,
    /// Receipt
    pub receipt: Option<Receipt>,
    /// Outcome
    #[serde(flatten)]
    pub outcome: AuditOutcome,
    /// Hex hash of the previous record
    pub prev_hash: String,
    /// Hex hash of this record
    pub hash: String,
}

/// Hash-chained audit log
#[derive(Debug, Default)]
pub struct AuditLog {
    records: Mutex<Vec<AuditRecord>>,
    mirror: Option<Mutex<File>>,
    path: Option<PathBuf>,
}

impl AuditLog {
    /// In-memory log
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Log mirrored to a JSON-lines file
    ///
    /// Existing records are loaded and their chain verified.
    ///
    /// # Errors
    /// - [`AuditError::Io`] if the file cannot be opened
    /// - [`AuditError::Encoding`] if a line is not a record
    /// - [`AuditError::IntegrityViolation`] if the stored chain is broken
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref();
        let mut records = Vec::new();

        if path.is_file() {
            let reader = BufReader::new(File::open(path)?);
            for line in reader.lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                records.push(serde_json::from_str::<AuditRecord>(&line)?);
            }
            verify_chain(&records)?;
        } else if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            records: Mutex::new(records),
            mirror: Some(Mutex::new(file)),
            path: Some(path.to_path_buf()),
        })
    }

    /// Mirror file path, if any
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append a record and return its sequence number
    ///
    /// # Errors
    /// Returns [`AuditError`] if the record cannot be encoded or mirrored;
    /// the in-memory chain is left unchanged in that case.
    pub fn append(&self, entry: AuditEntry, outcome: AuditOutcome) -> Result<u64, AuditError> {
        let mut records = self.records.lock();
        let prev_hash = records
            .last()
            .map_or_else(|| hex::encode(GENESIS), |r| r.hash.clone());

        let mut record = AuditRecord {
            sequence: records.len() as u64,
            timestamp: Utc::now(),
            transaction_id: entry.transaction_id,
            reference: entry.reference,
            plan: entry.plan,
            receipt: entry.receipt,
            outcome,
            prev_hash,
            hash: String::new(),
        };
        record.hash = compute_hash(&record)?;

        if let Some(mirror) = &self.mirror {
            let mut line = serde_json::to_vec(&record)?;
            line.push(b'\n');
            write_line(&mut *mirror.lock(), &line)?;
        }

        let sequence = record.sequence;
        records.push(record);
        Ok(sequence)
    }

    /// Copy of all records
    #[must_use]
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().clone()
    }

    /// Number of records
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// True if nothing was recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Check the hash chain
    ///
    /// # Errors
    /// Returns [`AuditError::IntegrityViolation`] at the first bad record
    pub fn verify_integrity(&self) -> Result<(), AuditError> {
        verify_chain(&self.records.lock())
    }
}

/// Append-only sink that can be cut back to an earlier length
trait Mirror: Write {
    fn len(&self) -> std::io::Result<u64>;
    fn truncate(&mut self, len: u64) -> std::io::Result<()>;
}

impl Mirror for File {
    fn len(&self) -> std::io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn truncate(&mut self, len: u64) -> std::io::Result<()> {
        self.set_len(len)
    }
}

/// Write one whole line or nothing
fn write_line<M: Mirror>(mirror: &mut M, line: &[u8]) -> Result<(), AuditError> {
    let len = mirror.len()?;
    if let Err(err) = mirror.write_all(line).and_then(|()| mirror.flush()) {
        if let Err(truncate_err) = mirror.truncate(len) {
            tracing::error!(error = %truncate_err, "Failed to roll back torn audit line");
        }
        return Err(err.into());
    }
    Ok(())
}

fn verify_chain(records: &[AuditRecord]) -> Result<(), AuditError> {
    let mut prev = hex::encode(GENESIS);
    for (index, record) in records.iter().enumerate() {
        let violation = AuditError::IntegrityViolation {
            sequence: record.sequence,
        };
        if record.sequence != index as u64 || record.prev_hash != prev {
            return Err(violation);
        }
        if record.hash != compute_hash(record)? {
            return Err(violation);
        }
        prev.clone_from(&record.hash);
    }
    Ok(())
}

fn compute_hash(record: &AuditRecord) -> Result<String, AuditError> {
    let mut hasher = Sha256::new();
    hasher.update(record.sequence.to_le_bytes());
    hasher.update(record.timestamp.to_rfc3339().as_bytes());
    hasher.update([0]);
    hasher.update(serde_json::to_vec(&record.transaction_id)?);
    hasher.update([0]);
    hasher.update(serde_json::to_vec(&record.reference)?);
    hasher.update([0]);
    hasher.update(serde_json::to_vec(&record.plan)?);
    hasher.update([0]);
    hasher.update(serde_json::to_vec(&record.receipt)?);
    hasher.update([0]);
    hasher.update(serde_json::to_vec(&record.outcome)?);
    hasher.update([0]);
    hasher.update(record.prev_hash.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(stage: &str) -> AuditOutcome {
        AuditOutcome::Failed {
            stage: stage.to_string(),
            error: "boom".to_string(),
        }
    }

    #[test]
    fn chain_links_records() {
        let log = AuditLog::new();
        log.append(AuditEntry::default(), AuditOutcome::Complete).unwrap();
        log.append(AuditEntry::default(), failed("planned")).unwrap();

        let records = log.records();
        assert_eq!(records[0].prev_hash, hex::encode(GENESIS));
        assert_eq!(records[1].prev_hash, records[0].hash);
        log.verify_integrity().unwrap();
    }

    /// Accepts `budget` bytes, then fails mid-write
    struct ShortWriter {
        bytes: Vec<u8>,
        budget: usize,
    }

    impl Write for ShortWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.budget == 0 {
                return Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"));
            }
            let n = buf.len().min(self.budget);
            self.bytes.extend_from_slice(&buf[..n]);
            self.budget -= n;
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Mirror for ShortWriter {
        fn len(&self) -> std::io::Result<u64> {
            Ok(self.bytes.len() as u64)
        }

        fn truncate(&mut self, len: u64) -> std::io::Result<()> {
            self.bytes.truncate(len as usize);
            Ok(())
        }
    }

    #[test]
    fn failed_write_leaves_no_torn_line() {
        let mut mirror = ShortWriter {
            bytes: b"{\"sequence\":0}\n".to_vec(),
            budget: 5,
        };
        let before = mirror.bytes.clone();

        let result = write_line(&mut mirror, b"{\"sequence\":1}\n");
        assert!(matches!(result, Err(AuditError::Io(_))));
        assert_eq!(mirror.bytes, before);

        mirror.budget = usize::MAX;
        write_line(&mut mirror, b"{\"sequence\":1}\n").unwrap();
        assert_eq!(mirror.bytes.split(|b| *b == b'\n').filter(|l| !l.is_empty()).count(), 2);
    }

    #[test]
    fn tampering_is_detected() {
        let log = AuditLog::new();
        log.append(AuditEntry::default(), AuditOutcome::Complete).unwrap();
        log.append(AuditEntry::default(), AuditOutcome::Complete).unwrap();

        log.records.lock()[0].outcome = failed("verified");
        assert!(matches!(
            log.verify_integrity(),
            Err(AuditError::IntegrityViolation { sequence: 0 })
        ));
    }
}
