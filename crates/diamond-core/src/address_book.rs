//! Deployment address book
//!
//! Versioned record of where each module was deployed, keyed by network
//! and module name, persisted as JSON.

use chrono::{DateTime, Utc};
use diamond_kernel::TransactionId;
use diamond_selector::ModuleAddress;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Address book errors
#[derive(Debug, thiserror::Error)]
pub enum AddressBookError {
    /// File could not be read or written
    #[error("address book I/O error at {path}: {source}")]
    Io {
        /// Book path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// File is not a valid address book
    #[error("address book encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// One deployment of a module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    /// Deployed address
    pub address: ModuleAddress,
    /// 1 for the first recorded deployment
    pub version: u32,
    /// When the record was written
    pub recorded_at: DateTime<Utc>,
    /// Upgrade that put this version in service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction: Option<TransactionId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct Book {
    networks: BTreeMap<String, BTreeMap<String, Vec<DeploymentRecord>>>,
}

/// Versioned deployment records
#[derive(Debug, Clone, Default)]
pub struct AddressBook {
    book: Book,
    path: Option<PathBuf>,
}

impl AddressBook {
    /// Empty in-memory book
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Book backed by `path`; empty if the file does not exist yet
    ///
    /// # Errors
    /// Returns [`AddressBookError`] if the file exists but cannot be read
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AddressBookError> {
        let path = path.as_ref();
        let book = if path.exists() {
            let text = std::fs::read_to_string(path).map_err(|source| AddressBookError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            serde_json::from_str(&text)?
        } else {
            Book::default()
        };
        Ok(Self {
            book,
            path: Some(path.to_path_buf()),
        })
    }

    /// Backing file, if any
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Latest record of `module` on `network`
    #[must_use]
    pub fn latest(&self, network: &str, module: &str) -> Option<&DeploymentRecord> {
        self.history(network, module).last()
    }

    /// Every record of `module` on `network`, oldest first
    #[must_use]
    pub fn history(&self, network: &str, module: &str) -> &[DeploymentRecord] {
        self.book
            .networks
            .get(network)
            .and_then(|modules| modules.get(module))
            .map_or(&[], Vec::as_slice)
    }

    /// Module names recorded on `network`
    pub fn modules(&self, network: &str) -> impl Iterator<Item = &str> + '_ {
        self.book
            .networks
            .get(network)
            .into_iter()
            .flat_map(|modules| modules.keys().map(String::as_str))
    }

    /// Record a deployment; returns the version in effect afterwards
    ///
    /// Re-recording the latest address keeps its version.
    pub fn record(
        &mut self,
        network: &str,
        module: &str,
        address: ModuleAddress,
        transaction: Option<TransactionId>,
    ) -> u32 {
        let history = self
            .book
            .networks
            .entry(network.to_string())
            .or_default()
            .entry(module.to_string())
            .or_default();

        if let Some(latest) = history.last() {
            if latest.address == address {
                return latest.version;
            }
        }

        let version = history.last().map_or(1, |latest| latest.version + 1);
        history.push(DeploymentRecord {
            address,
            version,
            recorded_at: Utc::now(),
            transaction,
        });
        debug!(network, module, %address, version, "Recorded deployment");
        version
    }

    /// Write the book to its file, if it has one
    ///
    /// Writes a sibling temporary file and renames it over the target.
    ///
    /// # Errors
    /// Returns [`AddressBookError`] if encoding or writing fails
    pub fn save(&self) -> Result<(), AddressBookError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let io = |source| AddressBookError::Io {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io)?;
        }
        let text = serde_json::to_string_pretty(&self.book)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, text).map_err(io)?;
        std::fs::rename(&tmp, path).map_err(io)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_increase_per_new_address() {
        let mut book = AddressBook::new();
        let v1 = ModuleAddress::new([1; 20]);
        let v2 = ModuleAddress::new([2; 20]);

        assert_eq!(book.record("localhost", "CharacterFacet", v1, None), 1);
        assert_eq!(book.record("localhost", "CharacterFacet", v1, None), 1);
        assert_eq!(book.record("localhost", "CharacterFacet", v2, None), 2);

        assert_eq!(book.latest("localhost", "CharacterFacet").map(|r| r.address), Some(v2));
        assert_eq!(book.history("localhost", "CharacterFacet").len(), 2);
        assert!(book.latest("mumbai", "CharacterFacet").is_none());
        assert_eq!(book.modules("localhost").collect::<Vec<_>>(), vec!["CharacterFacet"]);
    }

    #[test]
    fn in_memory_save_is_noop() {
        AddressBook::new().save().unwrap();
    }
}
