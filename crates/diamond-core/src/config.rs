//! Upgrade configuration
//!
//! Loaded from TOML. Every field has a default, so an empty file is valid.
//!
//! ```toml
//! operator = "deployer"
//!
//! [network]
//! name = "mumbai"
//! endpoint_env = "MUMBAI_URL"
//!
//! [retry]
//! max_submission_attempts = 5
//! ```

use diamond_selector::{InterfaceParseError, Selector, SelectorExtractor};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Cut entry point and loupe signatures; never removed by purges
pub const DEFAULT_PROTECTED_SIGNATURES: &[&str] = &[
    "diamondCut((address,uint8,bytes4[])[],address,bytes)",
    "facets()",
    "facetFunctionSelectors(address)",
    "facetAddresses()",
    "facetAddress(bytes4)",
    "supportsInterface(bytes4)",
];

/// Initializer entry points that are never routed
pub const DEFAULT_EXCLUDED_SIGNATURES: &[&str] = &["init(bytes)"];

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("cannot read config {path}: {source}")]
    Io {
        /// Config path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// File is not valid TOML for this schema
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A configured signature is malformed
    #[error("invalid signature in config: {0}")]
    Signature(#[from] InterfaceParseError),

    /// A value is out of range
    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Network the dispatch table lives on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Network name; keys the address book
    pub name: String,

    /// Endpoint URL
    pub endpoint: Option<String>,

    /// Environment variable that overrides `endpoint` when set
    pub endpoint_env: Option<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            name: "localhost".to_string(),
            endpoint: Some("http://127.0.0.1:8545".to_string()),
            endpoint_env: None,
        }
    }
}

impl NetworkConfig {
    /// Effective endpoint: the environment variable if set, else `endpoint`
    #[must_use]
    pub fn resolved_endpoint(&self) -> Option<String> {
        self.endpoint_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|value| !value.is_empty())
            .or_else(|| self.endpoint.clone())
    }
}

/// Receipt polling policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfirmationPolicy {
    /// Pause between receipt polls
    pub poll_interval_ms: u64,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self { poll_interval_ms: 500 }
    }
}

/// Submission retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total submission attempts, including the first
    pub max_submission_attempts: u32,

    /// Pause between attempts
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_submission_attempts: 3,
            backoff_ms: 1_000,
        }
    }
}

/// Everything an upgrade run needs besides the request itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpgradeConfig {
    /// Target network
    pub network: NetworkConfig,

    /// Identity submitting cuts
    pub operator: String,

    /// Receipt polling
    pub confirmation: ConfirmationPolicy,

    /// Submission retries
    pub retry: RetryPolicy,

    /// Signatures no purge or supersede may remove
    pub protected_signatures: Vec<String>,

    /// Signatures never routed even if a module declares them
    pub excluded_signatures: Vec<String>,

    /// Address book file; in-memory if unset
    pub address_book: Option<PathBuf>,

    /// Audit JSON-lines file; in-memory if unset
    pub audit_log: Option<PathBuf>,
}

impl Default for UpgradeConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            operator: "owner".to_string(),
            confirmation: ConfirmationPolicy::default(),
            retry: RetryPolicy::default(),
            protected_signatures: DEFAULT_PROTECTED_SIGNATURES.iter().map(ToString::to_string).collect(),
            excluded_signatures: DEFAULT_EXCLUDED_SIGNATURES.iter().map(ToString::to_string).collect(),
            address_book: None,
            audit_log: None,
        }
    }
}

impl UpgradeConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate TOML
    ///
    /// # Errors
    /// Returns [`ConfigError`] on malformed TOML or invalid values
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the file cannot be read or is invalid
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Check value ranges and signatures
    ///
    /// # Errors
    /// Returns [`ConfigError`] for the first invalid value
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.network.name.trim().is_empty() {
            return Err(ConfigError::Invalid("network.name must not be empty".into()));
        }
        if self.operator.trim().is_empty() {
            return Err(ConfigError::Invalid("operator must not be empty".into()));
        }
        if self.retry.max_submission_attempts == 0 {
            return Err(ConfigError::Invalid(
                "retry.max_submission_attempts must be at least 1".into(),
            ));
        }
        self.protected_selectors()?;
        self.extractor()?;
        Ok(())
    }

    /// With network
    #[inline]
    #[must_use]
    pub fn with_network(mut self, network: NetworkConfig) -> Self {
        self.network = network;
        self
    }

    /// With operator identity
    #[inline]
    #[must_use]
    pub fn with_operator(mut self, operator: impl Into<String>) -> Self {
        self.operator = operator.into();
        self
    }

    /// With receipt poll interval
    #[inline]
    #[must_use]
    pub fn with_poll_interval_ms(mut self, poll_interval_ms: u64) -> Self {
        self.confirmation.poll_interval_ms = poll_interval_ms;
        self
    }

    /// With submission retry policy
    #[inline]
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// With address book file
    #[inline]
    #[must_use]
    pub fn with_address_book(mut self, path: impl Into<PathBuf>) -> Self {
        self.address_book = Some(path.into());
        self
    }

    /// With audit log file
    #[inline]
    #[must_use]
    pub fn with_audit_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.audit_log = Some(path.into());
        self
    }

    /// Receipt poll interval
    #[inline]
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.confirmation.poll_interval_ms)
    }

    /// Pause between submission attempts
    #[inline]
    #[must_use]
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.retry.backoff_ms)
    }

    /// Selectors of the protected signatures
    ///
    /// # Errors
    /// Returns [`ConfigError::Signature`] for a malformed signature
    pub fn protected_selectors(&self) -> Result<Vec<Selector>, ConfigError> {
        self.protected_signatures
            .iter()
            .map(|sig| Selector::from_signature(sig).map_err(ConfigError::from))
            .collect()
    }

    /// Extractor honouring the excluded signatures
    ///
    /// # Errors
    /// Returns [`ConfigError::Signature`] for a malformed signature
    pub fn extractor(&self) -> Result<SelectorExtractor, ConfigError> {
        Ok(SelectorExtractor::excluding(&self.excluded_signatures)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_is_default() {
        assert_eq!(UpgradeConfig::from_toml_str("").unwrap(), UpgradeConfig::default());
    }

    #[test]
    fn parses_partial_toml() {
        let config = UpgradeConfig::from_toml_str(
            r#"
            operator = "deployer"
            address_book = "deployments/addresses.json"

            [network]
            name = "mumbai"
            endpoint_env = "DIAMOND_TEST_UNSET_ENDPOINT"

            [retry]
            max_submission_attempts = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.operator, "deployer");
        assert_eq!(config.network.name, "mumbai");
        assert_eq!(config.retry.max_submission_attempts, 5);
        assert_eq!(config.retry.backoff_ms, 1_000);
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
        assert_eq!(
            config.network.resolved_endpoint().as_deref(),
            Some("http://127.0.0.1:8545")
        );
    }

    #[test]
    fn rejects_zero_attempts() {
        let err = UpgradeConfig::from_toml_str("[retry]\nmax_submission_attempts = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_bad_signature() {
        let err = UpgradeConfig::from_toml_str("protected_signatures = [\"oops(\"]").unwrap_err();
        assert!(matches!(err, ConfigError::Signature(_)));
    }

    #[test]
    fn default_protected_set_contains_cut_entry_point() {
        let selectors = UpgradeConfig::default().protected_selectors().unwrap();
        assert!(selectors.contains(&Selector::from_u32(0x1f93_1c1c)));
        assert!(selectors.contains(&Selector::from_u32(0xcdff_acc6)));
        assert_eq!(selectors.len(), 6);
    }
}
