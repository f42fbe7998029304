//! Module deployment

use async_trait::async_trait;
use diamond_selector::{ModuleAddress, ModuleInterface};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Deployment failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to deploy {module}: {reason}")]
pub struct DeployError {
    /// Module name
    pub module: String,
    /// Failure detail
    pub reason: String,
}

impl DeployError {
    /// Create a deployment failure
    #[inline]
    #[must_use]
    pub fn new(module: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            reason: reason.into(),
        }
    }
}

/// Places module code somewhere addressable
#[async_trait]
pub trait ModuleDeployer: Send + Sync {
    /// Deploy a module and return its address
    async fn deploy(
        &self,
        interface: &ModuleInterface,
        constructor_args: &[u8],
    ) -> Result<ModuleAddress, DeployError>;
}

/// Deterministic in-process deployer
///
/// Addresses are derived from the deployer seed, a nonce and the module
/// name, so two runs with the same seed produce the same addresses.
#[derive(Debug)]
pub struct LocalDeployer {
    seed: Vec<u8>,
    nonce: AtomicU64,
}

impl LocalDeployer {
    /// Deployer with the given seed
    #[must_use]
    pub fn new(seed: impl Into<Vec<u8>>) -> Self {
        Self {
            seed: seed.into(),
            nonce: AtomicU64::new(0),
        }
    }

    /// Deployments made so far
    #[must_use]
    pub fn deployments(&self) -> u64 {
        self.nonce.load(Ordering::SeqCst)
    }
}

impl Default for LocalDeployer {
    fn default() -> Self {
        Self::new(b"local".to_vec())
    }
}

#[async_trait]
impl ModuleDeployer for LocalDeployer {
    async fn deploy(
        &self,
        interface: &ModuleInterface,
        constructor_args: &[u8],
    ) -> Result<ModuleAddress, DeployError> {
        if interface.name().trim().is_empty() {
            return Err(DeployError::new("<unnamed>", "module name is empty"));
        }
        let nonce = self.nonce.fetch_add(1, Ordering::SeqCst);

        let mut seed = self.seed.clone();
        seed.extend_from_slice(&nonce.to_be_bytes());
        seed.extend_from_slice(interface.name().as_bytes());
        seed.extend_from_slice(constructor_args);
        let address = ModuleAddress::derive(&seed);

        debug!(module = interface.name(), %address, nonce, "Deployed module");
        Ok(address)
    }
}
