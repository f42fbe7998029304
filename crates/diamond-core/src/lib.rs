//! Diamond Core - upgrade orchestration
//!
//! Ties selector extraction, cut planning, execution and verification into
//! one audited upgrade run:
//! - Deploys or locates modules and records them in a versioned [`AddressBook`]
//! - Plans against the live table and submits through a [`CutAuthority`](diamond_kernel::CutAuthority)
//! - Verifies the result and writes an audit record for every outcome
//!
//! # Example
//!
//! ```rust,ignore
//! use diamond_core::prelude::*;
//! use diamond_kernel::{LocalAuthority, OperatorId};
//! use diamond_table::DispatchTable;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let authority = Arc::new(LocalAuthority::new(Arc::new(DispatchTable::new()), OperatorId::new("owner")));
//! let orchestrator = UpgradeOrchestrator::new(UpgradeConfig::new(), authority, Arc::new(LocalDeployer::default()))?;
//!
//! let loupe = ModuleInterface::new("DiamondLoupeFacet", ["facets()", "facetAddresses()"]);
//! let report = orchestrator
//!     .run(UpgradeRequest::new().with_module(ModuleRequest::deploy(loupe)))
//!     .await?;
//! println!("{} selectors routed", report.routes.len());
//! # Ok(())
//! # }
//! ```

pub mod address_book;
pub mod config;
pub mod deployer;
pub mod error;
pub mod fixtures;
pub mod orchestrator;
pub mod types;

pub use address_book::{AddressBook, AddressBookError, DeploymentRecord};
pub use config::{
    ConfigError, ConfirmationPolicy, NetworkConfig, RetryPolicy, UpgradeConfig,
    DEFAULT_EXCLUDED_SIGNATURES, DEFAULT_PROTECTED_SIGNATURES,
};
pub use deployer::{DeployError, LocalDeployer, ModuleDeployer};
pub use error::{UpgradeError, UpgradeErrorKind};
pub use orchestrator::{AbortHandle, UpgradeOrchestrator};
pub use types::{
    DeployedModule, Deployment, InitRequest, ModuleRequest, Supersedes, UpgradeReport,
    UpgradeRequest,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for running upgrades
    pub use crate::{
        AddressBook, LocalDeployer, ModuleDeployer, ModuleRequest, UpgradeConfig, UpgradeError,
        UpgradeOrchestrator, UpgradeReport, UpgradeRequest,
    };
    pub use diamond_selector::{ModuleAddress, ModuleInterface, Selector};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
