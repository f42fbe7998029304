//! Upgrade requests and reports

use diamond_cut::CutPlan;
use diamond_kernel::{TransactionId, TxReference, UpgradeState};
use diamond_selector::{ModuleAddress, ModuleInterface, Selector};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// How a requested module obtains its address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Deployment {
    /// Deploy fresh code through the configured deployer
    Deploy {
        /// Constructor arguments
        #[serde(default)]
        constructor_args: Vec<u8>,
    },
    /// Already deployed at this address
    At(ModuleAddress),
    /// Latest address recorded in the address book
    Recorded,
}

/// Which module a requested module replaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Supersedes {
    /// A specific address
    At(ModuleAddress),
    /// Whatever the address book recorded last under the same name
    PreviousVersion,
}

/// One module the upgrade should route to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRequest {
    /// Declared interface
    pub interface: ModuleInterface,
    /// Address source
    pub deployment: Deployment,
    /// Replaced modules
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supersedes: Vec<Supersedes>,
}

impl ModuleRequest {
    /// Deploy `interface` with no constructor arguments
    #[must_use]
    pub fn deploy(interface: ModuleInterface) -> Self {
        Self {
            interface,
            deployment: Deployment::Deploy {
                constructor_args: Vec::new(),
            },
            supersedes: Vec::new(),
        }
    }

    /// Route to an existing deployment
    #[must_use]
    pub fn at(interface: ModuleInterface, address: ModuleAddress) -> Self {
        Self {
            interface,
            deployment: Deployment::At(address),
            supersedes: Vec::new(),
        }
    }

    /// Route to the address book's latest deployment of this module
    #[must_use]
    pub fn recorded(interface: ModuleInterface) -> Self {
        Self {
            interface,
            deployment: Deployment::Recorded,
            supersedes: Vec::new(),
        }
    }

    /// Set constructor arguments (switches to a fresh deployment)
    #[must_use]
    pub fn with_constructor_args(mut self, args: impl Into<Vec<u8>>) -> Self {
        self.deployment = Deployment::Deploy {
            constructor_args: args.into(),
        };
        self
    }

    /// Replace the module at `address`
    #[must_use]
    pub fn superseding(mut self, address: ModuleAddress) -> Self {
        self.supersedes.push(Supersedes::At(address));
        self
    }

    /// Replace the previously recorded version of this module
    #[must_use]
    pub fn superseding_previous(mut self) -> Self {
        self.supersedes.push(Supersedes::PreviousVersion);
        self
    }
}

/// One-time initializer run with the cuts
///
/// The initializer module is deployed or located like any other module but
/// never routed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitRequest {
    /// Initializer interface
    pub interface: ModuleInterface,
    /// Address source
    pub deployment: Deployment,
    /// Call data
    #[serde(default)]
    pub calldata: Vec<u8>,
}

impl InitRequest {
    /// Deploy an initializer and call it with `calldata`
    #[must_use]
    pub fn deploy(interface: ModuleInterface, calldata: impl Into<Vec<u8>>) -> Self {
        Self {
            interface,
            deployment: Deployment::Deploy {
                constructor_args: Vec::new(),
            },
            calldata: calldata.into(),
        }
    }

    /// Call an initializer already deployed at `address`
    #[must_use]
    pub fn at(interface: ModuleInterface, address: ModuleAddress, calldata: impl Into<Vec<u8>>) -> Self {
        Self {
            interface,
            deployment: Deployment::At(address),
            calldata: calldata.into(),
        }
    }
}

/// Everything one upgrade run should achieve
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeRequest {
    /// Modules to route to
    #[serde(default)]
    pub modules: Vec<ModuleRequest>,
    /// Selectors to unroute
    #[serde(default)]
    pub purge: Vec<Selector>,
    /// Unroute every unprotected selector not claimed by `modules`
    #[serde(default)]
    pub purge_all: bool,
    /// Initializer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init: Option<InitRequest>,
}

impl UpgradeRequest {
    /// Empty request
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module
    #[must_use]
    pub fn with_module(mut self, module: ModuleRequest) -> Self {
        self.modules.push(module);
        self
    }

    /// Unroute selectors
    #[must_use]
    pub fn with_purge(mut self, selectors: impl IntoIterator<Item = Selector>) -> Self {
        self.purge.extend(selectors);
        self
    }

    /// Unroute everything unprotected that no requested module claims
    #[must_use]
    pub fn purging_all(mut self) -> Self {
        self.purge_all = true;
        self
    }

    /// Run an initializer
    #[must_use]
    pub fn with_init(mut self, init: InitRequest) -> Self {
        self.init = Some(init);
        self
    }
}

/// Module that served in a completed upgrade
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedModule {
    /// Module name
    pub name: String,
    /// Address
    pub address: ModuleAddress,
    /// Address book version after recording
    pub version: u32,
}

/// Outcome of a completed upgrade
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeReport {
    /// Transaction id
    pub transaction_id: TransactionId,
    /// Authority reference
    pub reference: TxReference,
    /// Table revision after the upgrade
    pub revision: Option<u64>,
    /// Routed modules
    pub modules: Vec<DeployedModule>,
    /// Every touched selector and its owner afterwards
    pub routes: IndexMap<Selector, Option<ModuleAddress>>,
    /// Executed plan
    pub plan: CutPlan,
    /// States visited, in order
    pub history: Vec<UpgradeState>,
    /// Non-fatal problems
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl UpgradeReport {
    /// Address a module name was routed to
    #[must_use]
    pub fn address_of(&self, name: &str) -> Option<ModuleAddress> {
        self.modules
            .iter()
            .find(|module| module.name == name)
            .map(|module| module.address)
    }
}
