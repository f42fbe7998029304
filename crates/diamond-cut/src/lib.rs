//! Diamond Cut
//!
//! Plans the minimal set of cuts that takes a dispatch table from its
//! current routing to a desired [`UpgradeTarget`].
//!
//! # Example
//!
//! ```rust
//! use diamond_cut::{CutPlanner, TargetModule, UpgradeTarget};
//! use diamond_selector::{ModuleAddress, ModuleInterface};
//! use diamond_table::{CutAction, TableSnapshot};
//!
//! let loupe = ModuleInterface::new("DiamondLoupeFacet", ["facets()", "facetAddresses()"]);
//! let target = UpgradeTarget::new()
//!     .with_module(TargetModule::from_interface(ModuleAddress::new([1; 20]), loupe));
//!
//! let plan = CutPlanner::new().plan(&TableSnapshot::default(), &target).unwrap();
//! assert_eq!(plan.cuts().len(), 1);
//! assert_eq!(plan.cuts()[0].action, CutAction::Add);
//! ```

mod collision;
mod error;
mod plan;
mod planner;
mod target;

pub use collision::Claimant;
pub use error::PlanError;
pub use plan::CutPlan;
pub use planner::CutPlanner;
pub use target::{SelectorSource, TargetModule, UpgradeTarget};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
