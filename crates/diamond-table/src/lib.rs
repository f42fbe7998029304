//! Diamond Table
//!
//! Selector routing for facet dispatch.
//!
//! # Core Concepts
//!
//! - [`Module`]: immutable deployed implementation with its selector set
//! - [`FacetCut`]: one [`CutAction`] applied to a group of selectors
//! - [`DispatchTable`]: shared selector to module map with atomic transactions
//! - [`TableSnapshot`]: point-in-time copy used for planning and verification
//!
//! Every selector has at most one owner at every observable instant.

mod cut;
mod module;
mod table;

pub use cut::{CutAction, FacetCut};
pub use module::Module;
pub use table::{CutError, DispatchTable, StagedTable, TableReader, TableSnapshot};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
