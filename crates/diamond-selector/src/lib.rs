//! Diamond Selector
//!
//! Dispatch keys and module identities for facet dispatch tables.
//!
//! # Core Concepts
//!
//! - [`Selector`]: 4-byte Keccak-256 prefix of a canonical signature
//! - [`ModuleAddress`]: 20-byte module identity; [`ModuleAddress::ZERO`] means unowned
//! - [`canonicalize`]: human-written signature to canonical `name(type,...)` form
//! - [`SelectorExtractor`]: module interface to ordered [`SelectorSet`]
//!
//! # Example
//!
//! ```rust
//! use diamond_selector::{ModuleInterface, Selector, SelectorExtractor};
//!
//! let loupe = ModuleInterface::new(
//!     "DiamondLoupeFacet",
//!     ["facets()", "facetAddress(bytes4 _functionSelector)"],
//! );
//! let selectors = SelectorExtractor::new().extract(&loupe).unwrap();
//! assert!(selectors.contains(&Selector::from_u32(0xcdff_acc6)));
//! ```

mod address;
mod encoding;
mod interface;
mod selector;
mod signature;

pub use address::{owner_label, ModuleAddress, ADDRESS_WIDTH};
pub use encoding::HexError;
pub use interface::{ExtractError, ModuleInterface, SelectorExtractor, SelectorSet};
pub use selector::{Selector, SELECTOR_WIDTH};
pub use signature::{canonicalize, InterfaceParseError, ParseReason};

/// Commonly used items
pub mod prelude {
    pub use crate::{ModuleAddress, ModuleInterface, Selector, SelectorExtractor, SelectorSet};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
