//! Module interfaces and selector extraction
//!
//! A [`ModuleInterface`] is the ordered list of callable signatures a module
//! exposes. [`SelectorExtractor`] turns it into a [`SelectorSet`].

use crate::selector::Selector;
use crate::signature::{canonicalize, InterfaceParseError};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Declared interface of a module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInterface {
    /// Module name (e.g. `CharacterFacet`)
    name: String,

    /// Callable signatures in declaration order
    signatures: Vec<String>,
}

impl ModuleInterface {
    /// Create an interface from a name and its signatures
    #[must_use]
    pub fn new<I, S>(name: impl Into<String>, signatures: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            signatures: signatures.into_iter().map(Into::into).collect(),
        }
    }

    /// Append a signature
    #[must_use]
    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signatures.push(signature.into());
        self
    }

    /// Module name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Signatures in declaration order
    #[inline]
    #[must_use]
    pub fn signatures(&self) -> &[String] {
        &self.signatures
    }
}

/// Ordered, duplicate-free set of selectors
///
/// Iteration order is first-insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectorSet(IndexSet<Selector>);

impl SelectorSet {
    /// Create an empty set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a selector; returns false if it was already present
    #[inline]
    pub fn insert(&mut self, selector: Selector) -> bool {
        self.0.insert(selector)
    }

    /// Membership test
    #[inline]
    #[must_use]
    pub fn contains(&self, selector: &Selector) -> bool {
        self.0.contains(selector)
    }

    /// Number of selectors
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if no selectors
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Selector> + '_ {
        self.0.iter()
    }

    /// Copy into a vector, preserving order
    #[must_use]
    pub fn to_vec(&self) -> Vec<Selector> {
        self.0.iter().copied().collect()
    }
}

impl FromIterator<Selector> for SelectorSet {
    fn from_iter<T: IntoIterator<Item = Selector>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a SelectorSet {
    type Item = &'a Selector;
    type IntoIter = indexmap::set::Iter<'a, Selector>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Errors raised while extracting selectors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    /// A signature could not be canonicalized
    #[error(transparent)]
    Parse(#[from] InterfaceParseError),

    /// Two different signatures hash to the same selector
    #[error("selector {selector} is shared by '{first}' and '{second}'")]
    SignatureCollision {
        /// Colliding selector
        selector: Selector,
        /// First canonical signature
        first: String,
        /// Second canonical signature
        second: String,
    },
}

/// Derives selector sets from module interfaces
///
/// Pure and deterministic: the same interface always yields the same set.
/// Duplicate signatures collapse, order follows first occurrence.
///
/// # Example
/// ```
/// use diamond_selector::{ModuleInterface, SelectorExtractor};
///
/// let interface = ModuleInterface::new("Token", ["transfer(address,uint256)", "totalSupply()"]);
/// let selectors = SelectorExtractor::new().extract(&interface).unwrap();
/// assert_eq!(selectors.len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SelectorExtractor {
    /// Canonical signatures that are never routed (e.g. `init(bytes)`)
    excluded: HashSet<String>,
}

impl SelectorExtractor {
    /// Extractor without exclusions
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Extractor that skips the given signatures
    ///
    /// # Errors
    /// Returns [`InterfaceParseError`] if an excluded signature is malformed
    pub fn excluding<I, S>(signatures: I) -> Result<Self, InterfaceParseError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let excluded = signatures
            .into_iter()
            .map(|sig| canonicalize(sig.as_ref()))
            .collect::<Result<_, _>>()?;
        Ok(Self { excluded })
    }

    /// Extract the selector set of an interface
    ///
    /// # Errors
    /// - [`ExtractError::Parse`] if any signature is malformed
    /// - [`ExtractError::SignatureCollision`] if two distinct signatures
    ///   share a selector
    pub fn extract(&self, interface: &ModuleInterface) -> Result<SelectorSet, ExtractError> {
        self.extract_with_signatures(interface)
            .map(|entries| entries.into_keys().collect())
    }

    /// Extract selectors together with their canonical signatures
    ///
    /// # Errors
    /// Same as [`SelectorExtractor::extract`]
    pub fn extract_with_signatures(
        &self,
        interface: &ModuleInterface,
    ) -> Result<IndexMap<Selector, String>, ExtractError> {
        let mut entries: IndexMap<Selector, String> = IndexMap::new();

        for signature in interface.signatures() {
            let canonical = canonicalize(signature)?;
            if self.excluded.contains(&canonical) {
                continue;
            }

            let selector = Selector::from_canonical(&canonical);
            match entries.get(&selector) {
                Some(existing) if *existing == canonical => {}
                Some(existing) => {
                    return Err(ExtractError::SignatureCollision {
                        selector,
                        first: existing.clone(),
                        second: canonical,
                    });
                }
                None => {
                    entries.insert(selector, canonical);
                }
            }
        }

        Ok(entries)
    }
}
