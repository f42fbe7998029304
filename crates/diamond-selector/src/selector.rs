//! Function selectors
//!
//! Provides [`Selector`], the 4-byte dispatch key derived from a canonical
//! function signature.

use crate::encoding::{self, HexError};
use crate::signature::{canonicalize, InterfaceParseError};
use sha3::{Digest, Keccak256};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Width of a selector in bytes
pub const SELECTOR_WIDTH: usize = 4;

/// A 4-byte function selector
///
/// The first four bytes of the Keccak-256 hash of a canonical signature
/// such as `transfer(address,uint256)`. Selectors are opaque dispatch keys
/// and are cheap to copy.
///
/// # Example
/// ```
/// use diamond_selector::Selector;
///
/// let selector = Selector::from_signature("transfer(address to, uint256 amount)").unwrap();
/// assert_eq!(selector.to_string(), "0xa9059cbb");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Selector([u8; SELECTOR_WIDTH]);

impl Selector {
    /// Create a selector from raw bytes
    #[inline]
    #[must_use]
    pub const fn new(bytes: [u8; SELECTOR_WIDTH]) -> Self {
        Self(bytes)
    }

    /// Create a selector from its big-endian integer value
    #[inline]
    #[must_use]
    pub const fn from_u32(value: u32) -> Self {
        Self(value.to_be_bytes())
    }

    /// Big-endian integer value
    #[inline]
    #[must_use]
    pub const fn as_u32(&self) -> u32 {
        u32::from_be_bytes(self.0)
    }

    /// Underlying bytes
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; SELECTOR_WIDTH] {
        &self.0
    }

    /// Create a selector from a byte slice
    ///
    /// # Errors
    /// Returns error if the slice is not exactly 4 bytes
    #[inline]
    pub fn from_slice(bytes: &[u8]) -> Result<Self, HexError> {
        encoding::fixed_from_slice(bytes).map(Self)
    }

    /// Hash an already-canonical signature
    ///
    /// No canonicalization is applied; use [`Selector::from_signature`] for
    /// human-written signatures.
    #[must_use]
    pub fn from_canonical(canonical: &str) -> Self {
        let digest = Keccak256::digest(canonical.as_bytes());
        let mut bytes = [0u8; SELECTOR_WIDTH];
        bytes.copy_from_slice(&digest[..SELECTOR_WIDTH]);
        Self(bytes)
    }

    /// Canonicalize a signature and hash it
    ///
    /// # Errors
    /// Returns [`InterfaceParseError`] if the signature cannot be canonicalized
    pub fn from_signature(signature: &str) -> Result<Self, InterfaceParseError> {
        canonicalize(signature).map(|canonical| Self::from_canonical(&canonical))
    }
}

impl Display for Selector {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Selector {
    type Err = HexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        encoding::fixed_from_hex(s).map(Self)
    }
}

impl From<u32> for Selector {
    fn from(value: u32) -> Self {
        Self::from_u32(value)
    }
}

impl serde::Serialize for Selector {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        encoding::serialize_fixed(&self.0, serializer)
    }
}

impl<'de> serde::Deserialize<'de> for Selector {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        encoding::deserialize_fixed(deserializer).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_erc20_selectors() {
        assert_eq!(
            Selector::from_canonical("transfer(address,uint256)"),
            Selector::from_u32(0xa905_9cbb)
        );
        assert_eq!(
            Selector::from_canonical("balanceOf(address)"),
            Selector::from_u32(0x70a0_8231)
        );
        assert_eq!(
            Selector::from_canonical("approve(address,uint256)"),
            Selector::from_u32(0x095e_a7b3)
        );
    }

    #[test]
    fn known_diamond_selectors() {
        assert_eq!(
            Selector::from_canonical("supportsInterface(bytes4)"),
            Selector::from_u32(0x01ff_c9a7)
        );
        assert_eq!(
            Selector::from_canonical("diamondCut((address,uint8,bytes4[])[],address,bytes)"),
            Selector::from_u32(0x1f93_1c1c)
        );
        assert_eq!(Selector::from_canonical("facets()"), Selector::from_u32(0x7a0e_d627));
    }

    #[test]
    fn from_signature_canonicalizes_first() {
        let loose = Selector::from_signature("function transfer(address to, uint amount) external returns (bool)")
            .unwrap();
        assert_eq!(loose, Selector::from_u32(0xa905_9cbb));
    }

    #[test]
    fn display_and_parse() {
        let selector = Selector::from_u32(0x10);
        assert_eq!(selector.to_string(), "0x00000010");
        assert_eq!("0x00000010".parse::<Selector>().unwrap(), selector);
        assert_eq!("00000010".parse::<Selector>().unwrap(), selector);
    }

    #[test]
    fn parse_rejects_wrong_width() {
        assert!("0x0102".parse::<Selector>().is_err());
        assert!(Selector::from_slice(&[1, 2, 3]).is_err());
    }

    #[test]
    fn u32_round_trip_preserves_order() {
        let low = Selector::from_u32(0x01);
        let high = Selector::from_u32(0x12);
        assert!(low < high);
        assert_eq!(high.as_u32(), 0x12);
    }

    #[test]
    fn serde_json_uses_hex() {
        let selector = Selector::from_u32(0xa905_9cbb);
        let json = serde_json::to_string(&selector).unwrap();
        assert_eq!(json, "\"0xa9059cbb\"");
        let decoded: Selector = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, selector);
    }
}
