//! Module addresses
//!
//! Provides [`ModuleAddress`], the 20-byte identity of a deployed module.
//! The all-zero address is reserved as the "unowned" sentinel.

use crate::encoding::{self, HexError};
use sha3::{Digest, Keccak256};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Width of a module address in bytes
pub const ADDRESS_WIDTH: usize = 20;

/// A 20-byte module address
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ModuleAddress([u8; ADDRESS_WIDTH]);

impl ModuleAddress {
    /// The reserved zero address; never identifies a module
    pub const ZERO: Self = Self([0u8; ADDRESS_WIDTH]);

    /// Create an address from raw bytes
    #[inline]
    #[must_use]
    pub const fn new(bytes: [u8; ADDRESS_WIDTH]) -> Self {
        Self(bytes)
    }

    /// Underlying bytes
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; ADDRESS_WIDTH] {
        &self.0
    }

    /// Create an address from a byte slice
    ///
    /// # Errors
    /// Returns error if the slice is not exactly 20 bytes
    #[inline]
    pub fn from_slice(bytes: &[u8]) -> Result<Self, HexError> {
        encoding::fixed_from_slice(bytes).map(Self)
    }

    /// Derive an address from arbitrary seed bytes
    ///
    /// Takes the low 20 bytes of the Keccak-256 digest, the way account
    /// addresses are derived from creation data.
    #[must_use]
    pub fn derive(seed: &[u8]) -> Self {
        let digest = Keccak256::digest(seed);
        let mut bytes = [0u8; ADDRESS_WIDTH];
        bytes.copy_from_slice(&digest[32 - ADDRESS_WIDTH..]);
        Self(bytes)
    }

    /// Check for the reserved zero address
    #[inline]
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ADDRESS_WIDTH]
    }

    /// Short form (first 4 bytes), for log lines
    #[inline]
    #[must_use]
    pub fn short(&self) -> String {
        format!("0x{}", hex::encode(&self.0[..4]))
    }
}

impl Display for ModuleAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for ModuleAddress {
    type Err = HexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        encoding::fixed_from_hex(s).map(Self)
    }
}

impl serde::Serialize for ModuleAddress {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        encoding::serialize_fixed(&self.0, serializer)
    }
}

impl<'de> serde::Deserialize<'de> for ModuleAddress {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        encoding::deserialize_fixed(deserializer).map(Self)
    }
}

/// Render an optional owner, using `unowned` for `None`
#[must_use]
pub fn owner_label(owner: Option<ModuleAddress>) -> String {
    owner.map_or_else(|| "unowned".to_string(), |address| address.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_reserved() {
        assert!(ModuleAddress::ZERO.is_zero());
        assert!(ModuleAddress::default().is_zero());
        assert!(!ModuleAddress::new([1u8; 20]).is_zero());
    }

    #[test]
    fn display_and_parse() {
        let address: ModuleAddress = "0x9f9D6Fdfb1Da8ABD6F363Aa1fED939944Bd71F5c".parse().unwrap();
        assert_eq!(
            address.to_string(),
            "0x9f9d6fdfb1da8abd6f363aa1fed939944bd71f5c"
        );
        assert_eq!(address.short(), "0x9f9d6fdf");
    }

    #[test]
    fn derive_is_deterministic() {
        let a = ModuleAddress::derive(b"deployer:1");
        let b = ModuleAddress::derive(b"deployer:1");
        let c = ModuleAddress::derive(b"deployer:2");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(!a.is_zero());
    }

    #[test]
    fn owner_label_renders_unowned() {
        assert_eq!(owner_label(None), "unowned");
        let address = ModuleAddress::new([0xab; 20]);
        assert_eq!(owner_label(Some(address)), address.to_string());
    }

    #[test]
    fn serde_json_round_trip() {
        let address = ModuleAddress::new([0x11; 20]);
        let json = serde_json::to_string(&address).unwrap();
        assert!(json.starts_with("\"0x1111"));
        let decoded: ModuleAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, address);
    }
}
