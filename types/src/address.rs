//! Account address type with `rgn_` prefix.

use blake2::{Blake2b512, Digest};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An account address, always prefixed with `rgn_`.
///
/// Addresses name every party the engine interacts with: depositors,
/// claimers, delegatees, surrogates, tokens, allocation mechanisms, the
/// fee collector and the engine itself.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(String);

impl Address {
    /// The standard prefix for all addresses.
    pub const PREFIX: &'static str = "rgn_";

    /// Create a new address from a raw string.
    ///
    /// # Panics
    /// Panics if the string does not start with `rgn_`.
    pub fn new(raw: impl Into<String>) -> Self {
        let s = raw.into();
        assert!(s.starts_with(Self::PREFIX), "address must start with rgn_");
        Self(s)
    }

    /// Derive a deterministic address from a namespace tag and parts.
    ///
    /// The same (tag, parts) always produce the same address, so derived
    /// addresses can be computed in advance by anyone.
    pub fn derive(tag: &str, parts: &[&[u8]]) -> Self {
        let mut hasher = Blake2b512::new();
        hasher.update(tag.as_bytes());
        for part in parts {
            hasher.update([part.len() as u8]);
            hasher.update(part);
        }
        let digest = hasher.finalize();
        Self(format!("{}{}", Self::PREFIX, hex::encode(&digest[..20])))
    }

    /// Return the raw address string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validate that this address is well-formed.
    pub fn is_valid(&self) -> bool {
        self.0.starts_with(Self::PREFIX) && self.0.len() > Self::PREFIX.len()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Address {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_accepts_prefixed_address() {
        let a = Address::new("rgn_alice");
        assert_eq!(a.as_str(), "rgn_alice");
        assert!(a.is_valid());
    }

    #[test]
    #[should_panic(expected = "must start with rgn_")]
    fn new_rejects_missing_prefix() {
        Address::new("alice");
    }

    #[test]
    fn derive_is_deterministic() {
        let a = Address::derive("surrogate", &[b"engine", b"delegatee"]);
        let b = Address::derive("surrogate", &[b"engine", b"delegatee"]);
        assert_eq!(a, b);
        assert!(a.is_valid());
    }

    #[test]
    fn derive_differs_by_part() {
        let a = Address::derive("surrogate", &[b"engine", b"alice"]);
        let b = Address::derive("surrogate", &[b"engine", b"bob"]);
        assert_ne!(a, b);
    }

    #[test]
    fn derive_differs_by_tag() {
        let a = Address::derive("surrogate", &[b"x"]);
        let b = Address::derive("escrow", &[b"x"]);
        assert_ne!(a, b);
    }
}
