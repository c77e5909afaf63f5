//! Address hashes
//!
//! Mail addresses never travel in the clear between servers. Both tickets and
//! message headers carry the SHA-256 of the address, rendered as 64 lowercase
//! hex characters.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::app_error::AppError;

const HASH_HEX_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid address hash: expected {HASH_HEX_LEN} lowercase hex characters")]
pub struct InvalidAddressHash;

impl From<InvalidAddressHash> for AppError {
    fn from(err: InvalidAddressHash) -> Self {
        AppError::bad_request(err.to_string())
    }
}

/// Validated SHA-256 address hash.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct AddressHash(String);

impl AddressHash {
    pub fn parse(s: &str) -> Result<Self, InvalidAddressHash> {
        let valid = s.len() == HASH_HEX_LEN
            && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if valid {
            Ok(Self(s.to_owned()))
        } else {
            Err(InvalidAddressHash)
        }
    }

    /// Build from a raw 32-byte digest.
    pub fn from_digest(digest: &[u8; 32]) -> Self {
        use fmt::Write;
        let mut s = String::with_capacity(HASH_HEX_LEN);
        for b in digest {
            // Writing into a String cannot fail.
            let _ = write!(s, "{b:02x}");
        }
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AddressHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AddressHash({})", &self.0[..12])
    }
}

impl fmt::Display for AddressHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AddressHash {
    type Err = InvalidAddressHash;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for AddressHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for AddressHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
