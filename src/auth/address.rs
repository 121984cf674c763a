//! Wallet account addresses.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A 20-byte account address, always held as lowercase `0x` + 40 hex chars.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid address")]
pub struct InvalidAddress;

impl Address {
    /// Parse after trimming and lowercasing. Anything but `0x` + 40 hex fails.
    pub fn parse(raw: &str) -> Result<Self, InvalidAddress> {
        let normalized = raw.trim().to_ascii_lowercase();
        let valid = normalized.len() == 42
            && normalized.starts_with("0x")
            && normalized[2..].bytes().all(|b| b.is_ascii_hexdigit());
        if !valid {
            return Err(InvalidAddress);
        }
        Ok(Address(normalized))
    }

    /// Build from the raw 20 bytes (e.g. a recovered signer).
    pub fn from_bytes(bytes: &[u8; 20]) -> Self {
        Address(format!("0x{}", hex::encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Six hex chars after the prefix, used for default display names.
    pub fn short(&self) -> &str {
        &self.0[2..8]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Address {
    type Err = InvalidAddress;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::parse(s)
    }
}

impl TryFrom<String> for Address {
    type Error = InvalidAddress;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Address::parse(&value)
    }
}

impl From<Address> for String {
    fn from(addr: Address) -> Self {
        addr.0
    }
}
