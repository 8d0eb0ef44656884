use crate::error::{BlockchainError, Result};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Arbitrary-precision balance in the smallest unit (wei)
pub type Amount = BigUint;

/// Canonical account identifier.
///
/// Addresses are case-insensitive on input and always stored lowercased, so
/// `0xAbC` and `0xabc` resolve to the same ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    pub fn parse(raw: &str) -> Result<Address> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(BlockchainError::InvalidAddress(
                "address must not be empty".to_string(),
            ));
        }
        if trimmed.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(BlockchainError::InvalidAddress(format!(
                "address contains whitespace: {trimmed:?}"
            )));
        }
        Ok(Address(trimmed.to_lowercase()))
    }

    /// Build from the 20 raw bytes of an Ethereum-style account
    pub fn from_bytes(bytes: &[u8]) -> Address {
        Address(format!("0x{}", hex::encode(bytes)))
    }

    /// The 20 account bytes, when this is a `0x` + 40 hex digit address
    pub fn to_bytes(&self) -> Result<[u8; 20]> {
        let digits = self.0.strip_prefix("0x").unwrap_or(&self.0);
        let bytes = hex::decode(digits)
            .map_err(|e| BlockchainError::InvalidAddress(format!("{}: {e}", self.0)))?;
        bytes.try_into().map_err(|_| {
            BlockchainError::InvalidAddress(format!("{} is not a 20-byte account", self.0))
        })
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Address {
    type Err = BlockchainError;

    fn from_str(s: &str) -> Result<Self> {
        Address::parse(s)
    }
}

impl TryFrom<String> for Address {
    type Error = BlockchainError;

    fn try_from(value: String) -> Result<Self> {
        Address::parse(&value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}
