//! Error handling for the ledger node
//!
//! Every fallible operation in the crate returns [`Result`], so validation
//! failures, storage outages and transport problems all travel through the
//! same enum up to the RPC handler, the peer handler or the CLI.

use num_bigint::BigUint;
use std::fmt;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, BlockchainError>;

/// Error taxonomy for ledger, consensus and transport operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockchainError {
    /// Address is empty or not a usable identifier
    InvalidAddress(String),
    /// Transaction has no usable receiver
    InvalidRecipient(String),
    /// Malformed transaction (bad raw encoding, bad field values)
    InvalidTransaction(String),
    /// A transaction with a sender carries no signature
    MissingSignature,
    /// Signature does not recover to the declared sender
    InvalidSignature,
    /// Balance would go negative
    InsufficientFunds {
        required: BigUint,
        available: BigUint,
    },
    /// Payload already present in the pending pool's duplicate index
    DuplicateTransaction(String),
    /// Candidate chain failed structural validation
    InvalidChain(String),
    /// Block, transaction or contract lookup miss
    NotFound(String),
    /// Durable store could not be read or written
    StorageUnavailable(String),
    /// Serialization/deserialization errors
    Serialization(String),
    /// Network communication errors
    Network(String),
    /// Configuration errors
    Config(String),
    /// File I/O errors
    Io(String),
    /// Mining errors (including cancellation)
    Mining(String),
    /// Cryptographic operation errors
    Crypto(String),
}

impl fmt::Display for BlockchainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockchainError::InvalidAddress(addr) => write!(f, "Invalid address: {addr}"),
            BlockchainError::InvalidRecipient(msg) => write!(f, "Invalid recipient: {msg}"),
            BlockchainError::InvalidTransaction(msg) => write!(f, "Invalid transaction: {msg}"),
            BlockchainError::MissingSignature => {
                write!(f, "Missing signature on a transaction with a sender")
            }
            BlockchainError::InvalidSignature => write!(f, "Invalid signature"),
            BlockchainError::InsufficientFunds {
                required,
                available,
            } => {
                write!(
                    f,
                    "Insufficient funds: required {required}, available {available}"
                )
            }
            BlockchainError::DuplicateTransaction(digest) => {
                write!(f, "Duplicate transaction payload: {digest}")
            }
            BlockchainError::InvalidChain(msg) => write!(f, "Invalid chain: {msg}"),
            BlockchainError::NotFound(what) => write!(f, "Not found: {what}"),
            BlockchainError::StorageUnavailable(msg) => write!(f, "Storage unavailable: {msg}"),
            BlockchainError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            BlockchainError::Network(msg) => write!(f, "Network error: {msg}"),
            BlockchainError::Config(msg) => write!(f, "Configuration error: {msg}"),
            BlockchainError::Io(msg) => write!(f, "I/O error: {msg}"),
            BlockchainError::Mining(msg) => write!(f, "Mining error: {msg}"),
            BlockchainError::Crypto(msg) => write!(f, "Cryptographic error: {msg}"),
        }
    }
}

impl std::error::Error for BlockchainError {}

impl From<std::io::Error> for BlockchainError {
    fn from(err: std::io::Error) -> Self {
        BlockchainError::Io(err.to_string())
    }
}

impl From<sled::Error> for BlockchainError {
    fn from(err: sled::Error) -> Self {
        BlockchainError::StorageUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for BlockchainError {
    fn from(err: serde_json::Error) -> Self {
        BlockchainError::Serialization(err.to_string())
    }
}

impl From<bincode::error::EncodeError> for BlockchainError {
    fn from(err: bincode::error::EncodeError) -> Self {
        BlockchainError::Serialization(err.to_string())
    }
}

impl From<bincode::error::DecodeError> for BlockchainError {
    fn from(err: bincode::error::DecodeError) -> Self {
        BlockchainError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for BlockchainError {
    fn from(err: toml::de::Error) -> Self {
        BlockchainError::Config(err.to_string())
    }
}
