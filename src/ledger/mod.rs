//! Account ledgers
//!
//! Balances and nonces are kept in the durable [`crate::storage::LedgerStore`]
//! and guarded by per-address striped locks, so every read-modify-write on one
//! address is a critical section.

pub mod balance;
pub mod locks;
pub mod nonce;

pub use balance::BalanceLedger;
pub use locks::StripedLocks;
pub use nonce::NonceLedger;
