//! # Qryptum Chain - a proof-of-work account ledger node
//!
//! A small blockchain node that keeps balances in an account ledger rather
//! than a UTXO set, seals pending transactions into proof-of-work blocks, and
//! speaks enough Ethereum JSON-RPC for ordinary wallets to send signed
//! transactions to it.
//!
//! ## What is in here
//! - **Chain**: longest-valid-chain consensus over SHA-256 proof-of-work blocks
//! - **Ledgers**: durable balance and nonce maps with per-address locking
//! - **Transactions**: secp256k1 signatures with Ethereum-style addresses, and
//!   intake of raw RLP-encoded Ethereum transactions
//! - **P2P Network**: persistent TCP connections exchanging JSON messages
//! - **RPC**: Ethereum-shaped JSON-RPC plus node methods for mining and the faucet
//! - **Multi-Node**: isolated databases allowing multiple nodes on one machine
//!
//! ## How the code is organized
//! - `core/`: transactions, blocks, mining, the pending pool and the chain itself
//! - `ledger/`: balance and nonce ledgers
//! - `storage/`: the durable key-value store and block persistence
//! - `network/`: peer messages, the peer set and the P2P server
//! - `rpc/`: JSON-RPC dispatch, server and client
//! - `config/`: node configuration
//! - `utils/`: hashing, signing and encoding helpers
//! - `cli/`: command-line interface
//!
//! ## Where to start reading
//! 1. `main.rs` for the commands
//! 2. `core/blockchain.rs` for admission, mining and chain replacement
//! 3. `core/transaction.rs` for hashing and signatures
//! 4. `network/server.rs` for peer handling

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod ledger;
pub mod network;
pub mod rpc;
pub mod storage;
pub mod utils;

#[cfg(test)]
pub mod testnet;

// Re-export commonly used types for convenience
pub use cli::{Command, Opt};
pub use config::Config;
pub use core::{
    contract_address, decode_raw_transaction, sign_legacy_transaction, Address, Amount, Block,
    Blockchain, ChainParams, ContentScorer, LegacyTransactionRequest, ProofOfWork, SubmitOutcome,
    Transaction,
};
pub use error::{BlockchainError, Result};
pub use ledger::{BalanceLedger, NonceLedger};
pub use network::{PeerMessage, PeerNetwork};
pub use rpc::{rpc_call, RpcHandler, RpcServer};
pub use storage::{LedgerStore, MemoryStore, SledStore};
pub use utils::{current_timestamp, keccak_digest, recover_address, sha256_digest};
