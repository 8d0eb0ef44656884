//! Core ledger functionality
//!
//! This module contains the fundamental components of the node: addresses and
//! amounts, transactions, blocks and their proof-of-work, the pending pool,
//! contract records, and the [`Blockchain`] that ties them to the ledgers.

pub mod address;
pub mod block;
pub mod blockchain;
pub mod contract;
pub mod monetary;
pub mod pool;
pub mod proof_of_work;
pub mod raw_tx;
pub mod reward;
pub mod transaction;

pub use address::{Address, Amount};
pub use block::Block;
pub use blockchain::{Blockchain, ChainParams, SubmitOutcome, TransactionLocation};
pub use contract::{ContractLog, ContractRegistry, DeployedContract, CONTRACT_CREATED_TOPIC};
pub use monetary::{
    coins, format_coins, DEFAULT_CHAIN_ID, DEFAULT_DIFFICULTY, GAS_UNIT_PRICE, MIN_GAS_LIMIT,
    WEI_PER_COIN,
};
pub use pool::PendingPool;
pub use proof_of_work::ProofOfWork;
pub use raw_tx::{
    contract_address, decode_raw_transaction, sign_legacy_transaction, DecodedTransaction,
    LegacyTransactionRequest,
};
pub use reward::{reward_multiplier, scaled_reward, ContentScorer, FixedScorer};
pub use transaction::Transaction;
