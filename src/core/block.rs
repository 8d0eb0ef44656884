use crate::core::{Amount, ProofOfWork, Transaction};
use crate::error::{BlockchainError, Result};
use crate::utils::{amount_string, deserialize, serialize};
use log::info;
use num_bigint::BigUint;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

/// `previousHash` of the genesis block
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// Nonces tried between cancellation checks
const MINING_BATCH: u64 = 10_000;

static GENESIS: OnceCell<Block> = OnceCell::new();

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    index: u64,
    timestamp: i64,
    transactions: Vec<Transaction>,
    previous_hash: String,
    hash: String,
    nonce: u64,
    // Recorded for queries, not part of the hash
    #[serde(with = "amount_string")]
    miner_reward: Amount,
}

impl Block {
    /// Unsealed block with `nonce = 0` and its matching hash
    pub fn new_block(
        index: u64,
        timestamp: i64,
        transactions: Vec<Transaction>,
        previous_hash: String,
    ) -> Result<Block> {
        let mut block = Block {
            index,
            timestamp,
            transactions,
            previous_hash,
            hash: String::new(),
            nonce: 0,
            miner_reward: BigUint::default(),
        };
        block.hash = block.calculate_hash()?;
        Ok(block)
    }

    /// The fixed genesis block every node starts from
    pub fn genesis() -> Result<Block> {
        GENESIS
            .get_or_try_init(|| Block::new_block(0, 0, vec![], GENESIS_PREVIOUS_HASH.to_string()))
            .cloned()
    }

    pub fn calculate_hash(&self) -> Result<String> {
        ProofOfWork::calculate_hash(self)
    }

    /// The cached hash matches a recomputation from the block's fields
    pub fn has_consistent_hash(&self) -> bool {
        matches!(self.calculate_hash(), Ok(hash) if hash == self.hash)
    }

    /// Seal by brute force; only `nonce` and `hash` change
    pub fn mine(&mut self, difficulty: u32) -> Result<()> {
        info!(
            "Starting proof-of-work for block {} with difficulty {difficulty}",
            self.index
        );
        let pow = ProofOfWork::new_proof_of_work(self, difficulty)?;
        let (nonce, hash) = pow.run()?;
        self.seal(nonce, hash);
        info!("Proof-of-work completed for block {}: {}", self.index, self.hash);
        Ok(())
    }

    /// Try `count` nonces from `start`. Returns whether the block is now sealed;
    /// on a miss the block is untouched and the caller resumes at `start + count`.
    pub fn mine_range(&mut self, difficulty: u32, start: u64, count: u64) -> Result<bool> {
        let pow = ProofOfWork::new_proof_of_work(self, difficulty)?;
        match pow.run_range(start, count) {
            Some((nonce, hash)) => {
                self.seal(nonce, hash);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Seal unless `cancel` is raised first. Returns `false` when cancelled,
    /// leaving the block as it was.
    pub fn mine_with_cancel(&mut self, difficulty: u32, cancel: &AtomicBool) -> Result<bool> {
        let pow = ProofOfWork::new_proof_of_work(self, difficulty)?;
        let mut start = 0u64;
        loop {
            if cancel.load(Ordering::Relaxed) {
                info!("Proof-of-work for block {} cancelled", self.index);
                return Ok(false);
            }
            if let Some((nonce, hash)) = pow.run_range(start, MINING_BATCH) {
                self.seal(nonce, hash);
                return Ok(true);
            }
            start = start.checked_add(MINING_BATCH).ok_or_else(|| {
                BlockchainError::Mining(format!("nonce space exhausted for block {}", self.index))
            })?;
        }
    }

    fn seal(&mut self, nonce: u64, hash: String) {
        self.nonce = nonce;
        self.hash = hash;
    }

    pub fn with_miner_reward(self, miner_reward: Amount) -> Block {
        Block {
            miner_reward,
            ..self
        }
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Block> {
        deserialize::<Block>(bytes)
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        serialize(self)
    }

    pub fn get_index(&self) -> u64 {
        self.index
    }

    pub fn get_timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn get_transactions(&self) -> &[Transaction] {
        self.transactions.as_slice()
    }

    pub fn get_previous_hash(&self) -> &str {
        self.previous_hash.as_str()
    }

    pub fn get_hash(&self) -> &str {
        self.hash.as_str()
    }

    pub fn get_nonce(&self) -> u64 {
        self.nonce
    }

    pub fn get_miner_reward(&self) -> &Amount {
        &self.miner_reward
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::proof_of_work::MAX_DIFFICULTY;
    use crate::core::Address;

    fn reward_tx() -> Transaction {
        Transaction::new_at(
            None,
            Some(Address::parse("0xA").unwrap()),
            b"grant".to_vec(),
            0,
            BigUint::from(1_000u32),
            5,
        )
    }

    #[test]
    fn test_genesis_is_fixed() {
        let genesis = Block::genesis().unwrap();
        assert_eq!(genesis.get_index(), 0);
        assert_eq!(genesis.get_previous_hash(), GENESIS_PREVIOUS_HASH);
        assert!(genesis.get_transactions().is_empty());
        assert_eq!(genesis, Block::genesis().unwrap());
        assert!(genesis.has_consistent_hash());
    }

    #[test]
    fn test_new_block_hash_is_recomputable() {
        let block = Block::new_block(1, 10, vec![reward_tx()], "abc".to_string()).unwrap();
        assert_eq!(block.get_nonce(), 0);
        assert_eq!(block.get_hash(), block.calculate_hash().unwrap());
    }

    #[test]
    fn test_mine_sets_leading_zeros() {
        let mut block = Block::new_block(1, 10, vec![reward_tx()], "abc".to_string()).unwrap();
        block.mine(2).unwrap();
        assert!(block.get_hash().starts_with("00"));
        assert!(block.has_consistent_hash());
        assert!(ProofOfWork::validate(&block, 2));
    }

    #[test]
    fn test_mine_range_miss_leaves_block_untouched() {
        let mut block = Block::new_block(1, 10, vec![], "abc".to_string()).unwrap();
        let before = block.clone();
        // 64 leading zero digits is never found in a single attempt
        assert!(!block.mine_range(MAX_DIFFICULTY, 0, 1).unwrap());
        assert_eq!(block, before);
    }

    #[test]
    fn test_cancelled_mining_is_a_no_op() {
        let mut block = Block::new_block(1, 10, vec![], "abc".to_string()).unwrap();
        let before = block.clone();
        let cancel = AtomicBool::new(true);
        assert!(!block.mine_with_cancel(4, &cancel).unwrap());
        assert_eq!(block, before);
    }

    #[test]
    fn test_mine_with_cancel_completes() {
        let mut block = Block::new_block(2, 10, vec![], "abc".to_string()).unwrap();
        let cancel = AtomicBool::new(false);
        assert!(block.mine_with_cancel(1, &cancel).unwrap());
        assert!(ProofOfWork::validate(&block, 1));
    }

    #[test]
    fn test_miner_reward_is_not_hashed() {
        let block = Block::new_block(1, 10, vec![], "abc".to_string()).unwrap();
        let rewarded = block.clone().with_miner_reward(BigUint::from(7u32));
        assert_eq!(block.get_hash(), rewarded.calculate_hash().unwrap());
    }

    #[test]
    fn test_bincode_storage_format() {
        let mut block = Block::new_block(1, 10, vec![reward_tx()], "abc".to_string()).unwrap();
        block.mine(1).unwrap();
        let bytes = block.serialize().unwrap();
        assert_eq!(Block::deserialize(&bytes).unwrap(), block);
    }

    #[test]
    fn test_tampering_breaks_hash() {
        let mut block = Block::new_block(1, 10, vec![reward_tx()], "abc".to_string()).unwrap();
        block.mine(1).unwrap();
        block.timestamp += 1;
        assert!(!block.has_consistent_hash());
    }
}
