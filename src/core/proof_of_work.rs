use crate::core::Block;
use crate::error::{BlockchainError, Result};
use crate::utils::sha256_digest;
use data_encoding::HEXLOWER;
use num_bigint::BigUint;

/// Each hex digit of the hash covers four bits of the target
const BITS_PER_HEX_DIGIT: u32 = 4;

/// A 256-bit hash has 64 hex digits
pub const MAX_DIFFICULTY: u32 = 64;

/// Hashing state for one block: everything except the nonce is encoded once.
///
/// The hashed bytes are the canonical JSON object
/// `{"index":..,"timestamp":..,"transactions":[..],"previousHash":"..","nonce":N}`,
/// so only the trailing `N}` changes between attempts.
pub struct ProofOfWork {
    prefix: Vec<u8>,
    target: BigUint,
    difficulty: u32,
}

impl ProofOfWork {
    pub fn new_proof_of_work(block: &Block, difficulty: u32) -> Result<ProofOfWork> {
        if difficulty > MAX_DIFFICULTY {
            return Err(BlockchainError::Mining(format!(
                "difficulty {difficulty} exceeds {MAX_DIFFICULTY} hex digits"
            )));
        }
        // A hash with `difficulty` leading zero hex digits is below 2^(256 - 4*difficulty)
        let target = BigUint::from(1u8) << (256 - BITS_PER_HEX_DIGIT * difficulty) as usize;
        let prefix = format!(
            "{{\"index\":{},\"timestamp\":{},\"transactions\":{},\"previousHash\":{},\"nonce\":",
            block.get_index(),
            block.get_timestamp(),
            serde_json::to_string(block.get_transactions())?,
            serde_json::to_string(block.get_previous_hash())?,
        );
        Ok(ProofOfWork {
            prefix: prefix.into_bytes(),
            target,
            difficulty,
        })
    }

    /// Recompute a block's hash from its fields and stored nonce
    pub fn calculate_hash(block: &Block) -> Result<String> {
        let pow = ProofOfWork::new_proof_of_work(block, 0)?;
        Ok(HEXLOWER.encode(&pow.hash_with_nonce(block.get_nonce())))
    }

    /// Stored hash is recomputable and satisfies `difficulty`
    pub fn validate(block: &Block, difficulty: u32) -> bool {
        let Ok(pow) = ProofOfWork::new_proof_of_work(block, difficulty) else {
            return false;
        };
        let hash = pow.hash_with_nonce(block.get_nonce());
        HEXLOWER.encode(&hash) == block.get_hash() && pow.meets_target(&hash)
    }

    fn prepare_data(&self, nonce: u64) -> Vec<u8> {
        let mut data_bytes = Vec::with_capacity(self.prefix.len() + 21);
        data_bytes.extend_from_slice(&self.prefix);
        data_bytes.extend_from_slice(nonce.to_string().as_bytes());
        data_bytes.push(b'}');
        data_bytes
    }

    fn hash_with_nonce(&self, nonce: u64) -> Vec<u8> {
        sha256_digest(&self.prepare_data(nonce))
    }

    fn meets_target(&self, hash: &[u8]) -> bool {
        BigUint::from_bytes_be(hash) < self.target
    }

    /// Try nonces `start .. start + count`; the first hit wins
    pub fn run_range(&self, start: u64, count: u64) -> Option<(u64, String)> {
        let end = start.saturating_add(count);
        (start..end).find_map(|nonce| {
            let hash = self.hash_with_nonce(nonce);
            self.meets_target(&hash)
                .then(|| (nonce, HEXLOWER.encode(&hash)))
        })
    }

    /// Search the whole nonce space from zero
    pub fn run(&self) -> Result<(u64, String)> {
        self.run_range(0, u64::MAX).ok_or_else(|| {
            BlockchainError::Mining(format!(
                "nonce space exhausted at difficulty {}",
                self.difficulty
            ))
        })
    }

    pub fn get_difficulty(&self) -> u32 {
        self.difficulty
    }
}
