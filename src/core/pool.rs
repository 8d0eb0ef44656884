use crate::core::Transaction;
use crate::error::{BlockchainError, Result};
use std::collections::HashSet;

/// Transactions admitted but not yet sealed, in arrival order, plus the
/// duplicate index keyed by payload digest.
///
/// The pool itself is not synchronized; [`crate::core::Blockchain`] guards it
/// with a single mutex so admission and the mining snapshot never interleave.
/// Payload digests stay in the index after their transactions are sealed, so
/// a payload can only ever be admitted once.
#[derive(Debug, Default)]
pub struct PendingPool {
    transactions: Vec<Transaction>,
    payload_index: HashSet<String>,
}

impl PendingPool {
    pub fn new() -> PendingPool {
        PendingPool::default()
    }

    pub fn is_duplicate(&self, tx: &Transaction) -> bool {
        self.payload_index.contains(&tx.payload_digest())
    }

    /// Duplicate check plus insert. Rejected transactions leave the pool unchanged.
    pub fn admit(&mut self, tx: Transaction) -> Result<()> {
        let digest = self.check_admissible(&tx)?;
        self.payload_index.insert(digest);
        self.transactions.push(tx);
        Ok(())
    }

    /// Fails with `DuplicateTransaction` when the payload was seen before
    pub fn check_admissible(&self, tx: &Transaction) -> Result<String> {
        let digest = tx.payload_digest();
        if self.payload_index.contains(&digest) {
            return Err(BlockchainError::DuplicateTransaction(digest));
        }
        Ok(digest)
    }

    /// Append without touching the duplicate index (raw signed transactions)
    pub fn push(&mut self, tx: Transaction) {
        self.transactions.push(tx);
    }

    /// Drop the first `count` transactions once they are sealed into a block
    pub fn remove_sealed(&mut self, count: usize) {
        let count = count.min(self.transactions.len());
        self.transactions.drain(..count);
    }

    pub fn get_all(&self) -> Vec<Transaction> {
        self.transactions.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transaction> {
        self.transactions.iter()
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}
