use crate::core::Address;
use crate::error::Result;
use crate::ledger::StripedLocks;
use crate::storage::LedgerStore;
use log::warn;
use std::sync::Arc;

const NONCE_KEY_PREFIX: &str = "nonce:";

/// Issue-only transaction counter per address.
///
/// Incoming transactions are never checked against it; it only answers
/// "how many transactions has this address sent".
pub struct NonceLedger {
    store: Arc<dyn LedgerStore>,
    locks: StripedLocks,
}

impl NonceLedger {
    pub fn new(store: Arc<dyn LedgerStore>) -> NonceLedger {
        NonceLedger {
            store,
            locks: StripedLocks::default(),
        }
    }

    fn key(address: &Address) -> String {
        format!("{NONCE_KEY_PREFIX}{address}")
    }

    /// Last issued value, 0 when none. An unparsable entry counts as 0.
    pub fn current(&self, address: &Address) -> Result<u64> {
        let Some(raw) = self.store.get(&Self::key(address))? else {
            return Ok(0);
        };
        Ok(raw.parse::<u64>().unwrap_or_else(|_| {
            warn!("Unparsable nonce {raw:?} for {address}, treating as 0");
            0
        }))
    }

    /// Increment and persist, returning the new value
    pub fn next(&self, address: &Address) -> Result<u64> {
        let _guard = self.locks.lock(address);
        let next = self.current(address)?.saturating_add(1);
        self.store.put(&Self::key(address), &next.to_string())?;
        Ok(next)
    }
}
