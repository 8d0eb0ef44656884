use crate::core::{Address, Amount};
use crate::error::{BlockchainError, Result};
use crate::ledger::StripedLocks;
use crate::storage::LedgerStore;
use log::debug;
use num_bigint::BigInt;
use std::collections::HashMap;
use std::sync::Arc;

const BALANCE_KEY_PREFIX: &str = "balance:";

/// Address to balance map over a durable store. The ledger is the single
/// source of truth for funds; transactions only describe movements.
pub struct BalanceLedger {
    store: Arc<dyn LedgerStore>,
    locks: StripedLocks,
}

impl BalanceLedger {
    pub fn new(store: Arc<dyn LedgerStore>) -> BalanceLedger {
        BalanceLedger {
            store,
            locks: StripedLocks::default(),
        }
    }

    fn key(address: &Address) -> String {
        format!("{BALANCE_KEY_PREFIX}{address}")
    }

    fn read(&self, address: &Address) -> Result<Amount> {
        match self.store.get(&Self::key(address))? {
            Some(raw) => raw.parse::<Amount>().map_err(|e| {
                BlockchainError::StorageUnavailable(format!(
                    "Corrupt balance for {address}: {raw:?} ({e})"
                ))
            }),
            None => Ok(Amount::default()),
        }
    }

    /// Balance of `address`, zero when it has no entry
    pub fn get(&self, address: &Address) -> Result<Amount> {
        self.read(address)
    }

    /// Add `delta` (possibly negative) as one critical section per address
    pub fn adjust(&self, address: &Address, delta: &BigInt) -> Result<Amount> {
        let _guard = self.locks.lock(address);
        let current = self.read(address)?;
        let updated = apply_delta(&current, delta)?;
        self.store.put(&Self::key(address), &updated.to_string())?;
        debug!("Balance of {address}: {current} -> {updated}");
        Ok(updated)
    }

    /// Apply several deltas all-or-nothing.
    ///
    /// Deltas are checked in order against a running balance, so a debit
    /// listed before a credit to the same address must be covered on its own.
    /// Nothing is written unless every step stays non-negative.
    pub fn apply(&self, changes: &[(Address, BigInt)]) -> Result<()> {
        let _guards = self.locks.lock_many(changes.iter().map(|(address, _)| address));

        let mut working: HashMap<&Address, Amount> = HashMap::new();
        for (address, delta) in changes {
            let current = match working.get(address) {
                Some(balance) => balance.clone(),
                None => self.read(address)?,
            };
            let updated = apply_delta(&current, delta)?;
            working.insert(address, updated);
        }

        let entries: Vec<(String, String)> = working
            .iter()
            .map(|(address, balance)| (Self::key(address), balance.to_string()))
            .collect();
        self.store.put_batch(&entries)?;
        debug!("Applied {} balance changes", changes.len());
        Ok(())
    }
}

fn apply_delta(current: &Amount, delta: &BigInt) -> Result<Amount> {
    (BigInt::from(current.clone()) + delta)
        .to_biguint()
        .ok_or_else(|| BlockchainError::InsufficientFunds {
            required: delta.magnitude().clone(),
            available: current.clone(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use std::thread;

    fn ledger() -> (BalanceLedger, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (BalanceLedger::new(store.clone()), store)
    }

    fn addr(raw: &str) -> Address {
        Address::parse(raw).unwrap()
    }

    #[test]
    fn test_unknown_address_has_zero_balance() {
        let (ledger, _) = ledger();
        assert_eq!(ledger.get(&addr("0xnobody")).unwrap(), Amount::default());
    }

    #[test]
    fn test_adjust_credits_and_debits() {
        let (ledger, _) = ledger();
        let a = addr("0xA");
        assert_eq!(
            ledger.adjust(&a, &BigInt::from(1_000)).unwrap(),
            Amount::from(1_000u32)
        );
        assert_eq!(
            ledger.adjust(&a, &BigInt::from(-400)).unwrap(),
            Amount::from(600u32)
        );
        // Case-insensitive lookups hit the same entry
        assert_eq!(ledger.get(&addr("0xa")).unwrap(), Amount::from(600u32));
    }

    #[test]
    fn test_overdraft_fails_and_leaves_balance() {
        let (ledger, _) = ledger();
        let a = addr("0xA");
        ledger.adjust(&a, &BigInt::from(100)).unwrap();

        let err = ledger.adjust(&a, &BigInt::from(-101)).unwrap_err();
        assert_eq!(
            err,
            BlockchainError::InsufficientFunds {
                required: Amount::from(101u32),
                available: Amount::from(100u32),
            }
        );
        assert_eq!(ledger.get(&a).unwrap(), Amount::from(100u32));
    }

    #[test]
    fn test_amounts_beyond_u64() {
        let (ledger, _) = ledger();
        let a = addr("0xA");
        let huge: BigInt = "100000000000000000000000".parse().unwrap();
        ledger.adjust(&a, &huge).unwrap();
        ledger.adjust(&a, &huge).unwrap();
        assert_eq!(
            ledger.get(&a).unwrap().to_string(),
            "200000000000000000000000"
        );
    }

    #[test]
    fn test_apply_is_all_or_nothing() {
        let (ledger, _) = ledger();
        let a = addr("0xA");
        let b = addr("0xB");
        ledger.adjust(&a, &BigInt::from(50)).unwrap();

        let result = ledger.apply(&[(b.clone(), BigInt::from(10)), (a.clone(), BigInt::from(-80))]);
        assert!(matches!(result, Err(BlockchainError::InsufficientFunds { .. })));
        assert_eq!(ledger.get(&a).unwrap(), Amount::from(50u32));
        assert_eq!(ledger.get(&b).unwrap(), Amount::default());
    }

    #[test]
    fn test_apply_checks_debit_before_credit() {
        let (ledger, _) = ledger();
        let a = addr("0xA");
        ledger.adjust(&a, &BigInt::from(50)).unwrap();

        // Self-transfer of 40 with 20 gas: the 60 debit must be covered up front
        let result = ledger.apply(&[(a.clone(), BigInt::from(-60)), (a.clone(), BigInt::from(40))]);
        assert!(result.is_err());

        ledger
            .apply(&[(a.clone(), BigInt::from(-45)), (a.clone(), BigInt::from(25))])
            .unwrap();
        assert_eq!(ledger.get(&a).unwrap(), Amount::from(30u32));
    }

    #[test]
    fn test_concurrent_adjustments_serialize() {
        let (ledger, _) = ledger();
        let ledger = Arc::new(ledger);
        let a = addr("0xA");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                let a = a.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        ledger.adjust(&a, &BigInt::from(1)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(ledger.get(&a).unwrap(), Amount::from(800u32));
    }

    #[test]
    fn test_storage_failure_propagates() {
        let (ledger, store) = ledger();
        store.set_unavailable(true);
        assert!(matches!(
            ledger.get(&addr("0xA")),
            Err(BlockchainError::StorageUnavailable(_))
        ));
        assert!(matches!(
            ledger.adjust(&addr("0xA"), &BigInt::from(1)),
            Err(BlockchainError::StorageUnavailable(_))
        ));
    }
}
