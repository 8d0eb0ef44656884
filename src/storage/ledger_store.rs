use crate::error::{BlockchainError, Result};
use sled::{Batch, Db, Tree};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

const LEDGER_TREE: &str = "ledger";

/// Durable key to string store behind the balance and nonce ledgers.
///
/// `get` distinguishes a missing key (`Ok(None)`) from a failed read
/// (`Err(StorageUnavailable)`).
pub trait LedgerStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn put(&self, key: &str, value: &str) -> Result<()>;

    /// Write every entry or none of them
    fn put_batch(&self, entries: &[(String, String)]) -> Result<()>;
}

/// sled-backed store, one tree per node database
pub struct SledStore {
    tree: Tree,
}

impl SledStore {
    pub fn open(db: &Db) -> Result<SledStore> {
        let tree = db.open_tree(LEDGER_TREE)?;
        Ok(SledStore { tree })
    }
}

impl LedgerStore for SledStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match self.tree.get(key)? {
            Some(bytes) => String::from_utf8(bytes.to_vec()).map(Some).map_err(|e| {
                BlockchainError::StorageUnavailable(format!("Corrupt entry for {key}: {e}"))
            }),
            None => Ok(None),
        }
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        self.tree.insert(key, value.as_bytes())?;
        Ok(())
    }

    fn put_batch(&self, entries: &[(String, String)]) -> Result<()> {
        let mut batch = Batch::default();
        for (key, value) in entries {
            batch.insert(key.as_bytes(), value.as_bytes());
        }
        self.tree.apply_batch(batch)?;
        Ok(())
    }
}

/// In-memory store. `set_unavailable(true)` makes every call fail, which is
/// how tests exercise storage outages.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(BlockchainError::StorageUnavailable(
                "memory store switched off".to_string(),
            ));
        }
        Ok(())
    }
}

impl LedgerStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.check_available()?;
        Ok(self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        self.check_available()?;
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn put_batch(&self, entries: &[(String, String)]) -> Result<()> {
        self.check_available()?;
        let mut map = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        for (key, value) in entries {
            map.insert(key.clone(), value.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn exercise(store: &dyn LedgerStore) {
        assert_eq!(store.get("balance:0xa").unwrap(), None);
        store.put("balance:0xa", "10").unwrap();
        assert_eq!(store.get("balance:0xa").unwrap(), Some("10".to_string()));

        store
            .put_batch(&[
                ("balance:0xa".to_string(), "4".to_string()),
                ("balance:0xb".to_string(), "6".to_string()),
            ])
            .unwrap();
        assert_eq!(store.get("balance:0xa").unwrap(), Some("4".to_string()));
        assert_eq!(store.get("balance:0xb").unwrap(), Some("6".to_string()));
    }

    #[test]
    fn test_memory_store() {
        exercise(&MemoryStore::new());
    }

    #[test]
    fn test_sled_store() -> Result<()> {
        let temp_dir = tempdir()?;
        let db = sled::open(temp_dir.path().join("ledger"))?;
        exercise(&SledStore::open(&db)?);
        Ok(())
    }

    #[test]
    fn test_unavailable_memory_store() {
        let store = MemoryStore::new();
        store.put("k", "v").unwrap();
        store.set_unavailable(true);
        assert!(matches!(
            store.get("k"),
            Err(BlockchainError::StorageUnavailable(_))
        ));
        assert!(store.put("k", "w").is_err());
        store.set_unavailable(false);
        assert_eq!(store.get("k").unwrap(), Some("v".to_string()));
    }
}
