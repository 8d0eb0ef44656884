use crate::core::Address;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, MutexGuard, PoisonError};

pub const DEFAULT_STRIPES: usize = 64;

/// Per-address mutual exclusion with a fixed number of mutexes.
///
/// Addresses hash onto stripes, so two adjustments of the same address always
/// serialize while unrelated addresses usually proceed in parallel. Multi-address
/// locking takes stripes in ascending order to rule out lock-order inversion.
pub struct StripedLocks {
    stripes: Vec<Mutex<()>>,
}

impl Default for StripedLocks {
    fn default() -> Self {
        Self::new(DEFAULT_STRIPES)
    }
}

impl StripedLocks {
    pub fn new(stripes: usize) -> StripedLocks {
        StripedLocks {
            stripes: (0..stripes.max(1)).map(|_| Mutex::new(())).collect(),
        }
    }

    fn stripe_of(&self, address: &Address) -> usize {
        let mut hasher = DefaultHasher::new();
        address.hash(&mut hasher);
        (hasher.finish() % self.stripes.len() as u64) as usize
    }

    pub fn lock(&self, address: &Address) -> MutexGuard<'_, ()> {
        self.stripes[self.stripe_of(address)]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn lock_many<'a, I>(&self, addresses: I) -> Vec<MutexGuard<'_, ()>>
    where
        I: IntoIterator<Item = &'a Address>,
    {
        let mut indices: Vec<usize> = addresses
            .into_iter()
            .map(|address| self.stripe_of(address))
            .collect();
        indices.sort_unstable();
        indices.dedup();
        indices
            .into_iter()
            .map(|index| {
                self.stripes[index]
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
            })
            .collect()
    }
}
