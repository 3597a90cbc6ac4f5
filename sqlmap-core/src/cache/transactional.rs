use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::{Cache, CacheKey};
use crate::value::Value;

/// A per-session overlay over a shared second-level [`Cache`] (`spec.md`
/// §4.3/§5): reads go straight through to the shared cache, but writes are
/// buffered until [`TransactionalCache::commit`] and thrown away on
/// [`TransactionalCache::rollback`], so a statement that flushes the cache
/// mid-transaction never lets other sessions observe a write the
/// transaction might still abort.
///
/// Unlike the other decorators in this module, this one does not implement
/// [`super::CacheImpl`] — it wraps a shared, already-built `Cache` rather
/// than composing into one, and is instantiated fresh per session by the
/// executor's cache-consulting layer rather than baked into
/// [`super::CacheBuilder::build`].
pub struct TransactionalCache {
    delegate: Arc<Cache>,
    to_add_on_commit: Mutex<HashMap<CacheKey, Value>>,
    missed_in_cache: Mutex<HashSet<CacheKey>>,
    clear_on_commit: AtomicBool,
    prime_missed_on_commit: bool,
}

impl TransactionalCache {
    pub fn new(delegate: Arc<Cache>, prime_missed_on_commit: bool) -> Self {
        Self {
            delegate,
            to_add_on_commit: Mutex::new(HashMap::new()),
            missed_in_cache: Mutex::new(HashSet::new()),
            clear_on_commit: AtomicBool::new(false),
            prime_missed_on_commit,
        }
    }

    /// Reads through the buffered writes first, then the shared cache,
    /// recording a miss so it can be primed (or cleaned up) on commit.
    pub fn get(&self, key: &CacheKey) -> Option<Value> {
        if let Some(value) = self.to_add_on_commit.lock().get(key) {
            return Some(value.clone());
        }
        if self.clear_on_commit.load(Ordering::Acquire) {
            return None;
        }
        match self.delegate.get(key) {
            Some(value) => Some(value),
            None => {
                self.missed_in_cache.lock().insert(key.clone());
                None
            }
        }
    }

    pub fn put(&self, key: CacheKey, value: Value) {
        self.to_add_on_commit.lock().insert(key, value);
    }

    /// A `flushCache`-required statement ran: the shared cache is cleared
    /// at commit time and anything buffered so far is discarded.
    pub fn clear(&self) {
        self.clear_on_commit.store(true, Ordering::Release);
        self.to_add_on_commit.lock().clear();
    }

    pub fn commit(&self) {
        if self.clear_on_commit.swap(false, Ordering::AcqRel) {
            self.delegate.clear();
        }
        let mut to_add = self.to_add_on_commit.lock();
        for (key, value) in to_add.drain() {
            self.delegate.put(key, value);
        }
        let mut missed = self.missed_in_cache.lock();
        if self.prime_missed_on_commit {
            for key in missed.drain() {
                self.delegate.put(key, Value::Null);
            }
        } else {
            missed.clear();
        }
    }

    pub fn rollback(&self) {
        self.clear_on_commit.store(false, Ordering::Release);
        self.to_add_on_commit.lock().clear();
        let mut missed = self.missed_in_cache.lock();
        for key in missed.drain() {
            self.delegate.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheBuilder, Eviction};

    fn shared() -> Arc<Cache> {
        Arc::new(CacheBuilder::new("ns").eviction(Eviction::Lru).size(16).build())
    }

    #[test]
    fn buffered_writes_are_invisible_until_commit() {
        let shared = shared();
        let tx = TransactionalCache::new(shared.clone(), false);
        let key = CacheKey::new().update("k");
        tx.put(key.clone(), Value::I64(1));
        assert_eq!(shared.get(&key), None);
        tx.commit();
        assert_eq!(shared.get(&key), Some(Value::I64(1)));
    }

    #[test]
    fn rollback_discards_buffered_writes() {
        let shared = shared();
        let tx = TransactionalCache::new(shared.clone(), false);
        let key = CacheKey::new().update("k");
        tx.put(key.clone(), Value::I64(1));
        tx.rollback();
        tx.commit();
        assert_eq!(shared.get(&key), None);
    }

    #[test]
    fn missed_keys_are_primed_with_null_when_configured() {
        let shared = shared();
        let tx = TransactionalCache::new(shared.clone(), true);
        let key = CacheKey::new().update("k");
        assert_eq!(tx.get(&key), None);
        tx.commit();
        assert_eq!(shared.get(&key), Some(Value::Null));
    }
}
