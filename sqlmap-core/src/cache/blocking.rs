use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};

use super::{CacheImpl, CacheKey};
use crate::error::ExecutorError;
use crate::value::Value;

/// Per-key lock acquired on a read miss and released on the matching `put`
/// (`spec.md` §4.3/§6). A concurrent reader of the same key blocks — or
/// times out, if `timeout` is set — until whoever is filling it calls
/// `put`, instead of racing it to the database.
struct KeyLock {
    held: Mutex<bool>,
    released: Condvar,
}

impl KeyLock {
    fn new() -> Self {
        Self { held: Mutex::new(false), released: Condvar::new() }
    }
}

pub struct BlockingCache {
    inner: Box<dyn CacheImpl>,
    locks: DashMap<CacheKey, Arc<KeyLock>>,
    timeout: Option<Duration>,
}

impl BlockingCache {
    pub fn new(inner: Box<dyn CacheImpl>, timeout: Option<Duration>) -> Self {
        Self { inner, locks: DashMap::new(), timeout }
    }

    fn lock_for(&self, key: &CacheKey) -> Arc<KeyLock> {
        self.locks.entry(key.clone()).or_insert_with(|| Arc::new(KeyLock::new())).clone()
    }

    fn acquire(&self, key: &CacheKey) -> Result<(), ()> {
        let lock = self.lock_for(key);
        let mut held = lock.held.lock();
        match self.timeout {
            Some(timeout) => {
                let deadline = Instant::now() + timeout;
                while *held {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Err(());
                    }
                    lock.released.wait_for(&mut held, remaining);
                }
            }
            None => {
                while *held {
                    lock.released.wait(&mut held);
                }
            }
        }
        *held = true;
        Ok(())
    }

    fn release(&self, key: &CacheKey) {
        if let Some(lock) = self.locks.get(key) {
            *lock.held.lock() = false;
            lock.released.notify_all();
        }
    }

    /// The fallible counterpart of [`CacheImpl::get`], surfacing a timed-out
    /// wait as [`ExecutorError::CacheTimeout`] instead of silently treating
    /// it as a miss.
    pub fn try_get(&self, key: &CacheKey) -> Result<Option<Value>, ExecutorError> {
        if self.acquire(key).is_err() {
            return Err(ExecutorError::CacheTimeout(format!("{key:?}")));
        }
        let value = self.inner.get(key);
        if value.is_some() {
            self.release(key);
        }
        Ok(value)
    }
}

impl CacheImpl for BlockingCache {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn put(&self, key: CacheKey, value: Value) {
        self.inner.put(key.clone(), value);
        self.release(&key);
    }

    fn get(&self, key: &CacheKey) -> Option<Value> {
        match self.try_get(key) {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(?key, "blocking cache wait timed out, treating as a miss");
                None
            }
        }
    }

    fn remove(&self, key: &CacheKey) {
        self.inner.remove(key);
        self.release(key);
    }

    fn clear(&self) {
        self.inner.clear();
    }

    fn size(&self) -> usize {
        self.inner.size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::PerpetualCache;

    #[test]
    fn a_fill_then_put_releases_the_lock_for_the_next_reader() {
        let cache = BlockingCache::new(Box::new(PerpetualCache::new("ns")), None);
        let key = CacheKey::new().update("k");
        assert_eq!(cache.get(&key), None);
        cache.put(key.clone(), Value::I64(7));
        assert_eq!(cache.get(&key), Some(Value::I64(7)));
    }

    #[test]
    fn a_hit_does_not_require_a_put_to_unlock() {
        let cache = BlockingCache::new(Box::new(PerpetualCache::new("ns")), None);
        let key = CacheKey::new().update("k");
        cache.put(key.clone(), Value::I64(1));
        assert_eq!(cache.get(&key), Some(Value::I64(1)));
        assert_eq!(cache.get(&key), Some(Value::I64(1)));
    }
}
