use std::collections::VecDeque;

use parking_lot::Mutex;

use super::{CacheImpl, CacheKey};
use crate::value::Value;

/// First-in-first-out eviction (`spec.md` §4.3/§6): insertion order alone
/// decides what gets evicted once the store grows past `limit` — unlike
/// [`super::lru::LruCache`], a `get` never reorders the queue.
pub struct FifoCache {
    inner: Box<dyn CacheImpl>,
    order: Mutex<VecDeque<CacheKey>>,
    limit: usize,
}

impl FifoCache {
    pub fn new(inner: Box<dyn CacheImpl>, limit: usize) -> Self {
        Self { inner, order: Mutex::new(VecDeque::new()), limit: limit.max(1) }
    }
}

impl CacheImpl for FifoCache {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn put(&self, key: CacheKey, value: Value) {
        self.inner.put(key.clone(), value);
        let mut order = self.order.lock();
        if !order.contains(&key) {
            order.push_back(key);
        }
        while order.len() > self.limit {
            if let Some(evicted) = order.pop_front() {
                self.inner.remove(&evicted);
            }
        }
    }

    fn get(&self, key: &CacheKey) -> Option<Value> {
        self.inner.get(key)
    }

    fn remove(&self, key: &CacheKey) {
        self.inner.remove(key);
        self.order.lock().retain(|k| k != key);
    }

    fn clear(&self) {
        self.inner.clear();
        self.order.lock().clear();
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
    fn reads_never_postpone_eviction() {
        let cache = FifoCache::new(Box::new(PerpetualCache::new("ns")), 2);
        let (a, b, c) = (
            CacheKey::new().update("a"),
            CacheKey::new().update("b"),
            CacheKey::new().update("c"),
        );
        cache.put(a.clone(), Value::I64(1));
        cache.put(b.clone(), Value::I64(2));
        cache.get(&a);
        cache.put(c.clone(), Value::I64(3));
        assert_eq!(cache.get(&a), None);
        assert_eq!(cache.get(&b), Some(Value::I64(2)));
    }
}
