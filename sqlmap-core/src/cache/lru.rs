use std::collections::VecDeque;

use parking_lot::Mutex;

use super::{CacheImpl, CacheKey};
use crate::value::Value;

/// Least-recently-used eviction (`spec.md` §4.3/§6): a `get` hit moves its
/// key to the back of the recency queue ("second chance"); once the queue
/// grows past `limit`, the front (coldest) key is evicted from the inner
/// store.
pub struct LruCache {
    inner: Box<dyn CacheImpl>,
    order: Mutex<VecDeque<CacheKey>>,
    limit: usize,
}

impl LruCache {
    pub fn new(inner: Box<dyn CacheImpl>, limit: usize) -> Self {
        Self { inner, order: Mutex::new(VecDeque::new()), limit: limit.max(1) }
    }

    fn touch(&self, key: &CacheKey) {
        let mut order = self.order.lock();
        if let Some(pos) = order.iter().position(|k| k == key) {
            let key = order.remove(pos).expect("position just found");
            order.push_back(key);
        }
    }
}

impl CacheImpl for LruCache {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn put(&self, key: CacheKey, value: Value) {
        self.inner.put(key.clone(), value);
        let mut order = self.order.lock();
        order.retain(|k| k != &key);
        order.push_back(key);
        while order.len() > self.limit {
            if let Some(evicted) = order.pop_front() {
                self.inner.remove(&evicted);
            }
        }
    }

    fn get(&self, key: &CacheKey) -> Option<Value> {
        let value = self.inner.get(key);
        if value.is_some() {
            self.touch(key);
        }
        value
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
    fn evicts_coldest_key_past_limit() {
        let cache = LruCache::new(Box::new(PerpetualCache::new("ns")), 2);
        let (a, b, c) = (
            CacheKey::new().update("a"),
            CacheKey::new().update("b"),
            CacheKey::new().update("c"),
        );
        cache.put(a.clone(), Value::I64(1));
        cache.put(b.clone(), Value::I64(2));
        cache.put(c.clone(), Value::I64(3));
        assert_eq!(cache.get(&a), None);
        assert_eq!(cache.get(&b), Some(Value::I64(2)));
        assert_eq!(cache.get(&c), Some(Value::I64(3)));
    }

    #[test]
    fn touching_a_key_spares_it_from_eviction() {
        let cache = LruCache::new(Box::new(PerpetualCache::new("ns")), 2);
        let (a, b, c) = (
            CacheKey::new().update("a"),
            CacheKey::new().update("b"),
            CacheKey::new().update("c"),
        );
        cache.put(a.clone(), Value::I64(1));
        cache.put(b.clone(), Value::I64(2));
        cache.get(&a);
        cache.put(c.clone(), Value::I64(3));
        assert_eq!(cache.get(&a), Some(Value::I64(1)));
        assert_eq!(cache.get(&b), None);
    }
}
