use dashmap::DashMap;

use super::{CacheImpl, CacheKey};
use crate::value::Value;

/// The base store every decorator eventually bottoms out at. Holds entries
/// forever; eviction, blocking and transactional semantics are layered on
/// top by the other decorators (`spec.md` §4.3).
pub struct PerpetualCache {
    id: String,
    store: DashMap<CacheKey, Value>,
}

impl PerpetualCache {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), store: DashMap::new() }
    }
}

impl CacheImpl for PerpetualCache {
    fn id(&self) -> &str {
        &self.id
    }

    fn put(&self, key: CacheKey, value: Value) {
        self.store.insert(key, value);
    }

    fn get(&self, key: &CacheKey) -> Option<Value> {
        self.store.get(key).map(|entry| entry.value().clone())
    }

    fn remove(&self, key: &CacheKey) {
        self.store.remove(key);
    }

    fn clear(&self) {
        self.store.clear();
    }

    fn size(&self) -> usize {
        self.store.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_round_trips() {
        let cache = PerpetualCache::new("ns");
        let key = CacheKey::new().update("k");
        cache.put(key.clone(), Value::I64(1));
        assert_eq!(cache.get(&key), Some(Value::I64(1)));
        assert_eq!(cache.size(), 1);
    }
}
