//! The Cache Layer (`spec.md` §4.3): base perpetual store → eviction
//! decorator (LRU/FIFO) → optional blocking → optional transactional
//! overlay.
//!
//! No teacher counterpart — `asphalt_core` has no statement cache — so this
//! is grounded directly in `spec.md` §4.3's decorator-chain description,
//! built the way `asphalt_core::connection`'s trait-object seams are built
//! (a small object-safe trait, concrete structs composing it by holding a
//! boxed inner).

mod blocking;
mod fifo;
mod key;
mod lru;
mod perpetual;
mod transactional;

pub use blocking::BlockingCache;
pub use fifo::FifoCache;
pub use key::CacheKey;
pub use lru::LruCache;
pub use perpetual::PerpetualCache;
pub use transactional::TransactionalCache;

use crate::value::Value;

/// A namespace-scoped key/value store (`spec.md` §3's "Cache").
///
/// Implementations are composed as a decorator chain; every layer forwards
/// to an inner `Cache` except [`PerpetualCache`], the base store.
pub trait CacheImpl: Send + Sync {
    fn id(&self) -> &str;
    fn put(&self, key: CacheKey, value: Value);
    fn get(&self, key: &CacheKey) -> Option<Value>;
    fn remove(&self, key: &CacheKey);
    fn clear(&self);
    fn size(&self) -> usize;
}

/// A fully assembled cache: an opaque namespace identifier plus the
/// decorator chain configured for it. Stored in the catalogue and shared
/// via `Arc` across sessions (`spec.md` §5: "second-level caches are
/// shared").
pub struct Cache {
    pub namespace: String,
    inner: Box<dyn CacheImpl>,
}

impl Cache {
    pub fn new(namespace: impl Into<String>, inner: Box<dyn CacheImpl>) -> Self {
        Self { namespace: namespace.into(), inner }
    }

    pub fn put(&self, key: CacheKey, value: Value) {
        self.inner.put(key, value);
    }

    pub fn get(&self, key: &CacheKey) -> Option<Value> {
        self.inner.get(key)
    }

    pub fn remove(&self, key: &CacheKey) {
        self.inner.remove(key);
    }

    pub fn clear(&self) {
        self.inner.clear();
    }

    pub fn size(&self) -> usize {
        self.inner.size()
    }
}

/// Eviction policy selected by a `<cache eviction="...">` attribute
/// (`spec.md` §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eviction {
    Lru,
    Fifo,
}

/// Builds the decorator chain for one namespace's shared cache per
/// `spec.md` §4.3/§6: base perpetual store, eviction, optional blocking.
/// The transactional overlay ([`TransactionalCache`]) is not part of this
/// chain — it wraps the shared `Cache` fresh per session, built by the
/// executor's cache-consulting layer (`spec.md` §5: every session sees its
/// own buffered view until commit).
pub struct CacheBuilder {
    id: String,
    eviction: Eviction,
    size: usize,
    blocking: bool,
    blocking_timeout: Option<std::time::Duration>,
}

impl CacheBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), eviction: Eviction::Lru, size: 1024, blocking: false, blocking_timeout: None }
    }

    pub fn eviction(mut self, eviction: Eviction) -> Self {
        self.eviction = eviction;
        self
    }

    pub fn size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    pub fn blocking(mut self, blocking: bool, timeout: Option<std::time::Duration>) -> Self {
        self.blocking = blocking;
        self.blocking_timeout = timeout;
        self
    }

    pub fn build(self) -> Cache {
        let base: Box<dyn CacheImpl> = Box::new(PerpetualCache::new(self.id.clone()));
        let evicted: Box<dyn CacheImpl> = match self.eviction {
            Eviction::Lru => Box::new(LruCache::new(base, self.size)),
            Eviction::Fifo => Box::new(FifoCache::new(base, self.size)),
        };
        let maybe_blocking: Box<dyn CacheImpl> = if self.blocking {
            Box::new(BlockingCache::new(evicted, self.blocking_timeout))
        } else {
            evicted
        };
        Cache::new(self.id, maybe_blocking)
    }
}
