use crate::constants::{CACHE_MAX_TTL_SECS, CACHE_MAX_TOMBSTONES, DEFAULT_CACHE_CAPACITY};
use lru::LruCache;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::time::{Duration, Instant};

type AnyValue = Arc<dyn Any + Send + Sync>;

/// A cached value with its freshness window.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub data: T,
    pub stored_at: Instant,
    pub expires_at: Instant,
}

impl<T> CacheEntry<T> {
    pub fn is_fresh(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

struct CacheState {
    entries: LruCache<String, CacheEntry<AnyValue>>,
    // Bumped by every clear; clears record the value they produced.
    generation: u64,
    cleared_keys: HashMap<String, u64>,
    cleared_prefixes: HashMap<String, u64>,
    cleared_all: u64,
}

impl CacheState {
    // Internal helper that checks whether `key` was cleared after `generation`.
    fn cleared_since(&self, key: &str, generation: u64) -> bool {
        self.cleared_all > generation
            || self.cleared_keys.get(key).is_some_and(|at| *at > generation)
            || self
                .cleared_prefixes
                .iter()
                .any(|(prefix, at)| *at > generation && key.starts_with(prefix.as_str()))
    }

    fn next_generation(&mut self) -> u64 {
        if self.cleared_keys.len() + self.cleared_prefixes.len() > CACHE_MAX_TOMBSTONES {
            // Every tombstone is <= the current generation, so one
            // cache-wide mark at that generation covers them all.
            self.cleared_keys.clear();
            self.cleared_prefixes.clear();
            self.cleared_all = self.generation;
        }
        self.generation += 1;
        self.generation
    }
}

/// Bounded, thread-safe TTL cache keyed by caller-chosen strings.
///
/// Values of any `Clone + Send + Sync` type are stored type-erased; reading a
/// key back with a different type is a miss. Least-recently-used entries are
/// evicted once `capacity` is reached. Clears are stamped with a generation so
/// a writer that read [`CacheStore::generation`] before a clear of *its* key
/// (or a matching prefix) can be told apart; clears of other keys don't
/// affect it.
pub struct CacheStore {
    state: Mutex<CacheState>,
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl CacheStore {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            state: Mutex::new(CacheState {
                entries: LruCache::new(capacity),
                generation: 0,
                cleared_keys: HashMap::new(),
                cleared_prefixes: HashMap::new(),
                cleared_all: 0,
            }),
        }
    }

    pub fn get<T>(&self, key: &str) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.entry::<T>(key).map(|entry| entry.data)
    }

    pub fn entry<T>(&self, key: &str) -> Option<CacheEntry<T>>
    where
        T: Clone + Send + Sync + 'static,
    {
        let mut state = self.state.lock();
        let entry = state.entries.get(key)?;
        let Some(data) = entry.data.downcast_ref::<T>() else {
            tracing::warn!("cache key {} holds a different type; treating as miss", key);
            return None;
        };
        Some(CacheEntry {
            data: data.clone(),
            stored_at: entry.stored_at,
            expires_at: entry.expires_at,
        })
    }

    pub fn set<T>(&self, key: &str, data: T, ttl: Duration)
    where
        T: Clone + Send + Sync + 'static,
    {
        let mut state = self.state.lock();
        Self::insert(&mut state, key, data, ttl);
    }

    /// Writes only if `key` was not cleared since `generation` was read.
    pub fn set_if_generation<T>(&self, key: &str, data: T, ttl: Duration, generation: u64) -> bool
    where
        T: Clone + Send + Sync + 'static,
    {
        let mut state = self.state.lock();
        if state.cleared_since(key, generation) {
            tracing::debug!("cache key {} was invalidated during fetch; dropping result", key);
            return false;
        }
        Self::insert(&mut state, key, data, ttl);
        true
    }

    fn insert<T>(state: &mut CacheState, key: &str, data: T, ttl: Duration)
    where
        T: Clone + Send + Sync + 'static,
    {
        let stored_at = Instant::now();
        // Oversized TTLs mean "keep until cleared".
        let ttl = ttl.min(Duration::from_secs(CACHE_MAX_TTL_SECS));
        let expires_at = stored_at
            .checked_add(ttl)
            .unwrap_or_else(|| stored_at + Duration::from_secs(86_400));
        let entry = CacheEntry {
            data: Arc::new(data) as AnyValue,
            stored_at,
            expires_at,
        };
        if let Some((evicted, _)) = state.entries.push(key.to_string(), entry) {
            if evicted != key {
                tracing::debug!("cache evicted least recently used key {}", evicted);
            }
        }
    }

    /// `true` only if the key exists and `now < expires_at`.
    pub fn is_fresh(&self, key: &str) -> bool {
        let state = self.state.lock();
        state
            .entries
            .peek(key)
            .map(|entry| Instant::now() < entry.expires_at)
            .unwrap_or(false)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.state.lock().entries.contains(key)
    }

    pub fn clear(&self, key: &str) {
        let mut state = self.state.lock();
        let generation = state.next_generation();
        state.cleared_keys.insert(key.to_string(), generation);
        state.entries.pop(key);
    }

    /// Clears every key starting with `prefix`, e.g. all `userBets-` keys.
    pub fn clear_prefix(&self, prefix: &str) -> usize {
        let mut state = self.state.lock();
        let generation = state.next_generation();
        state.cleared_prefixes.insert(prefix.to_string(), generation);
        let keys: Vec<String> = state
            .entries
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &keys {
            state.entries.pop(key.as_str());
        }
        keys.len()
    }

    pub fn clear_all(&self) {
        let mut state = self.state.lock();
        let generation = state.next_generation();
        state.cleared_keys.clear();
        state.cleared_prefixes.clear();
        state.cleared_all = generation;
        state.entries.clear();
    }

    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.state.lock().entries.cap().get()
    }
}
