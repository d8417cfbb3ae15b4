use crate::{
    config::Config,
    constants::CACHE_DEFAULT_TTL_SECS,
    error::Result,
    services::{cache_store::CacheStore, retry::{run_with_retry, RetryPolicy}},
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::AbortHandle;
use tokio::time::Duration;

/// Per-call read settings.
#[derive(Debug, Clone)]
pub struct FetchOptions<T> {
    pub ttl: Duration,
    pub stale_while_revalidate: bool,
    pub retry_policy: RetryPolicy,
    /// Returned (and not cached) when a blocking fetch fails.
    pub fallback: Option<T>,
}

impl<T> Default for FetchOptions<T> {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(CACHE_DEFAULT_TTL_SECS),
            stale_while_revalidate: true,
            retry_policy: RetryPolicy::default(),
            fallback: None,
        }
    }
}

impl<T> FetchOptions<T> {
    pub fn from_config(config: &Config) -> Self {
        Self {
            ttl: config.cache_default_ttl(),
            retry_policy: RetryPolicy::from_config(config),
            ..Self::default()
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_stale_while_revalidate(mut self, enabled: bool) -> Self {
        self.stale_while_revalidate = enabled;
        self
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn with_fallback(mut self, fallback: T) -> Self {
        self.fallback = Some(fallback);
        self
    }
}

struct Revalidation {
    id: u64,
    handle: AbortHandle,
}

/// Cached reads with retry, stale-while-revalidate and per-key single-flight.
///
/// Writers are expected to call [`FetchCoordinator::invalidate`] for the keys
/// a confirmed transaction affects; nothing is invalidated automatically.
pub struct FetchCoordinator {
    cache: Arc<CacheStore>,
    fetch_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    revalidations: Arc<Mutex<HashMap<String, Revalidation>>>,
    next_revalidation_id: AtomicU64,
}

impl FetchCoordinator {
    pub fn new(cache: Arc<CacheStore>) -> Self {
        Self {
            cache,
            fetch_locks: Mutex::new(HashMap::new()),
            revalidations: Arc::new(Mutex::new(HashMap::new())),
            next_revalidation_id: AtomicU64::new(0),
        }
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    /// Reads `key` from cache or through `operation`.
    ///
    /// * fresh entry: returned without calling `operation`;
    /// * stale entry with revalidation enabled: returned at once while one
    ///   background refresh runs;
    /// * otherwise: `operation` runs under the retry policy and the result is
    ///   cached; on failure the fallback is returned if configured.
    pub async fn fetch<T, F, Fut>(&self, key: &str, operation: F, options: FetchOptions<T>) -> Result<T>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        if let Some(entry) = self.cache.entry::<T>(key) {
            if entry.is_fresh() {
                tracing::debug!("cache hit {}", key);
                return Ok(entry.data);
            }
            if options.stale_while_revalidate {
                tracing::debug!("cache stale {}; serving stale value", key);
                self.spawn_revalidation(key, operation, options.ttl, options.retry_policy);
                return Ok(entry.data);
            }
        }

        self.fetch_blocking(key, operation, options).await
    }

    async fn fetch_blocking<T, F, Fut>(&self, key: &str, operation: F, options: FetchOptions<T>) -> Result<T>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let lock = self.fetch_lock_for(key);
        let result = {
            let _guard = lock.lock().await;

            // Another caller may have filled the key while we waited.
            match self.cache.entry::<T>(key) {
                Some(entry) if entry.is_fresh() => {
                    tracing::debug!("cache hit {} after waiting for in-flight fetch", key);
                    Ok(entry.data)
                }
                _ => {
                    tracing::debug!("cache miss {}", key);
                    let generation = self.cache.generation();
                    run_with_retry(&options.retry_policy, key, || operation())
                        .await
                        .map(|value| {
                            self.cache
                                .set_if_generation(key, value.clone(), options.ttl, generation);
                            value
                        })
                }
            }
        };
        self.release_fetch_lock(key, lock);

        match result {
            Ok(value) => Ok(value),
            Err(err) => match options.fallback {
                Some(fallback) => {
                    tracing::warn!("fetch {} failed, using fallback: {}", key, err);
                    Ok(fallback)
                }
                None => Err(err),
            },
        }
    }

    // Internal helper that returns the shared lock for `key`.
    fn fetch_lock_for(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.fetch_locks
            .lock()
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    // Internal helper that drops the lock entry once nobody else is waiting on it.
    fn release_fetch_lock(&self, key: &str, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.fetch_locks.lock();
        let unused = locks
            .get(key)
            .map(|held| Arc::ptr_eq(held, &lock) && Arc::strong_count(held) <= 2)
            .unwrap_or(false);
        if unused {
            locks.remove(key);
        }
    }

    fn spawn_revalidation<T, F, Fut>(&self, key: &str, operation: F, ttl: Duration, policy: RetryPolicy)
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let mut revalidations = self.revalidations.lock();
        if revalidations.contains_key(key) {
            tracing::debug!("revalidation of {} already in flight", key);
            return;
        }

        let id = self.next_revalidation_id.fetch_add(1, Ordering::Relaxed);
        let generation = self.cache.generation();
        let cache = self.cache.clone();
        let registry = self.revalidations.clone();
        let task_key = key.to_string();

        let handle = tokio::spawn(async move {
            match run_with_retry(&policy, &task_key, || operation()).await {
                Ok(value) => {
                    if cache.set_if_generation(&task_key, value, ttl, generation) {
                        tracing::debug!("revalidated {}", task_key);
                    }
                }
                Err(err) => {
                    tracing::warn!(
                        "background revalidation of {} failed, keeping stale value: {}",
                        task_key,
                        err
                    );
                }
            }
            let mut registry = registry.lock();
            if registry.get(&task_key).map(|r| r.id) == Some(id) {
                registry.remove(&task_key);
            }
        });

        revalidations.insert(
            key.to_string(),
            Revalidation {
                id,
                handle: handle.abort_handle(),
            },
        );
    }

    /// Clears `key` and cancels its in-flight revalidation.
    pub fn invalidate(&self, key: &str) {
        self.cache.clear(key);
        if let Some(revalidation) = self.revalidations.lock().remove(key) {
            revalidation.handle.abort();
            tracing::debug!("cancelled revalidation of {}", key);
        }
    }

    /// Clears every key starting with `prefix`; returns how many entries were removed.
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let removed = self.cache.clear_prefix(prefix);
        self.revalidations.lock().retain(|key, revalidation| {
            if key.starts_with(prefix) {
                revalidation.handle.abort();
                false
            } else {
                true
            }
        });
        removed
    }

    pub fn invalidate_all(&self) {
        self.cache.clear_all();
        self.shutdown();
    }

    /// Cancels every background revalidation; cached entries are kept.
    pub fn shutdown(&self) {
        for (_, revalidation) in self.revalidations.lock().drain() {
            revalidation.handle.abort();
        }
    }

    pub fn revalidations_in_flight(&self) -> usize {
        self.revalidations.lock().len()
    }
}

impl Drop for FetchCoordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}
