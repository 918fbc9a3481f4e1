//! Thread hydration with stale-while-revalidate caching
//!
//! Tracker records only carry thread ids. Rendering needs the messages, so
//! the ids of a page are resolved through the mail provider and cached under
//! the sorted, deduplicated id set. While a set is being (re)fetched the last
//! data for it is served; with `keep_previous_data` the most recent data of
//! any set is served when the requested set has never loaded.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::client::MailClient;
use crate::error::Result;
use crate::models::Thread;

/// Cache key: the set of requested thread ids
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(Vec<String>);

impl CacheKey {
    pub fn new(thread_ids: &[String]) -> Self {
        let mut ids = thread_ids.to_vec();
        ids.sort();
        ids.dedup();
        Self(ids)
    }

    pub fn thread_ids(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
struct CacheEntry {
    data: Option<Arc<Vec<Thread>>>,
    fetched_at: Option<Instant>,
    in_flight: bool,
    last_error: Option<String>,
}

/// What a view sees for one id set at one moment
#[derive(Debug, Clone, Default)]
pub struct HydrationSnapshot {
    pub data: Option<Arc<Vec<Thread>>>,
    pub is_loading: bool,
    /// Data belongs to a different id set or is past its freshness window
    pub is_stale: bool,
    pub error: Option<String>,
}

impl HydrationSnapshot {
    pub fn ready(threads: Vec<Thread>) -> Self {
        Self {
            data: Some(Arc::new(threads)),
            ..Default::default()
        }
    }

    pub fn loading() -> Self {
        Self {
            is_loading: true,
            ..Default::default()
        }
    }
}

/// LRU of hydrated thread sets with freshness tracking
pub struct ThreadCache {
    entries: LruCache<CacheKey, CacheEntry>,
    latest: Option<Arc<Vec<Thread>>>,
    stale_after: Duration,
}

impl ThreadCache {
    pub fn new(capacity: NonZeroUsize, stale_after: Duration) -> Self {
        Self {
            entries: LruCache::new(capacity),
            latest: None,
            stale_after,
        }
    }

    fn is_fresh(entry: &CacheEntry, stale_after: Duration, now: Instant) -> bool {
        entry.data.is_some()
            && entry
                .fetched_at
                .is_some_and(|at| now.saturating_duration_since(at) < stale_after)
    }

    /// Current state for `key` without triggering a fetch
    pub fn snapshot(&mut self, key: &CacheKey, keep_previous_data: bool, now: Instant) -> HydrationSnapshot {
        if key.is_empty() {
            return HydrationSnapshot::ready(Vec::new());
        }

        let latest = self.latest.clone();
        let stale_after = self.stale_after;
        match self.entries.get(key) {
            Some(entry) => {
                let fresh = Self::is_fresh(entry, stale_after, now);
                match &entry.data {
                    Some(data) => HydrationSnapshot {
                        data: Some(Arc::clone(data)),
                        is_loading: entry.in_flight,
                        is_stale: !fresh,
                        error: entry.last_error.clone(),
                    },
                    None => HydrationSnapshot {
                        is_stale: keep_previous_data && latest.is_some(),
                        data: latest.filter(|_| keep_previous_data),
                        is_loading: entry.in_flight,
                        error: entry.last_error.clone(),
                    },
                }
            }
            None => HydrationSnapshot {
                is_stale: keep_previous_data && latest.is_some(),
                data: latest.filter(|_| keep_previous_data),
                is_loading: false,
                error: None,
            },
        }
    }

    /// Mark `key` in flight if it needs (re)fetching
    ///
    /// Returns false when the key is fresh or a fetch is already running, in
    /// which case the caller must not fetch.
    pub fn begin_fetch(&mut self, key: &CacheKey, now: Instant) -> bool {
        if key.is_empty() {
            return false;
        }
        if let Some(entry) = self.entries.peek(key) {
            if entry.in_flight || Self::is_fresh(entry, self.stale_after, now) {
                return false;
            }
        }

        let entry = self.entries.get_or_insert_mut(key.clone(), CacheEntry::default);
        entry.in_flight = true;
        true
    }

    /// Store the outcome of a fetch started with [`begin_fetch`](Self::begin_fetch)
    pub fn complete_fetch(&mut self, key: &CacheKey, result: Result<Vec<Thread>>, now: Instant) {
        let entry = self.entries.get_or_insert_mut(key.clone(), CacheEntry::default);
        entry.in_flight = false;
        match result {
            Ok(threads) => {
                let data = Arc::new(threads);
                entry.data = Some(Arc::clone(&data));
                entry.fetched_at = Some(now);
                entry.last_error = None;
                self.latest = Some(data);
            }
            Err(e) => {
                warn!("Failed to hydrate {} thread(s): {}", key.thread_ids().len(), e);
                entry.last_error = Some(e.to_string());
            }
        }
    }

    /// Expire every entry so the next read refetches, keeping data to serve meanwhile
    pub fn invalidate_all(&mut self) {
        for (_, entry) in self.entries.iter_mut() {
            entry.fetched_at = None;
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Resolves thread ids to full threads through a [`ThreadCache`]
pub struct ThreadHydrator {
    client: Arc<dyn MailClient>,
    cache: Mutex<ThreadCache>,
    keep_previous_data: bool,
}

impl ThreadHydrator {
    pub fn new(client: Arc<dyn MailClient>, cache: ThreadCache, keep_previous_data: bool) -> Self {
        Self {
            client,
            cache: Mutex::new(cache),
            keep_previous_data,
        }
    }

    fn with_cache<T>(&self, f: impl FnOnce(&mut ThreadCache) -> T) -> T {
        // A panic while holding the lock leaves the cache consistent enough to keep serving
        let mut cache = match self.cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut cache)
    }

    /// Current state without fetching
    pub fn snapshot(&self, thread_ids: &[String]) -> HydrationSnapshot {
        let key = CacheKey::new(thread_ids);
        let keep = self.keep_previous_data;
        self.with_cache(|cache| cache.snapshot(&key, keep, Instant::now()))
    }

    async fn fetch_and_store(&self, key: &CacheKey) {
        debug!("Hydrating {} thread(s)", key.thread_ids().len());
        let result = self.client.get_threads_by_ids(key.thread_ids()).await;
        self.with_cache(|cache| cache.complete_fetch(key, result, Instant::now()));
    }

    /// Return the current state immediately and revalidate in the background
    ///
    /// The returned snapshot already reflects the in-flight fetch, so a view
    /// with nothing cached shows a loading state instead of an empty list.
    pub fn hydrate_in_background(
        self: &Arc<Self>,
        thread_ids: &[String],
    ) -> (HydrationSnapshot, Option<JoinHandle<()>>) {
        let key = CacheKey::new(thread_ids);
        let keep = self.keep_previous_data;
        let (should_fetch, snapshot) = self.with_cache(|cache| {
            let now = Instant::now();
            let started = cache.begin_fetch(&key, now);
            (started, cache.snapshot(&key, keep, now))
        });

        if !should_fetch {
            return (snapshot, None);
        }

        let hydrator = Arc::clone(self);
        let handle = tokio::spawn(async move {
            hydrator.fetch_and_store(&key).await;
        });
        (snapshot, Some(handle))
    }

    /// Force the next hydration of every id set to refetch
    pub fn invalidate(&self) {
        self.with_cache(|cache| cache.invalidate_all());
    }
}
