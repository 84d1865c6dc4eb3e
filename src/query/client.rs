//! The process-wide query cache.
//!
//! [`QueryClient`] owns every [`CacheEntry`]. Consumers never hold an entry;
//! they hold a [`QueryKey`] and a [`CacheSubscription`] guard, and receive
//! [`EntrySnapshot`]s through listeners.
//!
//! # Notification order
//!
//! Listeners run only after the entry update is complete and no internal lock
//! is held. A listener may call back into the client (fetch, invalidate,
//! subscribe); notifications raised that way are queued and delivered by the
//! outer dispatch loop once the current listener returns.

use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::Command;
use crate::error::QueryError;
use crate::timer::{Timer, TokioTimer};

use super::cache::{CacheEntry, EntrySnapshot, ErasedData, ErasedLoader, Listener, SharedFetch};
use super::config::QueryConfig;
use super::key::{KeyFilter, QueryKey};

type Notification = (Vec<Listener>, EntrySnapshot);

#[derive(Default)]
struct NotifyQueue {
    pending: VecDeque<Notification>,
    draining: bool,
}

/// Serializes listener delivery and flattens re-entrant notifications.
#[derive(Default)]
struct Notifier {
    queue: Mutex<NotifyQueue>,
}

impl Notifier {
    fn dispatch(&self, notification: Notification) {
        {
            let mut queue = self.queue.lock();
            queue.pending.push_back(notification);
            if queue.draining {
                return;
            }
            queue.draining = true;
        }

        let guard = DrainGuard(self);
        loop {
            let next = {
                let mut queue = self.queue.lock();
                let next = queue.pending.pop_front();
                // Cleared under the lock that saw the queue empty.
                if next.is_none() {
                    queue.draining = false;
                }
                next
            };
            let Some((listeners, snapshot)) = next else {
                break;
            };
            for listener in listeners {
                listener(&snapshot);
            }
        }
        std::mem::forget(guard);
    }
}

/// Releases the drain flag if a listener panics mid-delivery.
struct DrainGuard<'a>(&'a Notifier);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.queue.lock().draining = false;
    }
}

struct Inner {
    cache: DashMap<QueryKey, CacheEntry>,
    config: QueryConfig,
    timer: Arc<dyn Timer>,
    notifier: Notifier,
    next_listener: AtomicU64,
}

/// A client for managing the query cache, fetch de-duplication and invalidation.
///
/// Cloning is cheap; clones share the same cache. Create one at startup and
/// pass it to every consumer.
///
/// # Example
///
/// ```rust
/// use workervet_query::query::{QueryClient, QueryConfig};
/// use std::time::Duration;
///
/// let config = QueryConfig::new(
///     Duration::from_secs(30),  // stale_time
///     Duration::from_secs(300), // cache_time
/// );
///
/// let client = QueryClient::with_config(config);
/// assert!(client.is_empty());
/// ```
#[derive(Clone)]
pub struct QueryClient {
    inner: Arc<Inner>,
}

/// Snapshot of an entry's data, taken before an optimistic write.
#[derive(Clone)]
pub struct QueryDataSnapshot {
    key: QueryKey,
    data: Option<ErasedData>,
}

impl QueryDataSnapshot {
    #[must_use]
    pub const fn key(&self) -> &QueryKey {
        &self.key
    }
}

impl std::fmt::Debug for QueryDataSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryDataSnapshot")
            .field("key", &self.key.to_string())
            .field("has_data", &self.data.is_some())
            .finish()
    }
}

impl QueryClient {
    /// Creates a new query client with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(QueryConfig::default())
    }

    /// Creates a new query client with the given configuration.
    #[must_use]
    pub fn with_config(config: QueryConfig) -> Self {
        Self::with_timer(config, Arc::new(TokioTimer::new()))
    }

    /// Creates a client driven by the given timer.
    #[must_use]
    pub fn with_timer(config: QueryConfig, timer: Arc<dyn Timer>) -> Self {
        Self {
            inner: Arc::new(Inner {
                cache: DashMap::new(),
                config,
                timer,
                notifier: Notifier::default(),
                next_listener: AtomicU64::new(0),
            }),
        }
    }

    /// Gets the query configuration.
    #[must_use]
    pub fn config(&self) -> &QueryConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn timer(&self) -> Arc<dyn Timer> {
        self.inner.timer.clone()
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.cache.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.cache.is_empty()
    }

    #[must_use]
    pub fn contains(&self, key: &QueryKey) -> bool {
        self.inner.cache.contains_key(key)
    }

    /// Returns the entry for `key`, or a fresh idle snapshot if none exists.
    #[must_use]
    pub fn get(&self, key: &QueryKey) -> EntrySnapshot {
        self.inner
            .cache
            .get(key)
            .map_or_else(|| EntrySnapshot::idle(key.clone()), |entry| entry.snapshot())
    }

    #[must_use]
    pub fn subscriber_count(&self, key: &QueryKey) -> usize {
        self.inner
            .cache
            .get(key)
            .map_or(0, |entry| entry.subscriber_count())
    }

    /// Returns `true` if `key` holds a successful result younger than `stale_time`.
    #[must_use]
    pub fn is_fresh(&self, key: &QueryKey) -> bool {
        let now = self.inner.timer.now();
        self.inner
            .cache
            .get(key)
            .is_some_and(|entry| entry.is_fresh(self.inner.config.stale_time, now))
    }

    /// Fetches `key` with `fetcher`, sharing any fetch already in flight.
    ///
    /// The entry moves to `Loading` before this returns, so a second caller in
    /// the same tick joins the first request instead of issuing its own. The
    /// fetch runs to completion even if the returned future is dropped.
    pub fn fetch<V, F>(&self, key: &QueryKey, fetcher: F) -> BoxFuture<'static, Result<Arc<V>, QueryError>>
    where
        V: Send + Sync + 'static,
        F: Fn() -> BoxFuture<'static, Result<V, QueryError>> + Send + Sync + 'static,
    {
        let shared = self.start_fetch(key, erase(fetcher), false);
        typed(key.clone(), shared)
    }

    /// Fetches `key` unconditionally, superseding any fetch in flight.
    ///
    /// The superseded response is discarded when it arrives, so results land
    /// in the order the fetches were issued.
    pub fn refetch<V, F>(&self, key: &QueryKey, fetcher: F) -> BoxFuture<'static, Result<Arc<V>, QueryError>>
    where
        V: Send + Sync + 'static,
        F: Fn() -> BoxFuture<'static, Result<V, QueryError>> + Send + Sync + 'static,
    {
        let shared = self.start_fetch(key, erase(fetcher), true);
        typed(key.clone(), shared)
    }

    pub(crate) fn fetch_erased(&self, key: &QueryKey, loader: ErasedLoader, force: bool) -> SharedFetch {
        self.start_fetch(key, loader, force)
    }

    /// Registers `listener` for updates to `key`.
    ///
    /// Creates the entry if needed and cancels any pending eviction. Dropping
    /// the returned guard unsubscribes.
    pub fn subscribe(
        &self,
        key: &QueryKey,
        listener: impl Fn(&EntrySnapshot) + Send + Sync + 'static,
    ) -> CacheSubscription {
        let id = self.inner.next_listener.fetch_add(1, Ordering::Relaxed);
        let now = self.inner.timer.now();
        {
            let mut entry = self
                .inner
                .cache
                .entry(key.clone())
                .or_insert_with(|| CacheEntry::new(key.clone(), now));
            entry.listeners.insert(id, Arc::new(listener));
            entry.idle_since = None;
            if let Some(timer) = entry.gc_timer.take() {
                timer.cancel();
            }
            debug!(key = %key, subscribers = entry.subscriber_count(), "subscribed");
        }
        CacheSubscription {
            client: self.clone(),
            key: key.clone(),
            id,
        }
    }

    /// Marks every entry matching `filter` stale.
    ///
    /// Entries with live subscribers refetch immediately; the rest refetch the
    /// next time someone subscribes. Returns the number of matching entries.
    pub fn invalidate(&self, filter: &KeyFilter) -> usize {
        let keys: Vec<QueryKey> = self
            .inner
            .cache
            .iter()
            .filter(|entry| filter.matches(entry.key()))
            .map(|entry| entry.key().clone())
            .collect();

        for key in &keys {
            let (notification, refetch) = {
                let Some(mut entry) = self.inner.cache.get_mut(key) else {
                    continue;
                };
                entry.mark_stale();
                let refetch = if entry.listeners.is_empty() {
                    None
                } else {
                    entry.loader.clone()
                };
                ((entry.listeners(), entry.snapshot()), refetch)
            };
            self.inner.notifier.dispatch(notification);
            if let Some(loader) = refetch {
                self.start_fetch(key, loader, true);
            }
        }

        info!(filter = ?filter, matched = keys.len(), "invalidated queries");
        keys.len()
    }

    /// Invalidates as a side effect of a [`Command`].
    ///
    /// The command completes without producing any messages.
    pub fn invalidate_command<Msg>(&self, filter: impl Into<KeyFilter>) -> Command<Msg>
    where
        Msg: Send + 'static,
    {
        let client = self.clone();
        let filter = filter.into();

        Command {
            stream: Some(
                futures::stream::once(async move {
                    client.invalidate(&filter);
                })
                .filter_map(|()| async { None })
                .boxed(),
            ),
        }
    }

    /// Reads cached data for `key`, if present and of type `V`.
    #[must_use]
    pub fn get_query_data<V: Send + Sync + 'static>(&self, key: &QueryKey) -> Option<Arc<V>> {
        let data = self.inner.cache.get(key)?.data.clone()?;
        data.downcast::<V>().ok()
    }

    /// Writes `value` as the data of `key`, returning what was there before.
    ///
    /// Subscribers are notified. Any fetch in flight for the key is abandoned.
    pub fn set_query_data<V: Send + Sync + 'static>(&self, key: &QueryKey, value: V) -> QueryDataSnapshot {
        let data: ErasedData = Arc::new(value);
        self.replace_data(key, Some(data))
    }

    /// Puts back data captured by [`set_query_data`](Self::set_query_data).
    pub fn restore(&self, snapshot: QueryDataSnapshot) {
        debug!(key = %snapshot.key, "restoring query data");
        self.replace_data(&snapshot.key, snapshot.data);
    }

    /// Evicts every entry that has been unobserved for longer than `cache_time`.
    pub fn collect_garbage(&self) -> usize {
        let now = self.inner.timer.now();
        let cache_time = self.inner.config.cache_time;
        let before = self.inner.cache.len();
        self.inner
            .cache
            .retain(|_, entry| !entry.should_gc(cache_time, now));
        let evicted = before.saturating_sub(self.inner.cache.len());
        if evicted > 0 {
            debug!(evicted, "collected idle queries");
        }
        evicted
    }

    /// Purges user-specific state, as on logout.
    ///
    /// Unobserved entries are removed. Observed entries return to `Idle` with
    /// their data dropped and any in-flight fetch abandoned.
    pub fn clear(&self) {
        let mut notifications = Vec::new();
        self.inner.cache.retain(|_, entry| {
            if entry.listeners.is_empty() {
                if let Some(timer) = entry.gc_timer.take() {
                    timer.cancel();
                }
                false
            } else {
                entry.reset();
                notifications.push((entry.listeners(), entry.snapshot()));
                true
            }
        });
        info!(retained = notifications.len(), "cleared query cache");
        for notification in notifications {
            self.inner.notifier.dispatch(notification);
        }
    }

    fn start_fetch(&self, key: &QueryKey, loader: ErasedLoader, force: bool) -> SharedFetch {
        let now = self.inner.timer.now();
        let (tx, rx) = oneshot::channel();
        let shared: SharedFetch = rx
            .map(|received| {
                received.unwrap_or_else(|_| Err(QueryError::FetchError("fetch task dropped".to_string())))
            })
            .boxed()
            .shared();

        let (generation, notification) = {
            let mut entry = self
                .inner
                .cache
                .entry(key.clone())
                .or_insert_with(|| CacheEntry::new(key.clone(), now));

            if !force {
                if let Some(in_flight) = &entry.in_flight {
                    debug!(key = %key, "joining in-flight fetch");
                    return in_flight.clone();
                }
            }

            let generation = entry.begin_fetch(loader.clone(), shared.clone());
            (generation, (entry.listeners(), entry.snapshot()))
        };

        debug!(key = %key, generation, force, "fetch started");
        self.inner.notifier.dispatch(notification);

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(key = %key, "no tokio runtime, fetch not started");
            let outcome = Err(QueryError::FetchError("no async runtime to run the fetch".to_string()));
            self.complete(key, generation, &outcome);
            let _ = tx.send(outcome);
            return shared;
        };

        let client = self.clone();
        let key = key.clone();
        runtime.spawn(async move {
            let outcome = client.run_loader(&key, &loader).await;
            client.complete(&key, generation, &outcome);
            let _ = tx.send(outcome);
        });

        shared
    }

    async fn run_loader(&self, key: &QueryKey, loader: &ErasedLoader) -> Result<ErasedData, QueryError> {
        let mut attempt = 0;
        loop {
            let outcome = AssertUnwindSafe(async { loader().await })
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Err(QueryError::FetchError("fetcher panicked".to_string())));

            match outcome {
                Err(err) if attempt < self.inner.config.retry && err.is_transient() => {
                    attempt += 1;
                    warn!(key = %key, attempt, error = %err, "fetch failed, retrying");
                    self.inner.timer.sleep(self.inner.config.retry_delay).await;
                }
                other => return other,
            }
        }
    }

    fn complete(&self, key: &QueryKey, generation: u64, outcome: &Result<ErasedData, QueryError>) {
        let now = self.inner.timer.now();
        let notification = {
            let Some(mut entry) = self.inner.cache.get_mut(key) else {
                debug!(key = %key, "response for evicted query dropped");
                return;
            };
            if !entry.complete(generation, outcome, now) {
                debug!(key = %key, generation, "discarding superseded response");
                return;
            }
            if entry.listeners.is_empty() {
                self.schedule_gc(&mut entry);
            }
            (entry.listeners(), entry.snapshot())
        };

        match outcome {
            Ok(_) => debug!(key = %key, generation, "fetch succeeded"),
            Err(err) => warn!(key = %key, generation, error = %err, "fetch failed"),
        }
        self.inner.notifier.dispatch(notification);
    }

    fn unsubscribe(&self, key: &QueryKey, id: u64) {
        let now = self.inner.timer.now();
        let Some(mut entry) = self.inner.cache.get_mut(key) else {
            return;
        };
        entry.listeners.remove(&id);
        debug!(key = %key, subscribers = entry.subscriber_count(), "unsubscribed");
        if entry.listeners.is_empty() {
            entry.idle_since = Some(now);
            self.schedule_gc(&mut entry);
        }
    }

    fn schedule_gc(&self, entry: &mut CacheEntry) {
        if let Some(timer) = entry.gc_timer.take() {
            timer.cancel();
        }
        let now = self.inner.timer.now();
        let idle_for = entry
            .idle_since
            .map_or(std::time::Duration::ZERO, |since| now.saturating_duration_since(since));
        let delay = self.inner.config.cache_time.saturating_sub(idle_for);

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let key = entry.key.clone();
        entry.gc_timer = Some(self.inner.timer.schedule(
            delay,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    QueryClient { inner }.evict_if_idle(&key);
                }
            }),
        ));
    }

    fn evict_if_idle(&self, key: &QueryKey) {
        let now = self.inner.timer.now();
        let cache_time = self.inner.config.cache_time;
        if self
            .inner
            .cache
            .remove_if(key, |_, entry| entry.should_gc(cache_time, now))
            .is_some()
        {
            debug!(key = %key, "evicted idle query");
        }
    }

    fn replace_data(&self, key: &QueryKey, data: Option<ErasedData>) -> QueryDataSnapshot {
        let now = self.inner.timer.now();
        let (previous, notification) = {
            let mut entry = self
                .inner
                .cache
                .entry(key.clone())
                .or_insert_with(|| CacheEntry::new(key.clone(), now));
            let previous = entry.set_data(data, now);
            (previous, (entry.listeners(), entry.snapshot()))
        };
        self.inner.notifier.dispatch(notification);
        QueryDataSnapshot {
            key: key.clone(),
            data: previous,
        }
    }
}

impl Default for QueryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for QueryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryClient")
            .field("entries", &self.inner.cache.len())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

/// Interest in one cache entry. Dropping it unsubscribes.
pub struct CacheSubscription {
    client: QueryClient,
    key: QueryKey,
    id: u64,
}

impl CacheSubscription {
    #[must_use]
    pub const fn key(&self) -> &QueryKey {
        &self.key
    }
}

impl Drop for CacheSubscription {
    fn drop(&mut self) {
        self.client.unsubscribe(&self.key, self.id);
    }
}

impl std::fmt::Debug for CacheSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheSubscription")
            .field("key", &self.key.to_string())
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

fn erase<V, F>(fetcher: F) -> ErasedLoader
where
    V: Send + Sync + 'static,
    F: Fn() -> BoxFuture<'static, Result<V, QueryError>> + Send + Sync + 'static,
{
    Arc::new(move || {
        fetcher()
            .map(|result| result.map(|value| Arc::new(value) as ErasedData))
            .boxed()
    })
}

fn typed<V: Send + Sync + 'static>(
    key: QueryKey,
    shared: SharedFetch,
) -> BoxFuture<'static, Result<Arc<V>, QueryError>> {
    async move { downcast::<V>(&key, shared.await?) }.boxed()
}

pub(crate) fn downcast<V: Send + Sync + 'static>(key: &QueryKey, data: ErasedData) -> Result<Arc<V>, QueryError> {
    data.downcast::<V>().map_err(|_| {
        QueryError::FetchError(format!(
            "cached value for {key} is not a {}",
            std::any::type_name::<V>()
        ))
    })
}
