use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::{BoxFuture, Shared};

use crate::error::QueryError;
use crate::timer::TimerHandle;

use super::key::QueryKey;

/// Type-erased cached payload.
pub type ErasedData = Arc<dyn Any + Send + Sync>;

/// Type-erased fetcher stored on an entry so invalidation can refetch.
pub type ErasedLoader =
    Arc<dyn Fn() -> BoxFuture<'static, Result<ErasedData, QueryError>> + Send + Sync>;

/// Shared in-flight fetch. Every caller joining a fetch polls the same future.
pub type SharedFetch = Shared<BoxFuture<'static, Result<ErasedData, QueryError>>>;

/// Listener invoked with a snapshot after every durable entry update.
pub type Listener = Arc<dyn Fn(&EntrySnapshot) + Send + Sync>;

/// Lifecycle status of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    /// Never fetched.
    Idle,
    /// A fetch is in flight. Previous data, if any, is kept.
    Loading,
    /// The last fetch succeeded.
    Success,
    /// The last fetch failed. Previous data, if any, is kept.
    Error,
    /// Marked outdated by invalidation; refetched on next interest.
    Stale,
}

/// Immutable copy of an entry's observable state.
#[derive(Clone)]
pub struct EntrySnapshot {
    pub key: QueryKey,
    pub status: QueryStatus,
    pub data: Option<ErasedData>,
    pub error: Option<QueryError>,
    pub last_fetched_at: Option<Instant>,
    pub subscriber_count: usize,
    /// Monotonic per-entry revision; a higher revision is always newer.
    pub revision: u64,
}

impl EntrySnapshot {
    pub(crate) fn idle(key: QueryKey) -> Self {
        Self {
            key,
            status: QueryStatus::Idle,
            data: None,
            error: None,
            last_fetched_at: None,
            subscriber_count: 0,
            revision: 0,
        }
    }

    #[must_use]
    pub const fn is_fetching(&self) -> bool {
        matches!(self.status, QueryStatus::Loading)
    }
}

impl std::fmt::Debug for EntrySnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntrySnapshot")
            .field("key", &self.key.to_string())
            .field("status", &self.status)
            .field("has_data", &self.data.is_some())
            .field("error", &self.error)
            .field("subscriber_count", &self.subscriber_count)
            .field("revision", &self.revision)
            .finish_non_exhaustive()
    }
}

/// A cached entry with timestamp and staleness information.
pub struct CacheEntry {
    pub key: QueryKey,
    pub status: QueryStatus,
    pub data: Option<ErasedData>,
    pub error: Option<QueryError>,
    pub last_fetched_at: Option<Instant>,
    pub listeners: BTreeMap<u64, Listener>,
    pub loader: Option<ErasedLoader>,
    pub in_flight: Option<SharedFetch>,
    /// Bumped for every fetch issued; only the latest generation may land.
    pub generation: u64,
    pub revision: u64,
    pub idle_since: Option<Instant>,
    pub gc_timer: Option<TimerHandle>,
}

impl CacheEntry {
    /// Creates a new idle entry with no subscribers.
    pub fn new(key: QueryKey, now: Instant) -> Self {
        Self {
            key,
            status: QueryStatus::Idle,
            data: None,
            error: None,
            last_fetched_at: None,
            listeners: BTreeMap::new(),
            loader: None,
            in_flight: None,
            generation: 0,
            revision: 0,
            idle_since: Some(now),
            gc_timer: None,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.len()
    }

    /// Checks if this entry holds data older than `stale_time`.
    ///
    /// Anything other than a successful, young result is not fresh.
    pub fn is_fresh(&self, stale_time: Duration, now: Instant) -> bool {
        match (self.status, self.last_fetched_at) {
            (QueryStatus::Success, Some(at)) => now.saturating_duration_since(at) <= stale_time,
            _ => false,
        }
    }

    /// Starts a new fetch generation, keeping previous data visible.
    pub fn begin_fetch(&mut self, loader: ErasedLoader, fetch: SharedFetch) -> u64 {
        self.generation += 1;
        self.status = QueryStatus::Loading;
        self.loader = Some(loader);
        self.in_flight = Some(fetch);
        self.touch();
        self.generation
    }

    /// Applies a fetch outcome. Returns `false` for a superseded generation.
    pub fn complete(
        &mut self,
        generation: u64,
        outcome: &Result<ErasedData, QueryError>,
        now: Instant,
    ) -> bool {
        if generation != self.generation || self.status != QueryStatus::Loading {
            return false;
        }
        self.in_flight = None;
        self.last_fetched_at = Some(now);
        match outcome {
            Ok(data) => {
                self.status = QueryStatus::Success;
                self.data = Some(data.clone());
                self.error = None;
            }
            Err(err) => {
                self.status = QueryStatus::Error;
                self.error = Some(err.clone());
            }
        }
        self.touch();
        true
    }

    /// Marks this entry as stale.
    ///
    /// An in-flight fetch is abandoned: its response will not land.
    pub fn mark_stale(&mut self) {
        if self.status == QueryStatus::Idle {
            return;
        }
        if self.status == QueryStatus::Loading {
            self.generation += 1;
            self.in_flight = None;
        }
        self.status = QueryStatus::Stale;
        self.touch();
    }

    /// Replaces the data directly, as for an optimistic update.
    ///
    /// An in-flight fetch is abandoned so it cannot overwrite the new data.
    pub fn set_data(&mut self, data: Option<ErasedData>, now: Instant) -> Option<ErasedData> {
        let previous = std::mem::replace(&mut self.data, data);
        if self.status == QueryStatus::Loading {
            self.generation += 1;
            self.in_flight = None;
        }
        self.status = if self.data.is_some() {
            QueryStatus::Success
        } else {
            QueryStatus::Idle
        };
        self.error = None;
        self.last_fetched_at = Some(now);
        self.touch();
        previous
    }

    /// Drops data and abandons any fetch, returning to `Idle`.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.in_flight = None;
        self.status = QueryStatus::Idle;
        self.data = None;
        self.error = None;
        self.last_fetched_at = None;
        self.touch();
    }

    /// Checks if this entry should be garbage collected based on cache time.
    pub fn should_gc(&self, cache_time: Duration, now: Instant) -> bool {
        self.listeners.is_empty()
            && self.status != QueryStatus::Loading
            && self
                .idle_since
                .is_some_and(|since| now.saturating_duration_since(since) >= cache_time)
    }

    pub fn snapshot(&self) -> EntrySnapshot {
        EntrySnapshot {
            key: self.key.clone(),
            status: self.status,
            data: self.data.clone(),
            error: self.error.clone(),
            last_fetched_at: self.last_fetched_at,
            subscriber_count: self.listeners.len(),
            revision: self.revision,
        }
    }

    pub fn listeners(&self) -> Vec<Listener> {
        self.listeners.values().cloned().collect()
    }

    const fn touch(&mut self) {
        self.revision += 1;
    }
}
