//! Per-consumer binding of parameters to a cache entry.
//!
//! A [`QueryObserver`] is what a screen holds. It derives the key from its
//! parameters, subscribes to that entry while enabled, fetches when the entry
//! is not fresh, and publishes a [`QueryResult`] on every change.
//!
//! Switching parameters moves the subscription to the new key. With
//! `keep_previous_data`, the old key's data stays visible (flagged as a
//! placeholder) until the new key has its own.

use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

use crate::error::QueryError;

use super::{QueryResult, QueryStatus};
use super::cache::{ErasedData, ErasedLoader};
use super::client::{CacheSubscription, QueryClient, downcast};
use super::key::QueryKey;

/// Async function producing the value for one set of parameters.
pub type Fetcher<P, V> = Arc<dyn Fn(P) -> BoxFuture<'static, Result<V, QueryError>> + Send + Sync>;

/// Everything needed to observe a query.
pub struct QueryOptions<P, V> {
    pub resource: String,
    pub params: P,
    pub fetcher: Fetcher<P, V>,
    pub enabled: bool,
    pub keep_previous_data: bool,
}

impl<P, V> QueryOptions<P, V>
where
    P: Serialize + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    pub fn new<F>(resource: &str, params: P, fetcher: F) -> Self
    where
        F: Fn(P) -> BoxFuture<'static, Result<V, QueryError>> + Send + Sync + 'static,
    {
        Self {
            resource: resource.to_string(),
            params,
            fetcher: Arc::new(fetcher),
            enabled: true,
            keep_previous_data: false,
        }
    }

    #[must_use]
    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Keep showing the previous key's data while a new key loads.
    #[must_use]
    pub const fn keep_previous_data(mut self, keep: bool) -> Self {
        self.keep_previous_data = keep;
        self
    }

    #[must_use]
    pub fn key(&self) -> QueryKey {
        QueryKey::from_params(&self.resource, &self.params)
    }
}

impl<P: Clone, V> Clone for QueryOptions<P, V> {
    fn clone(&self) -> Self {
        Self {
            resource: self.resource.clone(),
            params: self.params.clone(),
            fetcher: self.fetcher.clone(),
            enabled: self.enabled,
            keep_previous_data: self.keep_previous_data,
        }
    }
}

impl<P: std::fmt::Debug, V> std::fmt::Debug for QueryOptions<P, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryOptions")
            .field("resource", &self.resource)
            .field("params", &self.params)
            .field("enabled", &self.enabled)
            .field("keep_previous_data", &self.keep_previous_data)
            .finish_non_exhaustive()
    }
}

/// A live view of one query.
///
/// Dropping the observer unsubscribes. A fetch it started keeps running and
/// still populates the cache.
pub struct QueryObserver<P, V> {
    client: QueryClient,
    options: QueryOptions<P, V>,
    key: QueryKey,
    subscription: Option<CacheSubscription>,
    tx: Arc<watch::Sender<QueryResult<V>>>,
    rx: watch::Receiver<QueryResult<V>>,
}

impl<P, V> QueryObserver<P, V>
where
    P: Serialize + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Creates the observer and, if enabled, subscribes and fetches.
    pub fn new(client: QueryClient, options: QueryOptions<P, V>) -> Self {
        let key = options.key();
        let (tx, rx) = watch::channel(QueryResult::idle(key.clone()));
        let mut observer = Self {
            client,
            options,
            key,
            subscription: None,
            tx: Arc::new(tx),
            rx,
        };
        observer.activate();
        observer
    }

    #[must_use]
    pub const fn key(&self) -> &QueryKey {
        &self.key
    }

    #[must_use]
    pub const fn params(&self) -> &P {
        &self.options.params
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.options.enabled
    }

    /// The latest result.
    #[must_use]
    pub fn result(&self) -> QueryResult<V> {
        self.tx.borrow().clone()
    }

    /// Waits for the next result change.
    pub async fn changed(&mut self) -> QueryResult<V> {
        // The sender lives in `self`, so the channel cannot close here.
        let _ = self.rx.changed().await;
        self.rx.borrow_and_update().clone()
    }

    /// A receiver for results, independent of this observer's own.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<QueryResult<V>> {
        self.tx.subscribe()
    }

    /// Replaces the parameters. A different key moves the subscription.
    pub fn set_params(&mut self, params: P) {
        self.options.params = params;
        let key = self.options.key();
        if key == self.key {
            return;
        }
        debug!(from = %self.key, to = %key, "query key changed");
        self.key = key;
        self.activate();
    }

    /// Turns the observer on or off. While off, nothing is fetched.
    pub fn set_enabled(&mut self, enabled: bool) {
        if self.options.enabled == enabled {
            return;
        }
        self.options.enabled = enabled;
        self.activate();
    }

    /// Forces a refetch of the current key.
    ///
    /// Returns `None` without fetching while the observer is disabled.
    pub fn refetch(&self) -> Option<BoxFuture<'static, Result<Arc<V>, QueryError>>> {
        if !self.options.enabled {
            debug!(key = %self.key, "refetch ignored, observer disabled");
            return None;
        }
        let shared = self.client.fetch_erased(&self.key, self.loader(), true);
        let key = self.key.clone();
        Some(async move { downcast::<V>(&key, shared.await?) }.boxed())
    }

    fn activate(&mut self) {
        let previous = if self.options.keep_previous_data {
            self.tx.borrow().data.clone()
        } else {
            None
        };
        self.subscription = None;

        if !self.options.enabled {
            self.tx.send_replace(QueryResult::idle(self.key.clone()));
            return;
        }

        let initial = self.client.get(&self.key);
        let placeholder = Arc::new(Mutex::new(previous.filter(|_| initial.data.is_none())));
        let current = QueryResult::from_snapshot(&initial, placeholder.lock().as_ref());

        let tx = self.tx.clone();
        let subscription = self.client.subscribe(&self.key, move |snapshot| {
            let fallback = {
                let mut slot = placeholder.lock();
                // Own data replaces it for good; a reset purges it.
                if snapshot.data.is_some() || snapshot.status == QueryStatus::Idle {
                    *slot = None;
                }
                slot.clone()
            };
            publish(&tx, QueryResult::from_snapshot(snapshot, fallback.as_ref()));
        });
        self.tx.send_if_modified(|result| {
            if result.key != current.key || current.revision >= result.revision {
                *result = current;
                true
            } else {
                false
            }
        });
        self.subscription = Some(subscription);

        if !self.client.is_fresh(&self.key) {
            let _ = self.client.fetch_erased(&self.key, self.loader(), false);
        }
    }

    fn loader(&self) -> ErasedLoader {
        let fetcher = self.options.fetcher.clone();
        let params = self.options.params.clone();
        Arc::new(move || {
            fetcher(params.clone())
                .map(|result| result.map(|value| Arc::new(value) as ErasedData))
                .boxed()
        })
    }
}

/// Applies `next` unless it is older than what is already published.
fn publish<V>(tx: &watch::Sender<QueryResult<V>>, next: QueryResult<V>) {
    tx.send_if_modified(|current| {
        if current.key == next.key && next.revision > current.revision {
            *current = next;
            true
        } else {
            false
        }
    });
}

impl<P, V> std::fmt::Debug for QueryObserver<P, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryObserver")
            .field("key", &self.key.to_string())
            .field("enabled", &self.options.enabled)
            .field("subscribed", &self.subscription.is_some())
            .finish_non_exhaustive()
    }
}
