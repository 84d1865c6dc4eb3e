//! Cached queries with de-duplication, invalidation and mutations.
//!
//! Similar to SWR or TanStack Query: a single [`QueryClient`] owns every
//! cached response, [`QueryObserver`]s bind a consumer to one key at a time,
//! and [`Mutation`]s write to the server and invalidate what they touched.
//!
//! # Example
//!
//! ```rust,no_run
//! use futures::FutureExt;
//! use workervet_query::query::{QueryClient, QueryObserver, QueryOptions};
//!
//! # async fn demo() {
//! let client = QueryClient::new();
//! let options = QueryOptions::new("skills", (), |()| {
//!     async { Ok(vec!["Integrity".to_string()]) }.boxed()
//! });
//!
//! let mut observer = QueryObserver::new(client, options);
//! let result = observer.changed().await;
//! if let Some(skills) = result.data() {
//!     println!("{} skills", skills.len());
//! }
//! # }
//! ```

mod cache;
mod client;
mod config;
mod key;
pub mod mutation;
mod observer;

use std::sync::Arc;

pub use cache::{EntrySnapshot, QueryStatus};
pub use client::{CacheSubscription, QueryClient, QueryDataSnapshot};
pub use config::QueryConfig;
pub use key::{KeyFilter, ParamValue, QueryKey};
pub use mutation::{Mutation, MutationState};
pub use observer::{Fetcher, QueryObserver, QueryOptions};

use crate::error::{QueryError, StaleDataWarning};

/// The state of a query as seen by one observer.
pub struct QueryResult<V> {
    /// The key this result belongs to.
    pub key: QueryKey,
    pub status: QueryStatus,
    pub data: Option<Arc<V>>,
    pub error: Option<QueryError>,
    /// `true` when `data` belongs to the previous key, kept while the current
    /// key loads.
    pub is_placeholder: bool,
    pub revision: u64,
}

/// What a consumer should render for a [`QueryResult`].
#[derive(Debug, PartialEq)]
pub enum QueryView<'a, V> {
    /// Disabled or not yet requested.
    Idle,
    /// Loading with nothing to show.
    Skeleton,
    /// Data is available, possibly outdated.
    Ready {
        data: &'a V,
        refetching: bool,
        warning: Option<StaleDataWarning>,
    },
    /// Failed with nothing to show.
    Failed(&'a QueryError),
}

impl<V> QueryResult<V> {
    /// An idle result for `key`.
    #[must_use]
    pub const fn idle(key: QueryKey) -> Self {
        Self {
            key,
            status: QueryStatus::Idle,
            data: None,
            error: None,
            is_placeholder: false,
            revision: 0,
        }
    }

    /// Returns the data if any is available, otherwise `None`.
    #[must_use]
    pub fn data(&self) -> Option<&V> {
        self.data.as_deref()
    }

    #[must_use]
    pub const fn error(&self) -> Option<&QueryError> {
        self.error.as_ref()
    }

    #[must_use]
    pub const fn is_idle(&self) -> bool {
        matches!(self.status, QueryStatus::Idle)
    }

    /// Returns `true` while the first fetch for this key is in flight.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self.status, QueryStatus::Loading) && (self.data.is_none() || self.is_placeholder)
    }

    /// Returns `true` while a fetch is in flight and this key's data is shown.
    #[must_use]
    pub const fn is_refetching(&self) -> bool {
        matches!(self.status, QueryStatus::Loading) && self.data.is_some() && !self.is_placeholder
    }

    #[must_use]
    pub const fn is_fetching(&self) -> bool {
        matches!(self.status, QueryStatus::Loading)
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.status, QueryStatus::Success)
    }

    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self.status, QueryStatus::Error)
    }

    #[must_use]
    pub const fn is_stale(&self) -> bool {
        matches!(self.status, QueryStatus::Stale)
    }

    /// A warning to show next to data that may be outdated.
    #[must_use]
    pub fn warning(&self) -> Option<StaleDataWarning> {
        self.data.as_ref()?;
        match self.status {
            QueryStatus::Error => Some(StaleDataWarning {
                error: self.error.clone(),
            }),
            QueryStatus::Stale | QueryStatus::Loading => Some(StaleDataWarning { error: None }),
            QueryStatus::Idle | QueryStatus::Success => None,
        }
    }

    #[must_use]
    pub fn display(&self) -> QueryView<'_, V> {
        if let Some(data) = self.data.as_deref() {
            return QueryView::Ready {
                data,
                refetching: self.is_fetching(),
                warning: self.warning(),
            };
        }
        match (self.status, &self.error) {
            (QueryStatus::Error, Some(error)) => QueryView::Failed(error),
            (QueryStatus::Loading | QueryStatus::Stale, _) => QueryView::Skeleton,
            _ => QueryView::Idle,
        }
    }
}

impl<V: Send + Sync + 'static> QueryResult<V> {
    /// Builds a typed result from a cache snapshot.
    ///
    /// `placeholder` stands in for missing data.
    pub(crate) fn from_snapshot(snapshot: &EntrySnapshot, placeholder: Option<&Arc<V>>) -> Self {
        let data = snapshot.data.clone().and_then(|data| {
            data.downcast::<V>()
                .map_err(|_| {
                    tracing::warn!(
                        key = %snapshot.key,
                        expected = std::any::type_name::<V>(),
                        "cached value has unexpected type"
                    );
                })
                .ok()
        });
        let (data, is_placeholder) = match (data, placeholder) {
            (Some(data), _) => (Some(data), false),
            (None, Some(previous)) => (Some(previous.clone()), true),
            (None, None) => (None, false),
        };

        Self {
            key: snapshot.key.clone(),
            status: snapshot.status,
            data,
            error: snapshot.error.clone(),
            is_placeholder,
            revision: snapshot.revision,
        }
    }
}

impl<V> Clone for QueryResult<V> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            status: self.status,
            data: self.data.clone(),
            error: self.error.clone(),
            is_placeholder: self.is_placeholder,
            revision: self.revision,
        }
    }
}

impl<V: std::fmt::Debug> std::fmt::Debug for QueryResult<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryResult")
            .field("key", &self.key.to_string())
            .field("status", &self.status)
            .field("data", &self.data)
            .field("error", &self.error)
            .field("is_placeholder", &self.is_placeholder)
            .finish_non_exhaustive()
    }
}
