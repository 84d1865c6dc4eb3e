//! Queries as subscriptions.
//!
//! Listing a [`Query`] in `subscriptions()` mounts a [`QueryObserver`] for as
//! long as it stays listed. Every result change arrives as a message.
//!
//! # Example
//!
//! ```rust,no_run
//! use futures::FutureExt;
//! use workervet_query::prelude::*;
//! use workervet_query::query::{QueryClient, QueryOptions, QueryResult};
//! use workervet_query::subscription::query::Query;
//!
//! enum Message {
//!     Skills(QueryResult<Vec<String>>),
//! }
//!
//! fn subscriptions(client: &QueryClient) -> Vec<Subscription<Message>> {
//!     let options = QueryOptions::new("skills", (), |()| {
//!         async { Ok(vec!["Integrity".to_string()]) }.boxed()
//!     });
//!     vec![Subscription::new(Query::new(client.clone(), options)).map(Message::Skills)]
//! }
//! ```

use std::hash::{DefaultHasher, Hash, Hasher};

use futures::StreamExt;
use futures::stream::{self, BoxStream};
use serde::Serialize;

use crate::query::{QueryClient, QueryObserver, QueryOptions, QueryResult};
use crate::subscription::{SubscriptionId, SubscriptionSource};

/// A query subscription.
///
/// Its identity is the query key plus the enabled flag, so changing
/// parameters or enabling the query restarts it on the next update.
pub struct Query<P, V> {
    client: QueryClient,
    options: QueryOptions<P, V>,
}

impl<P, V> Query<P, V>
where
    P: Serialize + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    #[must_use]
    pub const fn new(client: QueryClient, options: QueryOptions<P, V>) -> Self {
        Self { client, options }
    }
}

impl<P, V> SubscriptionSource for Query<P, V>
where
    P: Serialize + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    type Output = QueryResult<V>;

    fn stream(&self) -> BoxStream<'static, QueryResult<V>> {
        let observer = QueryObserver::new(self.client.clone(), self.options.clone());
        let first = observer.result();

        let updates = stream::unfold(observer, |mut observer| async move {
            let result = observer.changed().await;
            Some((result, observer))
        });

        stream::once(async move { first }).chain(updates).boxed()
    }

    fn id(&self) -> SubscriptionId {
        let mut hasher = DefaultHasher::new();
        self.options.key().hash(&mut hasher);
        self.options.enabled.hash(&mut hasher);
        SubscriptionId::of::<Self>(hasher.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryKey;
    use futures::FutureExt;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::{Duration, timeout};

    fn skills(calls: Arc<AtomicUsize>) -> QueryOptions<(), Vec<String>> {
        QueryOptions::new("skills", (), move |()| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(vec!["Integrity".to_string()]) }.boxed()
        })
    }

    #[test]
    fn test_id_follows_key_and_enabled() {
        let client = QueryClient::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let a = Query::new(client.clone(), skills(calls.clone()));
        let b = Query::new(client.clone(), skills(calls.clone()));
        let disabled = Query::new(client, skills(calls).enabled(false));

        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), disabled.id());
    }

    #[tokio::test]
    async fn test_stream_emits_until_success() {
        let client = QueryClient::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let mut stream = Query::new(client.clone(), skills(calls.clone())).stream();

        let result = timeout(Duration::from_secs(1), async {
            while let Some(result) = stream.next().await {
                if result.is_success() {
                    return Some(result);
                }
            }
            None
        })
        .await
        .expect("query should resolve")
        .expect("stream should not end");

        assert_eq!(result.data().map(Vec::len), Some(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let key = QueryKey::new("skills");
        assert_eq!(client.subscriber_count(&key), 1);
        drop(stream);
        assert_eq!(client.subscriber_count(&key), 0);
    }
}
