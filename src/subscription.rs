//! Long-lived message sources.
//!
//! A [`Subscription`] wraps a [`SubscriptionSource`]: something that produces
//! a stream of values for as long as the application asks for it. The runtime
//! calls [`Application::subscriptions`](crate::application::Application::subscriptions)
//! after every update and the [`SubscriptionManager`] diffs the result by
//! [`SubscriptionId`]: new ids are started, missing ids are cancelled, and
//! unchanged ids keep running untouched.
//!
//! Queries are subscriptions ([`query::Query`]), so a screen that stops
//! listing a query unsubscribes from its cache entry.

pub mod mock;
pub mod query;

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::command::Action;

/// Identity of a subscription, used to diff successive subscription lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId {
    type_id: TypeId,
    hash: u64,
}

impl SubscriptionId {
    /// An id unique to the source type `T` and `hash`.
    #[must_use]
    pub fn of<T: 'static>(hash: u64) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            hash,
        }
    }
}

/// Something that can be turned into a stream of values.
pub trait SubscriptionSource: Send + 'static {
    type Output: Send + 'static;

    /// Starts producing values. Dropping the stream stops the source.
    fn stream(&self) -> BoxStream<'static, Self::Output>;

    /// Two sources with the same id are considered the same subscription.
    fn id(&self) -> SubscriptionId;
}

type Spawn<Msg> = Arc<dyn Fn() -> BoxStream<'static, Msg> + Send + Sync>;

/// A message source requested by the application.
pub struct Subscription<Msg> {
    pub(crate) id: SubscriptionId,
    pub(crate) spawn: Spawn<Msg>,
}

impl<Msg: Send + 'static> Subscription<Msg> {
    /// Creates a subscription from a source.
    pub fn new<S>(source: S) -> Self
    where
        S: SubscriptionSource<Output = Msg> + Sync,
    {
        let id = source.id();
        Self {
            id,
            spawn: Arc::new(move || source.stream()),
        }
    }

    #[must_use]
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Converts the values this subscription produces.
    pub fn map<T, F>(self, f: F) -> Subscription<T>
    where
        T: Send + 'static,
        F: Fn(Msg) -> T + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        let spawn = self.spawn;
        Subscription {
            id: self.id,
            spawn: Arc::new(move || {
                let f = f.clone();
                spawn().map(move |msg| f(msg)).boxed()
            }),
        }
    }
}

/// Handle for a running subscription task.
pub struct Handle {
    token: CancellationToken,
    join: JoinHandle<()>,
}

impl Handle {
    #[must_use]
    pub const fn new(token: CancellationToken, join: JoinHandle<()>) -> Self {
        Self { token, join }
    }

    /// Signals the task to stop without waiting for it.
    pub fn abort(&self) {
        self.token.cancel();
    }

    /// Cancels the subscription and waits for its stream to be dropped.
    pub async fn cancel(self) {
        self.token.cancel();
        let _ = self.join.await;
    }
}

/// Keeps running subscriptions in sync with what the application asks for.
pub struct SubscriptionManager<Msg> {
    running: HashMap<SubscriptionId, Handle>,
    tx: mpsc::UnboundedSender<Action<Msg>>,
}

impl<Msg: Send + 'static> SubscriptionManager<Msg> {
    #[must_use]
    pub fn new(tx: mpsc::UnboundedSender<Action<Msg>>) -> Self {
        Self {
            running: HashMap::new(),
            tx,
        }
    }

    /// Starts new subscriptions and cancels ones no longer requested.
    ///
    /// Duplicate ids in `subscriptions` run once.
    pub fn update(&mut self, subscriptions: impl IntoIterator<Item = Subscription<Msg>>) {
        let mut wanted: HashMap<SubscriptionId, Subscription<Msg>> = HashMap::new();
        for subscription in subscriptions {
            wanted.entry(subscription.id).or_insert(subscription);
        }

        let removed: Vec<SubscriptionId> = self
            .running
            .keys()
            .filter(|id| !wanted.contains_key(id))
            .copied()
            .collect();
        for id in removed {
            if let Some(handle) = self.running.remove(&id) {
                debug!(?id, "stopping subscription");
                handle.abort();
            }
        }

        for (id, subscription) in wanted {
            if self.running.contains_key(&id) {
                continue;
            }
            debug!(?id, "starting subscription");
            let handle = self.spawn(&subscription);
            self.running.insert(id, handle);
        }
    }

    /// Number of running subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.running.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.running.is_empty()
    }

    /// Cancels every running subscription and waits for them to stop.
    pub async fn shutdown(&mut self) {
        for (_, handle) in self.running.drain() {
            handle.cancel().await;
        }
    }

    fn spawn(&self, subscription: &Subscription<Msg>) -> Handle {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let tx = self.tx.clone();
        let mut stream = (subscription.spawn)();

        let join = tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = cancelled.cancelled() => break,
                    next = stream.next() => match next {
                        Some(msg) => {
                            if tx.send(Action::Message(msg)).is_err() {
                                break;
                            }
                        }
                        None => break,
                    },
                }
            }
        });

        Handle::new(token, join)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscription::mock::MockSource;
    use tokio::time::{Duration, timeout};

    async fn next_message<Msg>(rx: &mut mpsc::UnboundedReceiver<Action<Msg>>) -> Option<Msg> {
        match timeout(Duration::from_secs(1), rx.recv()).await {
            Ok(Some(Action::Message(msg))) => Some(msg),
            _ => None,
        }
    }

    async fn wait_for_receivers<T: Clone + Send + 'static>(mock: &MockSource<T>, count: usize) {
        timeout(Duration::from_secs(1), async {
            while mock.receiver_count() != count {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("receiver count should settle");
    }

    #[test]
    fn test_ids_differ_by_type() {
        struct A;
        struct B;
        assert_eq!(SubscriptionId::of::<A>(1), SubscriptionId::of::<A>(1));
        assert_ne!(SubscriptionId::of::<A>(1), SubscriptionId::of::<B>(1));
        assert_ne!(SubscriptionId::of::<A>(1), SubscriptionId::of::<A>(2));
    }

    #[tokio::test]
    async fn test_map_keeps_id() {
        let mock = MockSource::<i32>::new();
        let sub = Subscription::new(mock.clone());
        let id = sub.id();
        let mapped = sub.map(|n| n * 2);
        assert_eq!(mapped.id(), id);

        let mut stream = (mapped.spawn)();
        mock.emit(21).expect("stream is subscribed");
        assert_eq!(stream.next().await, Some(42));
    }

    #[tokio::test]
    async fn test_manager_starts_and_stops() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut manager = SubscriptionManager::new(tx);
        let mock = MockSource::<&'static str>::new();

        manager.update(vec![Subscription::new(mock.clone())]);
        assert_eq!(manager.len(), 1);
        wait_for_receivers(&mock, 1).await;

        mock.emit("ali").expect("running subscription receives");
        assert_eq!(next_message(&mut rx).await, Some("ali"));

        manager.update(Vec::new());
        assert!(manager.is_empty());
        wait_for_receivers(&mock, 0).await;
    }

    #[tokio::test]
    async fn test_unchanged_subscription_is_not_restarted() {
        let (tx, _rx) = mpsc::unbounded_channel::<Action<i32>>();
        let mut manager = SubscriptionManager::new(tx);
        let mock = MockSource::<i32>::new();

        manager.update(vec![Subscription::new(mock.clone())]);
        wait_for_receivers(&mock, 1).await;
        manager.update(vec![Subscription::new(mock.clone()), Subscription::new(mock.clone())]);

        assert_eq!(manager.len(), 1);
        tokio::task::yield_now().await;
        assert_eq!(mock.receiver_count(), 1);
    }

    #[tokio::test]
    async fn test_shutdown() {
        let (tx, _rx) = mpsc::unbounded_channel::<Action<i32>>();
        let mut manager = SubscriptionManager::new(tx);
        let mock = MockSource::<i32>::new();

        manager.update(vec![Subscription::new(mock.clone())]);
        manager.shutdown().await;

        assert!(manager.is_empty());
        assert_eq!(mock.receiver_count(), 0);
    }
}
