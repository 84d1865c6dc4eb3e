//! Controllable subscription source for tests.
//!
//! A [`MockSource`] stands in for input the application does not control,
//! such as keystrokes in a search box, and emits values on demand.
//!
//! ```
//! use workervet_query::subscription::{Subscription, mock::MockSource};
//!
//! let keystrokes = MockSource::<String>::new();
//! let subscription = Subscription::new(keystrokes.clone());
//!
//! // No stream is running yet, so there is nobody to receive this.
//! assert!(keystrokes.emit("a".to_string()).is_err());
//! # drop(subscription);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::sync::broadcast;

use crate::subscription::{SubscriptionId, SubscriptionSource};

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

/// A source that emits whatever the test tells it to.
///
/// Clones share the same channel and the same [`SubscriptionId`].
#[derive(Debug, Clone)]
pub struct MockSource<T: Clone> {
    sender: broadcast::Sender<T>,
    id: SubscriptionId,
}

impl<T: Clone + Send + 'static> MockSource<T> {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            id: SubscriptionId::of::<Self>(NEXT_ID.fetch_add(1, Ordering::Relaxed)),
        }
    }

    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(100)
    }

    /// Emits a value to every running stream.
    ///
    /// # Errors
    ///
    /// Returns an error if no stream is running.
    pub fn emit(&self, value: T) -> Result<usize, broadcast::error::SendError<T>> {
        self.sender.send(value)
    }

    /// Number of running streams.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<T: Clone + Send + 'static> Default for MockSource<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> SubscriptionSource for MockSource<T> {
    type Output = T;

    fn stream(&self) -> BoxStream<'static, T> {
        tokio_stream::wrappers::BroadcastStream::new(self.sender.subscribe())
            .filter_map(|result| async move { result.ok() })
            .boxed()
    }

    fn id(&self) -> SubscriptionId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_identity() {
        let a = MockSource::<i32>::new();
        let b = a.clone();
        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), MockSource::<i32>::new().id());
    }

    #[tokio::test]
    async fn test_stream_receives_values() {
        let mock = MockSource::<&'static str>::new();
        let mut stream = mock.stream();
        assert_eq!(mock.receiver_count(), 1);

        mock.emit("a").expect("stream is running");
        mock.emit("al").expect("stream is running");

        assert_eq!(stream.next().await, Some("a"));
        assert_eq!(stream.next().await, Some("al"));
    }
}
