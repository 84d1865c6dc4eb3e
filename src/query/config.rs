use std::time::Duration;

/// Configuration for query behavior.
///
/// This controls how queries cache data and when they consider it stale.
#[derive(Debug, Clone)]
pub struct QueryConfig {
    /// How long data is considered fresh before becoming stale.
    ///
    /// When data is fresh, a new subscriber uses it without refetching.
    /// Once stale, subscribing serves the cached data and refetches in the
    /// background.
    pub stale_time: Duration,

    /// How long an entry with no subscribers is retained before eviction.
    pub cache_time: Duration,

    /// Extra attempts after a transient fetch failure. Zero disables retry.
    pub retry: u32,

    /// Delay between retry attempts.
    pub retry_delay: Duration,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            stale_time: Duration::from_secs(0),      // immediately stale
            cache_time: Duration::from_secs(5 * 60), // 5 minutes
            retry: 0,
            retry_delay: Duration::from_secs(1),
        }
    }
}

impl QueryConfig {
    /// Creates a new query configuration with the given stale and cache times.
    #[must_use]
    pub const fn new(stale_time: Duration, cache_time: Duration) -> Self {
        Self {
            stale_time,
            cache_time,
            retry: 0,
            retry_delay: Duration::from_secs(1),
        }
    }

    /// Enables bounded retry of transient failures.
    #[must_use]
    pub const fn with_retry(mut self, retry: u32, retry_delay: Duration) -> Self {
        self.retry = retry;
        self.retry_delay = retry_delay;
        self
    }
}
