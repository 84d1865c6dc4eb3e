//! Schedule/cancel timer abstraction.
//!
//! Debouncing and cache eviction both need "run this later unless cancelled".
//! They take an `Arc<dyn Timer>` instead of calling `tokio::time` directly so
//! tests can drive time with [`ManualTimer`](manual::ManualTimer).
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use workervet_query::timer::{Timer, TokioTimer};
//!
//! # async fn demo() {
//! let timer = TokioTimer::new();
//! let handle = timer.schedule(Duration::from_millis(300), Box::new(|| println!("fired")));
//! handle.cancel();
//! # }
//! ```

pub mod manual;

use std::time::{Duration, Instant};

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

pub use manual::ManualTimer;

/// A deferred unit of work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Handle to a scheduled task.
///
/// Dropping the handle does not cancel the task; call [`TimerHandle::cancel`].
#[derive(Debug, Clone)]
pub struct TimerHandle {
    token: CancellationToken,
}

impl TimerHandle {
    #[must_use]
    pub const fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    /// Prevents the task from running if it has not fired yet.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// A source of time and deferred execution.
pub trait Timer: Send + Sync + 'static {
    /// The current instant according to this timer.
    fn now(&self) -> Instant;

    /// Runs `task` once `delay` has elapsed, unless cancelled first.
    fn schedule(&self, delay: Duration, task: Task) -> TimerHandle;

    /// Resolves after `delay`, measured by this timer.
    fn sleep(&self, delay: Duration) -> BoxFuture<'static, ()> {
        let (tx, rx) = oneshot::channel();
        self.schedule(
            delay,
            Box::new(move || {
                let _ = tx.send(());
            }),
        );
        rx.map(|_| ()).boxed()
    }
}

/// Wall-clock timer backed by the tokio runtime.
///
/// Scheduling outside a runtime logs a warning and the task never fires.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTimer;

impl TokioTimer {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Timer for TokioTimer {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    fn schedule(&self, delay: Duration, task: Task) -> TimerHandle {
        let token = CancellationToken::new();
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(?delay, "no tokio runtime, timer task dropped");
            return TimerHandle::new(token);
        };
        let child = token.clone();
        runtime.spawn(async move {
            tokio::select! {
                () = child.cancelled() => {}
                () = tokio::time::sleep(delay) => {
                    if !child.is_cancelled() {
                        task();
                    }
                }
            }
        });
        TimerHandle::new(token)
    }
}
