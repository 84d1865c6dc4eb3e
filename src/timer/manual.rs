//! Manually advanced timer for deterministic tests.
//!
//! Nothing fires until [`ManualTimer::advance`] moves the clock past a task's
//! deadline. Tasks run on the calling thread in deadline order, with the clock
//! set to each task's deadline while it runs, so a task that schedules another
//! task sees a consistent "now".
//!
//! ```
//! use std::time::Duration;
//! use workervet_query::timer::{ManualTimer, Timer};
//!
//! let timer = ManualTimer::new();
//! let start = timer.now();
//! timer.advance(Duration::from_millis(300));
//! assert_eq!(timer.now() - start, Duration::from_millis(300));
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use super::{Task, Timer, TimerHandle};

struct Scheduled {
    deadline: Duration,
    seq: u64,
    token: CancellationToken,
    task: Task,
}

struct State {
    elapsed: Duration,
    next_seq: u64,
    queue: Vec<Scheduled>,
}

/// A timer whose clock only moves when told to.
///
/// Clones share the same clock and queue.
#[derive(Clone)]
pub struct ManualTimer {
    origin: Instant,
    state: Arc<Mutex<State>>,
}

impl ManualTimer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            state: Arc::new(Mutex::new(State {
                elapsed: Duration::ZERO,
                next_seq: 0,
                queue: Vec::new(),
            })),
        }
    }

    /// Moves the clock forward by `by`, running every task that falls due.
    pub fn advance(&self, by: Duration) {
        let target = self.state.lock().elapsed + by;

        loop {
            let due = {
                let mut state = self.state.lock();
                state.queue.retain(|s| !s.token.is_cancelled());
                let next = state
                    .queue
                    .iter()
                    .enumerate()
                    .filter(|(_, s)| s.deadline <= target)
                    .min_by_key(|(_, s)| (s.deadline, s.seq))
                    .map(|(idx, _)| idx);

                next.map(|idx| {
                    let scheduled = state.queue.swap_remove(idx);
                    state.elapsed = state.elapsed.max(scheduled.deadline);
                    scheduled
                })
            };

            // The lock is released here: tasks may schedule or cancel.
            match due {
                Some(scheduled) => {
                    if !scheduled.token.is_cancelled() {
                        (scheduled.task)();
                    }
                }
                None => break,
            }
        }

        self.state.lock().elapsed = target;
    }

    /// Number of scheduled tasks that have not fired or been cancelled.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.state
            .lock()
            .queue
            .iter()
            .filter(|s| !s.token.is_cancelled())
            .count()
    }
}

impl Default for ManualTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ManualTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ManualTimer")
            .field("elapsed", &state.elapsed)
            .field("queued", &state.queue.len())
            .finish()
    }
}

impl Timer for ManualTimer {
    fn now(&self) -> Instant {
        self.origin + self.state.lock().elapsed
    }

    fn schedule(&self, delay: Duration, task: Task) -> TimerHandle {
        let token = CancellationToken::new();
        let mut state = self.state.lock();
        let seq = state.next_seq;
        state.next_seq += 1;
        let deadline = state.elapsed + delay;
        state.queue.push(Scheduled {
            deadline,
            seq,
            token: token.clone(),
            task,
        });
        TimerHandle::new(token)
    }
}
