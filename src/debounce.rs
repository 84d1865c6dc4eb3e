//! Debounced input and paged filters.
//!
//! A [`Debouncer`] holds two values: the raw value, updated on every
//! keystroke, and the committed value, updated only after the input has been
//! quiet for the configured delay. Queries key on the committed value, so
//! typing "alice" quickly issues one request, not five.
//!
//! [`PagedFilter`] pairs a debounced filter with a page number and publishes
//! both together. A committed filter change resets the page to 1 in the same
//! publication, so no request is ever issued for the new filter on the old
//! page.
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use workervet_query::debounce::PagedFilter;
//! use workervet_query::timer::ManualTimer;
//!
//! let timer = ManualTimer::new();
//! let search = PagedFilter::new(Arc::new(timer.clone()), Duration::from_millis(300), String::new());
//! search.set_page(3);
//!
//! search.input("ali".to_string());
//! timer.advance(Duration::from_millis(100));
//! search.input("alice".to_string());
//! timer.advance(Duration::from_millis(300));
//!
//! let request = search.current();
//! assert_eq!(request.filter, "alice");
//! assert_eq!(request.page, 1);
//! ```

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

use crate::timer::{Timer, TimerHandle};

/// The page number after a filter change.
pub const FIRST_PAGE: u32 = 1;

/// Quiet period before a search box value is committed.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

type CommitHook<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct DebounceState<T> {
    raw: T,
    committed: T,
    pending: Option<TimerHandle>,
    generation: u64,
}

struct Shared<T> {
    state: Mutex<DebounceState<T>>,
    /// Held from commit through publication so commits publish in order.
    publish: Mutex<()>,
    tx: watch::Sender<T>,
    on_commit: Option<CommitHook<T>>,
}

/// Delays committing a value until input has been quiet for `delay`.
///
/// Clones share the same state.
pub struct Debouncer<T> {
    shared: Arc<Shared<T>>,
    timer: Arc<dyn Timer>,
    delay: Duration,
}

impl<T> Clone for Debouncer<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            timer: self.timer.clone(),
            delay: self.delay,
        }
    }
}

impl<T> Debouncer<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    #[must_use]
    pub fn new(timer: Arc<dyn Timer>, delay: Duration, initial: T) -> Self {
        Self::build(timer, delay, initial, None)
    }

    /// Like [`new`](Self::new), calling `hook` with every committed value
    /// before it is published.
    #[must_use]
    pub fn with_hook(
        timer: Arc<dyn Timer>,
        delay: Duration,
        initial: T,
        hook: impl Fn(&T) + Send + Sync + 'static,
    ) -> Self {
        Self::build(timer, delay, initial, Some(Arc::new(hook)))
    }

    fn build(timer: Arc<dyn Timer>, delay: Duration, initial: T, on_commit: Option<CommitHook<T>>) -> Self {
        let (tx, _) = watch::channel(initial.clone());
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(DebounceState {
                    raw: initial.clone(),
                    committed: initial,
                    pending: None,
                    generation: 0,
                }),
                publish: Mutex::new(()),
                tx,
                on_commit,
            }),
            timer,
            delay,
        }
    }

    /// Records a new raw value and restarts the quiet period.
    pub fn input(&self, value: T) {
        let mut state = self.shared.state.lock();
        if let Some(pending) = state.pending.take() {
            pending.cancel();
        }
        state.raw = value;
        state.generation += 1;

        let generation = state.generation;
        let shared = self.shared.clone();
        state.pending = Some(
            self.timer
                .schedule(self.delay, Box::new(move || commit(&shared, Some(generation)))),
        );
    }

    /// Commits the raw value now, cancelling the pending timer.
    pub fn flush(&self) {
        if let Some(pending) = self.shared.state.lock().pending.take() {
            pending.cancel();
        }
        commit(&self.shared, None);
    }

    /// Drops pending input without committing it.
    pub fn cancel(&self) {
        let mut state = self.shared.state.lock();
        if let Some(pending) = state.pending.take() {
            pending.cancel();
        }
        state.raw = state.committed.clone();
        state.generation += 1;
    }

    #[must_use]
    pub fn raw(&self) -> T {
        self.shared.state.lock().raw.clone()
    }

    #[must_use]
    pub fn committed(&self) -> T {
        self.shared.state.lock().committed.clone()
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.shared.state.lock().pending.is_some()
    }

    /// A receiver that sees every committed value.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.shared.tx.subscribe()
    }
}

fn commit<T: Clone + PartialEq>(shared: &Shared<T>, generation: Option<u64>) {
    let _publishing = shared.publish.lock();
    let committed = {
        let mut state = shared.state.lock();
        if generation.is_some_and(|g| g != state.generation) {
            return;
        }
        state.pending = None;
        if state.raw == state.committed {
            return;
        }
        state.committed = state.raw.clone();
        state.committed.clone()
    };

    if let Some(hook) = &shared.on_commit {
        hook(&committed);
    }
    shared.tx.send_replace(committed);
}

impl<T> std::fmt::Debug for Debouncer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debouncer")
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}

/// A filter value and the page to request for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageRequest<F> {
    pub filter: F,
    pub page: u32,
}

/// A debounced filter with pagination that resets on filter change.
pub struct PagedFilter<F> {
    debouncer: Debouncer<F>,
    request: Arc<watch::Sender<PageRequest<F>>>,
}

impl<F> Clone for PagedFilter<F> {
    fn clone(&self) -> Self {
        Self {
            debouncer: self.debouncer.clone(),
            request: self.request.clone(),
        }
    }
}

impl<F> PagedFilter<F>
where
    F: Clone + PartialEq + Send + Sync + 'static,
{
    #[must_use]
    pub fn new(timer: Arc<dyn Timer>, delay: Duration, initial: F) -> Self {
        let (tx, _) = watch::channel(PageRequest {
            filter: initial.clone(),
            page: FIRST_PAGE,
        });
        let request = Arc::new(tx);
        let sink = request.clone();
        let debouncer = Debouncer::with_hook(timer, delay, initial, move |filter: &F| {
            sink.send_modify(|request| {
                request.filter = filter.clone();
                request.page = FIRST_PAGE;
            });
            debug!("filter committed, page reset");
        });

        Self { debouncer, request }
    }

    /// Records raw filter input.
    pub fn input(&self, raw: F) {
        self.debouncer.input(raw);
    }

    pub fn flush(&self) {
        self.debouncer.flush();
    }

    #[must_use]
    pub fn raw(&self) -> F {
        self.debouncer.raw()
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.debouncer.is_pending()
    }

    /// The committed filter and current page.
    #[must_use]
    pub fn current(&self) -> PageRequest<F> {
        self.request.borrow().clone()
    }

    #[must_use]
    pub fn page(&self) -> u32 {
        self.request.borrow().page
    }

    /// Moves to `page`, clamped to at least 1. The filter is unchanged.
    pub fn set_page(&self, page: u32) {
        let page = page.max(FIRST_PAGE);
        self.request.send_if_modified(|request| {
            if request.page == page {
                false
            } else {
                request.page = page;
                true
            }
        });
    }

    /// Advances one page unless already at `total_pages`.
    pub fn next_page(&self, total_pages: u32) {
        let page = self.page();
        if page < total_pages {
            self.set_page(page + 1);
        }
    }

    pub fn prev_page(&self) {
        self.set_page(self.page().saturating_sub(1));
    }

    /// A receiver that sees every (filter, page) change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<PageRequest<F>> {
        self.request.subscribe()
    }
}

impl<F: std::fmt::Debug> std::fmt::Debug for PagedFilter<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PagedFilter")
            .field("request", &*self.request.borrow())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::ManualTimer;

    const DELAY: Duration = Duration::from_millis(300);

    fn debouncer() -> (Debouncer<String>, ManualTimer) {
        let timer = ManualTimer::new();
        (Debouncer::new(Arc::new(timer.clone()), DELAY, String::new()), timer)
    }

    #[test]
    fn test_commits_after_quiet_period() {
        let (debouncer, timer) = debouncer();
        debouncer.input("ali".into());
        assert_eq!(debouncer.raw(), "ali");
        assert_eq!(debouncer.committed(), "");
        assert!(debouncer.is_pending());

        timer.advance(Duration::from_millis(299));
        assert_eq!(debouncer.committed(), "");

        timer.advance(Duration::from_millis(1));
        assert_eq!(debouncer.committed(), "ali");
        assert!(!debouncer.is_pending());
    }

    #[test]
    fn test_input_restarts_timer() {
        let (debouncer, timer) = debouncer();
        let mut rx = debouncer.subscribe();

        debouncer.input("ali".into());
        timer.advance(Duration::from_millis(100));
        debouncer.input("alice".into());
        timer.advance(Duration::from_millis(299));
        assert_eq!(debouncer.committed(), "");

        timer.advance(Duration::from_millis(1));
        assert_eq!(debouncer.committed(), "alice");
        assert!(rx.has_changed().unwrap_or(false));
        assert_eq!(*rx.borrow_and_update(), "alice");
    }

    #[test]
    fn test_unchanged_value_is_not_republished() {
        let (debouncer, timer) = debouncer();
        let rx = debouncer.subscribe();

        debouncer.input("x".into());
        debouncer.input(String::new());
        timer.advance(DELAY);

        assert!(!rx.has_changed().unwrap_or(true));
    }

    #[test]
    fn test_flush_commits_immediately() {
        let (debouncer, timer) = debouncer();
        debouncer.input("bob".into());
        debouncer.flush();
        assert_eq!(debouncer.committed(), "bob");
        assert_eq!(timer.pending(), 0);
    }

    #[test]
    fn test_concurrent_flushes_publish_last_commit() {
        let timer = ManualTimer::new();
        let hooked = Arc::new(Mutex::new(String::new()));
        let sink = hooked.clone();
        let debouncer = Debouncer::with_hook(Arc::new(timer), DELAY, String::new(), move |value: &String| {
            *sink.lock() = value.clone();
        });
        let rx = debouncer.subscribe();

        let typists: Vec<_> = ["ada", "obi"]
            .into_iter()
            .map(|name| {
                let debouncer = debouncer.clone();
                std::thread::spawn(move || {
                    for i in 0..2_000 {
                        debouncer.input(format!("{name}{i}"));
                        debouncer.flush();
                    }
                })
            })
            .collect();
        for typist in typists {
            typist.join().expect("typist thread");
        }

        let committed = debouncer.committed();
        assert_eq!(*rx.borrow(), committed);
        assert_eq!(*hooked.lock(), committed);
    }

    #[test]
    fn test_cancel_discards_input() {
        let (debouncer, timer) = debouncer();
        debouncer.input("bob".into());
        debouncer.cancel();
        timer.advance(DELAY);
        assert_eq!(debouncer.committed(), "");
        assert_eq!(debouncer.raw(), "");
    }

    #[test]
    fn test_filter_change_resets_page() {
        let timer = ManualTimer::new();
        let filter = PagedFilter::new(Arc::new(timer.clone()), DELAY, String::new());
        filter.set_page(3);
        let mut rx = filter.subscribe();
        let _ = rx.borrow_and_update();

        filter.input("alice".into());
        assert_eq!(filter.page(), 3, "raw input alone does not reset the page");
        timer.advance(DELAY);

        assert_eq!(
            *rx.borrow_and_update(),
            PageRequest {
                filter: "alice".to_string(),
                page: 1
            }
        );
    }

    #[test]
    fn test_page_navigation_is_clamped() {
        let timer = ManualTimer::new();
        let filter = PagedFilter::new(Arc::new(timer), DELAY, String::new());

        filter.prev_page();
        assert_eq!(filter.page(), 1);
        filter.next_page(2);
        filter.next_page(2);
        assert_eq!(filter.page(), 2);
        filter.set_page(0);
        assert_eq!(filter.page(), 1);
    }

    #[test]
    fn test_same_filter_keeps_page() {
        let timer = ManualTimer::new();
        let filter = PagedFilter::new(Arc::new(timer.clone()), DELAY, "ali".to_string());
        filter.set_page(4);

        filter.input("alic".into());
        filter.input("ali".into());
        timer.advance(DELAY);
        assert_eq!(filter.page(), 4);
    }
}
