//! Scripted transport for tests.
//!
//! Routes match on method and path; query parameters are recorded but not
//! matched. Responses can be fixed, queued, or computed per request. While
//! [`hold`](MockTransport::hold) is active, requests are recorded but do not
//! resolve until [`release`](MockTransport::release).
//!
//! ```
//! use serde_json::json;
//! use workervet_query::transport::{Method, Request, Transport, mock::MockTransport};
//!
//! # tokio_test_block_on(async {
//! let transport = MockTransport::new();
//! transport.on(Method::Get, "skills", Ok(json!([{ "_id": "s1", "skill_name": "Integrity" }])));
//!
//! let body = transport.request(Request::get("skills")).await.unwrap();
//! assert_eq!(body[0]["skill_name"], "Integrity");
//! assert_eq!(transport.call_count(Method::Get, "skills"), 1);
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
//! # }
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::watch;

use super::{Method, Request, Transport};
use crate::error::QueryError;

type Response = Result<Value, QueryError>;
type Handler = Arc<dyn Fn(&Request) -> Response + Send + Sync>;

#[derive(Clone)]
enum Route {
    Fixed(Response),
    Queue(VecDeque<Response>),
    Handler(Handler),
}

#[derive(Default)]
struct State {
    routes: HashMap<(Method, String), Route>,
    calls: Vec<Request>,
}

/// A [`Transport`] whose responses are set up by the test.
///
/// Clones share routes, the call log, and the hold gate.
#[derive(Clone)]
pub struct MockTransport {
    state: Arc<Mutex<State>>,
    held: Arc<watch::Sender<bool>>,
}

impl MockTransport {
    #[must_use]
    pub fn new() -> Self {
        let (held, _) = watch::channel(false);
        Self {
            state: Arc::new(Mutex::new(State::default())),
            held: Arc::new(held),
        }
    }

    /// Always answers `method path` with `response`.
    pub fn on(&self, method: Method, path: &str, response: Response) -> &Self {
        self.route(method, path, Route::Fixed(response))
    }

    /// Answers successive calls with successive responses. The last one
    /// repeats once the queue is down to it.
    pub fn on_sequence(&self, method: Method, path: &str, responses: impl IntoIterator<Item = Response>) -> &Self {
        self.route(method, path, Route::Queue(responses.into_iter().collect()))
    }

    /// Computes each response from the request.
    pub fn on_with(
        &self,
        method: Method,
        path: &str,
        handler: impl Fn(&Request) -> Response + Send + Sync + 'static,
    ) -> &Self {
        self.route(method, path, Route::Handler(Arc::new(handler)))
    }

    fn route(&self, method: Method, path: &str, route: Route) -> &Self {
        self.state.lock().routes.insert((method, path.to_string()), route);
        self
    }

    /// Stops requests from resolving until [`release`](Self::release).
    pub fn hold(&self) {
        self.held.send_replace(true);
    }

    pub fn release(&self) {
        self.held.send_replace(false);
    }

    /// Every request received, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<Request> {
        self.state.lock().calls.clone()
    }

    #[must_use]
    pub fn call_count(&self, method: Method, path: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| call.method == method && call.path == path)
            .count()
    }

    /// The most recent request to `method path`.
    #[must_use]
    pub fn last_call(&self, method: Method, path: &str) -> Option<Request> {
        self.state
            .lock()
            .calls
            .iter()
            .rev()
            .find(|call| call.method == method && call.path == path)
            .cloned()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    fn respond(&self, request: &Request) -> Response {
        let mut state = self.state.lock();
        let key = (request.method, request.path.clone());
        match state.routes.get_mut(&key) {
            Some(Route::Fixed(response)) => response.clone(),
            Some(Route::Queue(queue)) => {
                if queue.len() > 1 {
                    queue.pop_front().unwrap_or_else(|| Err(not_found(request)))
                } else {
                    queue.front().cloned().unwrap_or_else(|| Err(not_found(request)))
                }
            }
            Some(Route::Handler(handler)) => {
                let handler = handler.clone();
                drop(state);
                handler(request)
            }
            None => Err(not_found(request)),
        }
    }
}

fn not_found(request: &Request) -> QueryError {
    QueryError::HttpError {
        status: 404,
        message: format!("Cannot {} /{}", request.method, request.path),
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MockTransport {
    fn request(&self, request: Request) -> BoxFuture<'static, Result<Value, QueryError>> {
        self.state.lock().calls.push(request.clone());
        let mock = self.clone();
        let mut held = self.held.subscribe();

        async move {
            let _ = held.wait_for(|held| !*held).await;
            mock.respond(&request)
        }
        .boxed()
    }
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MockTransport")
            .field("routes", &state.routes.len())
            .field("calls", &state.calls.len())
            .finish_non_exhaustive()
    }
}
