//! HTTP transport for the admin API.
//!
//! The cache never talks HTTP itself; fetchers and mutations go through a
//! [`Transport`]. [`HttpTransport`] is the real one, backed by `reqwest`;
//! [`mock::MockTransport`] scripts responses for tests.
//!
//! Every failure comes back as a [`QueryError`] whose message is ready to
//! display. Server errors of the form `{"message": ["SKILL_NOT_FOUND"]}` are
//! turned into "Skill Not Found".

pub mod mock;

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::Url;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{ApiConfig, ConfigError};
use crate::error::QueryError;

/// HTTP method of a [`Request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => Self::GET,
            Method::Post => Self::POST,
            Method::Put => Self::PUT,
            Method::Patch => Self::PATCH,
            Method::Delete => Self::DELETE,
        }
    }
}

/// One API call, relative to the configured base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    /// Path below the base URL, e.g. `skills/123`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    /// Send session credentials (cookie and bearer token).
    pub with_auth: bool,
}

impl Request {
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            with_auth: false,
        }
    }

    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    #[must_use]
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::Patch, path)
    }

    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    /// Adds a query parameter. Empty strings are skipped.
    #[must_use]
    pub fn query(mut self, name: &str, value: impl ToString) -> Self {
        let value = value.to_string();
        if !value.is_empty() {
            self.query.push((name.to_string(), value));
        }
        self
    }

    /// Adds a query parameter if present and not empty.
    #[must_use]
    pub fn query_opt(self, name: &str, value: Option<impl ToString>) -> Self {
        match value {
            Some(value) => self.query(name, value),
            None => self,
        }
    }

    /// Sets a JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::ValidationError`] if `body` cannot be serialized.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, QueryError> {
        let value = serde_json::to_value(body)
            .map_err(|err| QueryError::ValidationError(format!("request body: {err}")))?;
        self.body = Some(value);
        Ok(self)
    }

    #[must_use]
    pub const fn with_auth(mut self) -> Self {
        self.with_auth = true;
        self
    }
}

/// Sends requests and returns the decoded JSON body.
pub trait Transport: Send + Sync + 'static {
    fn request(&self, request: Request) -> BoxFuture<'static, Result<Value, QueryError>>;
}

/// Decodes a JSON body into `T`.
///
/// # Errors
///
/// Returns [`QueryError::FetchError`] if the body does not match `T`.
pub fn decode<T: DeserializeOwned>(value: Value) -> Result<T, QueryError> {
    serde_json::from_value(value).map_err(|err| QueryError::FetchError(format!("unexpected response: {err}")))
}

/// Turns a `SNAKE_CASE` error code into title-cased words.
///
/// ```
/// use workervet_query::transport::humanize_code;
///
/// assert_eq!(humanize_code("SKILL_NOT_FOUND"), "SKILL NOT FOUND");
/// assert_eq!(humanize_code("skill_not_found"), "Skill Not Found");
/// ```
#[must_use]
pub fn humanize_code(code: &str) -> String {
    code.split('_')
        .filter(|word| !word.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// Builds the display error for a non-2xx response.
///
/// A `message` array uses its first code, humanized; a `message` string is
/// used as is; anything else falls back to the status code.
#[must_use]
pub fn normalize_error(status: u16, body: &[u8]) -> QueryError {
    let message = serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|value| match value.get("message") {
            Some(Value::Array(codes)) => codes.first().and_then(Value::as_str).map(humanize_code),
            Some(Value::String(message)) if !message.is_empty() => Some(message.clone()),
            _ => None,
        })
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| format!("Request failed with status code {status}"));

    QueryError::HttpError { status, message }
}

fn decode_body(body: &[u8]) -> Result<Value, QueryError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body).map_err(|err| QueryError::FetchError(format!("invalid JSON response: {err}")))
}

/// `reqwest`-backed transport with a session cookie jar.
///
/// Cookies set by any response are stored; they are only sent on requests
/// marked [`with_auth`](Request::with_auth).
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    jar: Arc<Jar>,
    bearer_token: Option<String>,
}

impl HttpTransport {
    /// # Errors
    ///
    /// Returns [`ConfigError::Client`] if the HTTP client cannot be built.
    pub fn new(config: &ApiConfig) -> Result<Self, ConfigError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout_ms {
            builder = builder.timeout(Duration::from_millis(timeout));
        }
        let client = builder.build().map_err(|err| ConfigError::Client(err.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            jar: Arc::new(Jar::default()),
            bearer_token: config.bearer_token.clone(),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> Result<Url, QueryError> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        Url::parse(&url).map_err(|err| QueryError::ValidationError(format!("invalid URL {url}: {err}")))
    }
}

impl Transport for HttpTransport {
    fn request(&self, request: Request) -> BoxFuture<'static, Result<Value, QueryError>> {
        let url = match self.url(&request.path) {
            Ok(url) => url,
            Err(err) => return futures::future::ready(Err(err)).boxed(),
        };
        let client = self.client.clone();
        let jar = self.jar.clone();
        let bearer_token = self.bearer_token.clone();

        async move {
            let method = request.method;
            let mut builder = client.request(method.into(), url.clone());
            if !request.query.is_empty() {
                builder = builder.query(&request.query);
            }
            if let Some(body) = &request.body {
                builder = builder.json(body);
            }
            if request.with_auth {
                if let Some(cookie) = jar.cookies(&url) {
                    builder = builder.header(COOKIE, cookie);
                }
                if let Some(token) = &bearer_token {
                    builder = builder.bearer_auth(token);
                }
            }

            debug!(%method, path = %request.path, "sending request");
            let response = builder.send().await.map_err(|err| {
                warn!(%method, path = %request.path, error = %err, "request failed");
                QueryError::NetworkError(err.to_string())
            })?;

            {
                let mut set_cookies = response.headers().get_all(SET_COOKIE).iter().peekable();
                if set_cookies.peek().is_some() {
                    jar.set_cookies(&mut set_cookies, response.url());
                }
            }

            let status = response.status();
            let body = response
                .bytes()
                .await
                .map_err(|err| QueryError::NetworkError(err.to_string()))?;

            if status.is_success() {
                decode_body(&body)
            } else {
                let err = normalize_error(status.as_u16(), &body);
                debug!(%method, path = %request.path, status = status.as_u16(), error = %err, "request rejected");
                Err(err)
            }
        }
        .boxed()
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}
