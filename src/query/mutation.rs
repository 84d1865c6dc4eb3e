//! Writes that invalidate the queries they affect.
//!
//! A [`Mutation`] validates its input, sends it, and on success invalidates
//! every registered [`KeyFilter`]. On failure nothing is invalidated, so the
//! screen keeps its last known good data. An optional optimistic update writes
//! to the cache before the request goes out and is rolled back on failure.
//!
//! # Example
//!
//! ```rust,no_run
//! use futures::FutureExt;
//! use workervet_query::error::QueryError;
//! use workervet_query::query::{KeyFilter, Mutation, QueryClient};
//!
//! # async fn demo(client: QueryClient) -> Result<(), QueryError> {
//! let create_skill = Mutation::new(|name: String| {
//!     async move { Ok(serde_json::json!({ "skill_name": name })) }.boxed()
//! })
//! .validate_with(|name: &String| {
//!     if name.trim().is_empty() {
//!         Err(QueryError::ValidationError("Skill name is required".into()))
//!     } else {
//!         Ok(())
//!     }
//! })
//! .invalidates(KeyFilter::resource("skills"));
//!
//! create_skill.execute(&client, "Teamwork".to_string()).await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{debug, info, warn};

use crate::Command;
use crate::error::QueryError;

use super::client::{QueryClient, QueryDataSnapshot};
use super::key::KeyFilter;

type Mutator<I, O> = Arc<dyn Fn(I) -> BoxFuture<'static, Result<O, QueryError>> + Send + Sync>;
type Validator<I> = Arc<dyn Fn(&I) -> Result<(), QueryError> + Send + Sync>;
type Optimistic<I> = Arc<dyn Fn(&QueryClient, &I) -> Vec<QueryDataSnapshot> + Send + Sync>;
type OnSuccess = Arc<dyn Fn(&QueryClient) + Send + Sync>;

/// The state of a mutation as tracked by a form or button.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationState<T> {
    /// Not yet submitted.
    Idle,
    /// Request in flight.
    Pending,
    Success(T),
    Error(QueryError),
}

impl<T> MutationState<T> {
    /// Returns the result data if the mutation succeeded, otherwise `None`.
    pub const fn data(&self) -> Option<&T> {
        match self {
            Self::Success(data) => Some(data),
            _ => None,
        }
    }

    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

impl<T> From<Result<T, QueryError>> for MutationState<T> {
    fn from(result: Result<T, QueryError>) -> Self {
        match result {
            Ok(data) => Self::Success(data),
            Err(err) => Self::Error(err),
        }
    }
}

/// A server write plus the cache keys it invalidates.
pub struct Mutation<I, O> {
    name: String,
    mutator: Mutator<I, O>,
    validator: Option<Validator<I>>,
    invalidates: Vec<KeyFilter>,
    optimistic: Option<Optimistic<I>>,
    on_success: Option<OnSuccess>,
}

impl<I, O> Mutation<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    pub fn new<F>(mutator: F) -> Self
    where
        F: Fn(I) -> BoxFuture<'static, Result<O, QueryError>> + Send + Sync + 'static,
    {
        Self {
            name: "mutation".to_string(),
            mutator: Arc::new(mutator),
            validator: None,
            invalidates: Vec::new(),
            optimistic: None,
            on_success: None,
        }
    }

    /// Name used in logs.
    #[must_use]
    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Rejects input before anything is sent.
    #[must_use]
    pub fn validate_with(mut self, validator: impl Fn(&I) -> Result<(), QueryError> + Send + Sync + 'static) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Adds a filter to invalidate after success.
    #[must_use]
    pub fn invalidates(mut self, filter: impl Into<KeyFilter>) -> Self {
        self.invalidates.push(filter.into());
        self
    }

    /// Writes to the cache before sending.
    ///
    /// `update` returns the snapshots to restore if the request fails.
    #[must_use]
    pub fn optimistic(
        mut self,
        update: impl Fn(&QueryClient, &I) -> Vec<QueryDataSnapshot> + Send + Sync + 'static,
    ) -> Self {
        self.optimistic = Some(Arc::new(update));
        self
    }

    /// Runs after success, after invalidation.
    #[must_use]
    pub fn on_success(mut self, hook: impl Fn(&QueryClient) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn invalidation_filters(&self) -> &[KeyFilter] {
        &self.invalidates
    }

    /// Validates, sends, and invalidates on success.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::ValidationError`] without sending if validation
    /// fails, or the transport's error if the request fails.
    pub async fn execute(&self, client: &QueryClient, input: I) -> Result<O, QueryError> {
        if let Some(validator) = &self.validator {
            if let Err(err) = validator(&input) {
                debug!(mutation = %self.name, error = %err, "mutation rejected by validation");
                return Err(err);
            }
        }

        let rollback = self
            .optimistic
            .as_ref()
            .map(|update| update(client, &input))
            .unwrap_or_default();

        match (self.mutator)(input).await {
            Ok(output) => {
                let matched: usize = self.invalidates.iter().map(|filter| client.invalidate(filter)).sum();
                info!(mutation = %self.name, invalidated = matched, "mutation succeeded");
                if let Some(hook) = &self.on_success {
                    hook(client);
                }
                Ok(output)
            }
            Err(err) => {
                warn!(mutation = %self.name, error = %err, "mutation failed");
                for snapshot in rollback.into_iter().rev() {
                    client.restore(snapshot);
                }
                Err(err)
            }
        }
    }

    /// Runs [`execute`](Self::execute) as a [`Command`].
    ///
    /// The returned command produces `Result<O, QueryError>` which can be mapped
    /// to your application's message type using [`Command::map`].
    pub fn mutate(self: Arc<Self>, client: QueryClient, input: I) -> Command<Result<O, QueryError>> {
        Command::future(async move { self.execute(&client, input).await })
    }
}

impl<I, O> std::fmt::Debug for Mutation<I, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mutation")
            .field("name", &self.name)
            .field("invalidates", &self.invalidates)
            .field("optimistic", &self.optimistic.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Action;
    use crate::query::{QueryKey, QueryStatus};
    use futures::{FutureExt, StreamExt};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn seeded(client: &QueryClient) -> QueryKey {
        let key = QueryKey::new("skills");
        client.set_query_data(&key, vec!["Integrity".to_string(), "Teamwork".to_string()]);
        key
    }

    fn delete_skill(fail: bool) -> Mutation<String, ()> {
        Mutation::new(move |_id: String| {
            async move {
                if fail {
                    Err(QueryError::HttpError {
                        status: 404,
                        message: "Skill Not Found".into(),
                    })
                } else {
                    Ok(())
                }
            }
            .boxed()
        })
        .invalidates(KeyFilter::resource("skills"))
    }

    #[test]
    fn test_mutation_state_predicates() {
        let idle: MutationState<i32> = MutationState::Idle;
        assert!(!idle.is_pending() && !idle.is_success() && !idle.is_error());
        assert!(MutationState::<i32>::Pending.is_pending());

        let success: MutationState<i32> = Ok(42).into();
        assert_eq!(success.data(), Some(&42));

        let failed: MutationState<i32> = Err(QueryError::ValidationError("x".into())).into();
        assert!(failed.is_error());
        assert_eq!(failed.data(), None);
    }

    #[tokio::test]
    async fn test_success_invalidates() {
        let client = QueryClient::new();
        let key = seeded(&client);

        delete_skill(false)
            .execute(&client, "s1".into())
            .await
            .expect("delete should succeed");

        assert_eq!(client.get(&key).status, QueryStatus::Stale);
    }

    #[tokio::test]
    async fn test_failure_does_not_invalidate() {
        let client = QueryClient::new();
        let key = seeded(&client);

        let err = delete_skill(true)
            .execute(&client, "s1".into())
            .await
            .expect_err("delete should fail");

        assert_eq!(err.to_string(), "Skill Not Found");
        assert_eq!(client.get(&key).status, QueryStatus::Success);
    }

    #[tokio::test]
    async fn test_validation_short_circuits() {
        let client = QueryClient::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mutation = Mutation::new(move |_name: String| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }.boxed()
        })
        .validate_with(|name: &String| {
            if name.is_empty() {
                Err(QueryError::ValidationError("Skill name is required".into()))
            } else {
                Ok(())
            }
        });

        let result = mutation.execute(&client, String::new()).await;
        assert!(matches!(result, Err(QueryError::ValidationError(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_optimistic_update_rolls_back() {
        let client = QueryClient::new();
        let key = seeded(&client);

        let mutation = delete_skill(true).optimistic(|client, id: &String| {
            let key = QueryKey::new("skills");
            let Some(current) = client.get_query_data::<Vec<String>>(&key) else {
                return Vec::new();
            };
            let remaining: Vec<String> = current.iter().filter(|s| *s != id).cloned().collect();
            vec![client.set_query_data(&key, remaining)]
        });

        let _ = mutation.execute(&client, "Integrity".into()).await;
        assert_eq!(
            client.get_query_data::<Vec<String>>(&key).map(|v| v.len()),
            Some(2),
            "failed delete restores the removed item"
        );
    }

    #[tokio::test]
    async fn test_on_success_hook_runs() {
        let client = QueryClient::new();
        seeded(&client);
        let mutation = delete_skill(false).on_success(QueryClient::clear);

        mutation.execute(&client, "s1".into()).await.expect("ok");
        assert!(client.is_empty());
    }

    #[tokio::test]
    async fn test_mutate_command() {
        let client = QueryClient::new();
        let cmd = Arc::new(delete_skill(false)).mutate(client, "s1".into());

        let mut stream = cmd.stream.expect("mutation should produce a stream");
        match stream.next().await {
            Some(Action::Message(result)) => assert!(result.is_ok()),
            _ => panic!("expected a message"),
        }
    }
}
