//! Typed access to the Workervet admin API through the query cache.
//!
//! Reads go through [`Resource`] types, so every screen asking for the same
//! resource and parameters shares one cache entry and one request. Writes are
//! [`Mutation`]s that declare which resources they make stale.
//!
//! | write | invalidates |
//! |---|---|
//! | login | `whoami` |
//! | logout | everything (cache cleared) |
//! | job create/update/delete | `jobs`, `dashboard-metrics` |
//! | question create/update/delete/bulk | `department-questions`, `question-bank` |
//! | skill create/delete | `skills`, `global-skill-performance`, `candidate-skills` |
//! | department create/delete | `departments`, `question-bank`, `department-pass-rates`, `recent-assessments`, `jobs` |
//!
//! ```
//! use std::sync::Arc;
//! use serde_json::json;
//! use workervet_query::api::{AdminApi, Skills};
//! use workervet_query::query::QueryClient;
//! use workervet_query::transport::{Method, mock::MockTransport};
//!
//! # tokio_test_block_on(async {
//! let transport = MockTransport::new();
//! transport.on(Method::Get, "skills", Ok(json!([{ "_id": "s1", "skill_name": "Integrity" }])));
//!
//! let api = AdminApi::new(Arc::new(transport.clone()), QueryClient::new());
//! let skills = api.fetch::<Skills>(()).await.unwrap();
//! assert_eq!(skills[0].skill_name, "Integrity");
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
//! # }
//! ```

mod inputs;
mod models;
mod params;
mod resources;

use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::{Value, json};

pub use inputs::{
    DepartmentInput, JobInput, LoginInput, QuestionInput, SkillInput, UpdateJob, UpdateQuestion, format_salary_range,
    validate_bulk,
};
pub use models::{
    AssessmentHistoryEntry, CandidateActivity, CandidatePage, CandidateSkill, CandidateSkills, CvFile,
    DashboardMetrics, Department, DepartmentPassRate, DepartmentQuestions, Job, JobFilters, JobPage, JobPageMeta,
    LoginResponse, Outcome, PageMeta, Question, QuestionBankEntry, QuestionOption, RecentActivity, RecentAssessment,
    Ref, Skill, SkillPerformance, User, UserPage, UserRole, UserStatus,
};
pub use params::{ById, CandidateParams, JobParams, UserParams};
pub use resources::{
    CandidateAssessmentHistory, CandidateSkillsOf, Candidates, DashboardMetricsSummary, DepartmentPassRates,
    Departments, DepartmentQuestionsOf, GlobalSkillPerformance, Jobs, QuestionBank, RecentAssessments, Resource,
    Skills, Users, Whoami,
};

use crate::config::{ApiConfig, ConfigError};
use crate::error::QueryError;
use crate::query::{KeyFilter, Mutation, QueryClient, QueryDataSnapshot, QueryKey, QueryObserver, QueryOptions};
use crate::subscription::query::Query;
use crate::transport::{HttpTransport, Request, Transport, decode};

/// The admin console's view of the API: a transport plus the shared cache.
#[derive(Clone)]
pub struct AdminApi {
    transport: Arc<dyn Transport>,
    client: QueryClient,
}

impl AdminApi {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, client: QueryClient) -> Self {
        Self { transport, client }
    }

    /// Connects to the configured API over HTTP.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration is invalid or the HTTP
    /// client cannot be built.
    pub fn from_config(config: &ApiConfig, client: QueryClient) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::new(Arc::new(HttpTransport::new(config)?), client))
    }

    #[must_use]
    pub const fn client(&self) -> &QueryClient {
        &self.client
    }

    #[must_use]
    pub fn transport(&self) -> Arc<dyn Transport> {
        self.transport.clone()
    }

    /// The cache key for `R` with `params`.
    #[must_use]
    pub fn key<R: Resource>(params: &R::Params) -> QueryKey {
        QueryKey::from_params(R::TAG, params)
    }

    /// Query options for `R`, including its enabled rule.
    #[must_use]
    pub fn options<R: Resource>(&self, params: R::Params) -> QueryOptions<R::Params, R::Output> {
        let transport = self.transport.clone();
        let enabled = R::enabled(&params);
        QueryOptions::new(R::TAG, params, move |params: R::Params| {
            let response = transport.request(R::request(&params));
            async move { R::decode(response.await?) }.boxed()
        })
        .enabled(enabled)
        .keep_previous_data(R::keep_previous_data())
    }

    /// Observes `R` with `params`, fetching unless fresh data is cached.
    #[must_use]
    pub fn observe<R: Resource>(&self, params: R::Params) -> QueryObserver<R::Params, R::Output> {
        QueryObserver::new(self.client.clone(), self.options::<R>(params))
    }

    /// `R` as a subscription source for an [`Application`](crate::application::Application).
    #[must_use]
    pub fn query<R: Resource>(&self, params: R::Params) -> Query<R::Params, R::Output> {
        Query::new(self.client.clone(), self.options::<R>(params))
    }

    /// One-shot read through the cache, deduplicated with any fetch in flight.
    pub fn fetch<R: Resource>(&self, params: R::Params) -> BoxFuture<'static, Result<Arc<R::Output>, QueryError>> {
        let key = Self::key::<R>(&params);
        let transport = self.transport.clone();
        self.client.fetch(&key, move || {
            let response = transport.request(R::request(&params));
            async move { R::decode(response.await?) }.boxed()
        })
    }

    /// `POST auth/admin/login`. Refreshes `whoami` on success.
    #[must_use]
    pub fn login(&self) -> Mutation<LoginInput, User> {
        let send = sender(self.transport.clone(), |input: LoginInput| Request::post("auth/admin/login").json(&input));
        Mutation::new(move |input: LoginInput| {
            let response = send(input);
            async move {
                let body: LoginResponse = decode(response.await?)?;
                Ok(body.user)
            }
            .boxed()
        })
        .named("login")
        .validate_with(LoginInput::validate)
        .invalidates(KeyFilter::resource(Whoami::TAG))
    }

    /// `POST auth/logout`, then purges every cached entry.
    #[must_use]
    pub fn logout(&self) -> Mutation<(), Value> {
        Mutation::new(sender(self.transport.clone(), |()| Request::post("auth/logout").json(&json!({}))))
            .named("logout")
            .on_success(QueryClient::clear)
    }

    #[must_use]
    pub fn create_job(&self) -> Mutation<JobInput, Value> {
        let send = sender(self.transport.clone(), |job: JobInput| Request::post("jobs").json(&job.body()));
        job_mutation(Mutation::new(send))
            .named("create_job")
            .validate_with(JobInput::validate)
    }

    #[must_use]
    pub fn update_job(&self) -> Mutation<UpdateJob, Value> {
        job_mutation(Mutation::new(sender(self.transport.clone(), |update: UpdateJob| {
            Request::patch(format!("jobs/{}", update.id)).json(&update.job.body())
        })))
        .named("update_job")
        .validate_with(|update: &UpdateJob| {
            require_id(&update.id)?;
            update.job.validate()
        })
    }

    #[must_use]
    pub fn delete_job(&self) -> Mutation<String, Value> {
        let send = sender(self.transport.clone(), |id: String| Ok(Request::delete(format!("jobs/{id}"))));
        job_mutation(Mutation::new(send))
            .named("delete_job")
            .validate_with(|id: &String| require_id(id))
    }

    #[must_use]
    pub fn create_question(&self) -> Mutation<QuestionInput, Value> {
        question_mutation(Mutation::new(
            sender(self.transport.clone(), |question: QuestionInput| Request::post("question").json(&question)),
        ))
        .named("create_question")
        .validate_with(QuestionInput::validate)
    }

    #[must_use]
    pub fn update_question(&self) -> Mutation<UpdateQuestion, Value> {
        question_mutation(Mutation::new(sender(self.transport.clone(), |update: UpdateQuestion| {
            Request::patch(format!("questions/{}", update.id)).json(&update.question)
        })))
        .named("update_question")
        .validate_with(|update: &UpdateQuestion| {
            require_id(&update.id)?;
            update.question.validate()
        })
    }

    #[must_use]
    pub fn delete_question(&self) -> Mutation<String, Value> {
        question_mutation(Mutation::new(
            sender(self.transport.clone(), |id: String| Ok(Request::delete(format!("questions/{id}")))),
        ))
        .named("delete_question")
        .validate_with(|id: &String| require_id(id))
    }

    /// `POST questions/bulk` with every row validated first.
    #[must_use]
    pub fn bulk_create_questions(&self) -> Mutation<Vec<QuestionInput>, Value> {
        let send = sender(self.transport.clone(), |questions: Vec<QuestionInput>| {
            Request::post("questions/bulk").json(&questions)
        });
        question_mutation(Mutation::new(send))
            .named("bulk_create_questions")
            .validate_with(|questions: &Vec<QuestionInput>| validate_bulk(questions))
    }

    #[must_use]
    pub fn create_skill(&self) -> Mutation<SkillInput, Value> {
        let send = sender(self.transport.clone(), |skill: SkillInput| Request::post("skills").json(&skill));
        skill_mutation(Mutation::new(send))
            .named("create_skill")
            .validate_with(SkillInput::validate)
    }

    /// Removes the skill from the cached list at once, restoring it if the
    /// request fails.
    #[must_use]
    pub fn delete_skill(&self) -> Mutation<String, Value> {
        let send = sender(self.transport.clone(), |id: String| Ok(Request::delete(format!("skills/{id}"))));
        skill_mutation(Mutation::new(send))
            .named("delete_skill")
            .validate_with(|id: &String| require_id(id))
            .optimistic(|client, id| remove_cached::<Skills, Skill>(client, |skill| skill.id == *id))
    }

    #[must_use]
    pub fn create_department(&self) -> Mutation<DepartmentInput, Value> {
        let send = sender(self.transport.clone(), |department: DepartmentInput| {
            Request::post("departments").json(&department)
        });
        department_mutation(Mutation::new(send))
            .named("create_department")
            .validate_with(DepartmentInput::validate)
    }

    /// Removes the department from the cached list at once, restoring it if
    /// the request fails.
    #[must_use]
    pub fn delete_department(&self) -> Mutation<String, Value> {
        department_mutation(Mutation::new(
            sender(self.transport.clone(), |id: String| Ok(Request::delete(format!("departments/{id}")))),
        ))
        .named("delete_department")
        .validate_with(|id: &String| require_id(id))
        .optimistic(|client, id| {
            remove_cached::<Departments, Department>(client, |department| department.id == *id)
        })
    }
}

impl std::fmt::Debug for AdminApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminApi")
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

/// Builds a request from the mutation input and sends it with credentials.
fn sender<I, F>(
    transport: Arc<dyn Transport>,
    build: F,
) -> impl Fn(I) -> BoxFuture<'static, Result<Value, QueryError>> + Send + Sync + 'static
where
    I: Send + 'static,
    F: Fn(I) -> Result<Request, QueryError> + Send + Sync + 'static,
{
    move |input| match build(input) {
        Ok(request) => transport.request(request.with_auth()),
        Err(err) => async move { Err(err) }.boxed(),
    }
}

fn require_id(id: &str) -> Result<(), QueryError> {
    if id.trim().is_empty() {
        Err(QueryError::ValidationError("Missing id".to_string()))
    } else {
        Ok(())
    }
}

fn job_mutation<I: Send + 'static>(mutation: Mutation<I, Value>) -> Mutation<I, Value> {
    mutation
        .invalidates(KeyFilter::resource(Jobs::TAG))
        .invalidates(KeyFilter::resource(DashboardMetricsSummary::TAG))
}

fn question_mutation<I: Send + 'static>(mutation: Mutation<I, Value>) -> Mutation<I, Value> {
    mutation
        .invalidates(KeyFilter::resource(DepartmentQuestionsOf::TAG))
        .invalidates(KeyFilter::resource(QuestionBank::TAG))
}

fn skill_mutation<I: Send + 'static>(mutation: Mutation<I, Value>) -> Mutation<I, Value> {
    mutation
        .invalidates(KeyFilter::resource(Skills::TAG))
        .invalidates(KeyFilter::resource(GlobalSkillPerformance::TAG))
        .invalidates(KeyFilter::resource(CandidateSkillsOf::TAG))
}

fn department_mutation<I: Send + 'static>(mutation: Mutation<I, Value>) -> Mutation<I, Value> {
    mutation
        .invalidates(KeyFilter::resource(Departments::TAG))
        .invalidates(KeyFilter::resource(QuestionBank::TAG))
        .invalidates(KeyFilter::resource(DepartmentPassRates::TAG))
        .invalidates(KeyFilter::resource(RecentAssessments::TAG))
        .invalidates(KeyFilter::resource(Jobs::TAG))
}

/// Drops matching items from the cached list of `R`, if cached.
fn remove_cached<R, T>(client: &QueryClient, remove: impl Fn(&T) -> bool) -> Vec<QueryDataSnapshot>
where
    R: Resource<Params = (), Output = Vec<T>>,
    T: Clone + Send + Sync + 'static,
{
    let key = AdminApi::key::<R>(&());
    let Some(current) = client.get_query_data::<Vec<T>>(&key) else {
        return Vec::new();
    };
    let kept: Vec<T> = current.iter().filter(|item| !remove(item)).cloned().collect();
    vec![client.set_query_data(&key, kept)]
}
