//! The cached read endpoints, one marker type per resource tag.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::models::{
    AssessmentHistoryEntry, CandidatePage, CandidateSkills, DashboardMetrics, Department, DepartmentPassRate,
    DepartmentQuestions, JobPage, QuestionBankEntry, RecentAssessment, Skill, SkillPerformance, User, UserPage,
};
use super::params::{ById, CandidateParams, JobParams, UserParams};
use crate::error::QueryError;
use crate::transport::{Request, decode};

/// A read endpoint whose responses are cached under [`TAG`](Self::TAG).
pub trait Resource: Send + Sync + 'static {
    /// Resource tag, the first component of every cache key.
    const TAG: &'static str;

    type Params: Serialize + Clone + Send + Sync + 'static;
    type Output: DeserializeOwned + Send + Sync + 'static;

    /// The authenticated GET request for `params`.
    fn request(params: &Self::Params) -> Request;

    fn decode(body: Value) -> Result<Self::Output, QueryError> {
        decode(body)
    }

    /// Whether a query with these parameters should run at all.
    fn enabled(_params: &Self::Params) -> bool {
        true
    }

    /// Keep the previous data visible while a new key loads.
    fn keep_previous_data() -> bool {
        false
    }
}

macro_rules! resource {
    ($(#[$meta:meta])* $name:ident, $tag:literal, $path:literal, $output:ty) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $name;

        impl Resource for $name {
            const TAG: &'static str = $tag;
            type Params = ();
            type Output = $output;

            fn request(_params: &()) -> Request {
                Request::get($path).with_auth()
            }
        }
    };
}

macro_rules! resource_by_id {
    ($(#[$meta:meta])* $name:ident, $tag:literal, $prefix:literal, $suffix:literal, $output:ty) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $name;

        impl Resource for $name {
            const TAG: &'static str = $tag;
            type Params = ById;
            type Output = $output;

            fn request(params: &ById) -> Request {
                Request::get(format!("{}{}{}", $prefix, params.id, $suffix)).with_auth()
            }

            fn enabled(params: &ById) -> bool {
                params.is_set()
            }
        }
    };
}

/// The signed-in account. The payload is nested under `data`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Whoami;

impl Resource for Whoami {
    const TAG: &'static str = "whoami";
    type Params = ();
    type Output = User;

    fn request(_params: &()) -> Request {
        Request::get("auth/whoami").with_auth()
    }

    fn decode(mut body: Value) -> Result<User, QueryError> {
        let data = body
            .get_mut("data")
            .map(Value::take)
            .ok_or_else(|| QueryError::FetchError("whoami response has no data".to_string()))?;
        decode(data)
    }

    fn keep_previous_data() -> bool {
        true
    }
}

/// Candidates with their most recent assessment.
#[derive(Debug, Clone, Copy, Default)]
pub struct Candidates;

impl Resource for Candidates {
    const TAG: &'static str = "candidates";
    type Params = CandidateParams;
    type Output = CandidatePage;

    fn request(params: &CandidateParams) -> Request {
        params.apply(Request::get("users/candidates/recent-activity/").with_auth())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Jobs;

impl Resource for Jobs {
    const TAG: &'static str = "jobs";
    type Params = JobParams;
    type Output = JobPage;

    fn request(params: &JobParams) -> Request {
        params.apply(Request::get("jobs/").with_auth())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Users;

impl Resource for Users {
    const TAG: &'static str = "users";
    type Params = UserParams;
    type Output = UserPage;

    fn request(params: &UserParams) -> Request {
        params.apply(Request::get("users").with_auth())
    }
}

resource_by_id!(
    /// Per-skill scores of one candidate.
    CandidateSkillsOf, "candidate-skills", "assessment/candidate/", "/skills", CandidateSkills
);
resource_by_id!(
    /// Past assessments of one candidate.
    CandidateAssessmentHistory, "candidate-assessment-history", "assessment/history/", "", Vec<AssessmentHistoryEntry>
);
resource_by_id!(
    /// Questions of one department.
    DepartmentQuestionsOf, "department-questions", "questions/department/", "", DepartmentQuestions
);

resource!(RecentAssessments, "recent-assessments", "assessment/recent", Vec<RecentAssessment>);
resource!(DepartmentPassRates, "department-pass-rates", "assessment/department/pass-rate", Vec<DepartmentPassRate>);
resource!(GlobalSkillPerformance, "global-skill-performance", "assessment/global/skills", Vec<SkillPerformance>);
resource!(
    /// Headline numbers for the dashboard.
    DashboardMetricsSummary, "dashboard-metrics", "assessment/metrics", DashboardMetrics
);
resource!(
    /// Question counts per department.
    QuestionBank, "question-bank", "departments/by-questions", Vec<QuestionBankEntry>
);
resource!(Departments, "departments", "departments", Vec<Department>);
resource!(Skills, "skills", "skills", Vec<Skill>);
