//! Response bodies of the admin REST API.
//!
//! Timestamps are kept as the ISO-8601 strings the server sends.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Candidate,
    Admin,
}

impl UserRole {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Candidate => "candidate",
            Self::Admin => "admin",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Inactive,
}

impl UserStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

/// Assessment verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Pass,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CvFile {
    pub filename: String,
    pub url: String,
}

/// A signed-in account, as returned by `auth/whoami` and login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    pub role: UserRole,
    #[serde(default)]
    pub cv: Option<CvFile>,
    #[serde(default)]
    pub status: Option<UserStatus>,
    #[serde(default)]
    pub target_department: Option<String>,
}

impl User {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    #[serde(rename = "_id")]
    pub id: String,
    pub department_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skill {
    #[serde(rename = "_id")]
    pub id: String,
    pub skill_name: String,
}

/// A reference the server sends either as an id or populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Ref<T> {
    Id(String),
    Populated(T),
}

impl Ref<Department> {
    /// The department name if populated, otherwise the raw id.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Id(id) => id,
            Self::Populated(department) => &department.department_name,
        }
    }
}

impl Ref<Skill> {
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Id(id) => id,
            Self::Populated(skill) => &skill.skill_name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentActivity {
    pub department_name: String,
    pub result: Outcome,
    #[serde(default)]
    pub submitted_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateActivity {
    #[serde(rename = "_id")]
    pub id: String,
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub target_department: Option<Ref<Department>>,
    #[serde(default)]
    pub cv: Option<CvFile>,
    #[serde(default)]
    pub recent_activity: Option<RecentActivity>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    #[serde(rename = "totalPages")]
    pub total_pages: u32,
    #[serde(default)]
    pub search: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidatePage {
    pub data: Vec<CandidateActivity>,
    pub meta: PageMeta,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSkill {
    pub skill_id: String,
    pub skill_name: String,
    #[serde(default)]
    pub percentage: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSkills {
    pub candidate_id: String,
    pub candidate_name: String,
    pub total_assessments: u64,
    pub pass_rate: f64,
    pub avg_score: f64,
    pub skills: Vec<CandidateSkill>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentHistoryEntry {
    pub date: String,
    pub job_name: String,
    pub department_name: String,
    pub score: String,
    pub percentage: f64,
    pub result: Outcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentAssessment {
    pub participant_name: String,
    pub job_department: String,
    pub percentage: f64,
    pub result: Outcome,
    #[serde(default)]
    pub submitted_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepartmentPassRate {
    pub department_name: String,
    #[serde(default)]
    pub percentage: f64,
    pub total_people: u64,
    pub total_passed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillPerformance {
    pub skill_id: String,
    pub skill_name: String,
    #[serde(default)]
    pub average_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardMetrics {
    pub total_candidates: u64,
    #[serde(rename = "totalCandidatesMoM")]
    pub total_candidates_mom: f64,
    pub assessments_taken: u64,
    pub assessments_passed: u64,
    #[serde(rename = "passRateMoM")]
    pub pass_rate_mom: f64,
    pub avg_pass_rate: f64,
    pub active_jobs_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub job_title: String,
    pub job_description: String,
    pub department: Ref<Department>,
    #[serde(default)]
    pub requirements: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub salary_range: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub is_certified: Option<bool>,
    #[serde(default)]
    pub is_applied: Option<bool>,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<String>,
    #[serde(rename = "updatedAt", default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JobFilters {
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPageMeta {
    #[serde(default)]
    pub filters: JobFilters,
    pub limit: u32,
    pub page: u32,
    pub total: u64,
    #[serde(rename = "totalPages")]
    pub total_pages: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPage {
    pub data: Vec<Job>,
    pub meta: JobPageMeta,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionBankEntry {
    pub department_id: String,
    pub department_name: String,
    pub question_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub content: String,
}

impl QuestionOption {
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            id: None,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub skill_category: Ref<Skill>,
    pub department: String,
    #[serde(default)]
    pub scenario: Option<String>,
    pub question_text: String,
    pub time_seconds: u32,
    #[serde(default)]
    pub options: Vec<QuestionOption>,
    #[serde(default)]
    pub correct_option_id: Option<String>,
    #[serde(default)]
    pub correct_option_index: Option<u32>,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<String>,
    #[serde(rename = "updatedAt", default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentQuestions {
    pub department_id: String,
    pub total: u64,
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPage {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    #[serde(rename = "totalPages")]
    pub total_pages: u32,
    pub users: Vec<User>,
}

/// Body of a successful admin login.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoginResponse {
    pub user: User,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_job_department_as_id_or_object() {
        let by_id: Job = serde_json::from_value(json!({
            "_id": "j1",
            "job_title": "Cashier",
            "job_description": "Till",
            "department": "d1"
        }))
        .expect("decodes");
        assert_eq!(by_id.department, Ref::Id("d1".to_string()));

        let populated: Job = serde_json::from_value(json!({
            "job_title": "Cashier",
            "job_description": "Till",
            "department": { "_id": "d1", "department_name": "Finance" },
            "createdAt": "2025-01-01T00:00:00.000Z"
        }))
        .expect("decodes");
        assert_eq!(populated.department.label(), "Finance");
        assert_eq!(populated.created_at.as_deref(), Some("2025-01-01T00:00:00.000Z"));
    }

    #[test]
    fn test_dashboard_metrics_field_names() {
        let metrics: DashboardMetrics = serde_json::from_value(json!({
            "totalCandidates": 12,
            "totalCandidatesMoM": 8.5,
            "assessmentsTaken": 30,
            "assessmentsPassed": 21,
            "passRateMoM": -2.0,
            "avgPassRate": 70.0,
            "activeJobsCount": 4
        }))
        .expect("decodes");
        assert_eq!(metrics.total_candidates, 12);
        assert!((metrics.pass_rate_mom + 2.0).abs() < f64::EPSILON);
        assert_eq!(metrics.active_jobs_count, 4);
    }

    #[test]
    fn test_user_optional_fields() {
        let user: User = serde_json::from_value(json!({
            "_id": "u1",
            "full_name": "Ada Obi",
            "email": "ada@workervet.test",
            "role": "admin",
            "cv": null
        }))
        .expect("decodes");
        assert!(user.is_admin());
        assert_eq!(user.cv, None);
        assert_eq!(user.phone, "");
    }
}
