//! Mutation inputs and their client-side validation.

use serde::Serialize;

use super::models::QuestionOption;
use crate::error::QueryError;

const REQUIRED_FIELDS: &str = "Please fill in all required fields";
const DEFAULT_TIME_SECONDS: u32 = 30;

fn required(value: &str) -> Result<(), QueryError> {
    if value.trim().is_empty() {
        Err(QueryError::ValidationError(REQUIRED_FIELDS.to_string()))
    } else {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

impl LoginInput {
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    pub fn validate(&self) -> Result<(), QueryError> {
        required(&self.email)?;
        required(&self.password)?;
        let valid_email = self
            .email
            .split_once('@')
            .is_some_and(|(user, domain)| !user.is_empty() && domain.contains('.'));
        if !valid_email {
            return Err(QueryError::ValidationError("Invalid Email Format".to_string()));
        }
        Ok(())
    }
}

/// Formats a `"min - max"` salary range in thousands of naira.
///
/// Returns `None` if the input is not two numbers separated by a hyphen.
///
/// ```
/// use workervet_query::api::format_salary_range;
///
/// assert_eq!(format_salary_range("150000 - 300000").as_deref(), Some("₦150k - ₦300k"));
/// assert_eq!(format_salary_range("lots"), None);
/// ```
#[must_use]
pub fn format_salary_range(range: &str) -> Option<String> {
    let (min, max) = range.split_once('-')?;
    let parse = |part: &str| part.trim().parse::<u64>().ok();
    let (min, max) = (parse(min)?, parse(max)?);
    let thousands = |n: u64| (n + 500) / 1000;
    Some(format!("₦{}k - ₦{}k", thousands(min), thousands(max)))
}

/// A job posting to create or replace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobInput {
    pub job_title: String,
    pub job_description: String,
    /// Department id.
    pub department: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requirements: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Raw `"min - max"` input; sent formatted.
    pub salary_range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

impl JobInput {
    pub fn validate(&self) -> Result<(), QueryError> {
        required(&self.job_title)?;
        required(&self.job_description)?;
        required(&self.department)?;
        if let Some(range) = self.salary_range.as_deref().filter(|range| !range.trim().is_empty()) {
            if format_salary_range(range).is_none() {
                return Err(QueryError::ValidationError(format!(
                    "Salary range '{range}' must look like 150000 - 300000"
                )));
            }
        }
        Ok(())
    }

    /// The request body, with the salary range formatted.
    #[must_use]
    pub fn body(&self) -> Self {
        let salary_range = self
            .salary_range
            .as_deref()
            .map(|range| format_salary_range(range).unwrap_or_default());
        Self {
            salary_range,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateJob {
    pub id: String,
    pub job: JobInput,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionInput {
    /// Skill id.
    pub skill_category: String,
    /// Department id.
    pub department: String,
    pub scenario: String,
    pub question_text: String,
    pub options: Vec<QuestionOption>,
    pub correct_option_index: u32,
    pub time_seconds: u32,
}

impl QuestionInput {
    #[must_use]
    pub fn new(
        skill_category: impl Into<String>,
        department: impl Into<String>,
        scenario: impl Into<String>,
        question_text: impl Into<String>,
    ) -> Self {
        Self {
            skill_category: skill_category.into(),
            department: department.into(),
            scenario: scenario.into(),
            question_text: question_text.into(),
            options: Vec::new(),
            correct_option_index: 0,
            time_seconds: DEFAULT_TIME_SECONDS,
        }
    }

    #[must_use]
    pub fn option(mut self, content: impl Into<String>) -> Self {
        self.options.push(QuestionOption::new(content));
        self
    }

    #[must_use]
    pub const fn correct(mut self, index: u32) -> Self {
        self.correct_option_index = index;
        self
    }

    pub fn validate(&self) -> Result<(), QueryError> {
        required(&self.scenario)?;
        required(&self.question_text)?;
        required(&self.skill_category)?;
        required(&self.department)?;
        if !self.options.is_empty() && self.correct_option_index as usize >= self.options.len() {
            return Err(QueryError::ValidationError(format!(
                "Correct option {} is out of range for {} options",
                self.correct_option_index + 1,
                self.options.len()
            )));
        }
        if self.time_seconds == 0 {
            return Err(QueryError::ValidationError("Time limit must be greater than zero".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateQuestion {
    pub id: String,
    pub question: QuestionInput,
}

/// Validates every question of a bulk import, naming the first bad row.
pub fn validate_bulk(questions: &[QuestionInput]) -> Result<(), QueryError> {
    if questions.is_empty() {
        return Err(QueryError::ValidationError("No questions to import".to_string()));
    }
    for (row, question) in questions.iter().enumerate() {
        question.validate().map_err(|err| match err {
            QueryError::ValidationError(reason) => {
                QueryError::ValidationError(format!("Row {}: {reason}", row + 1))
            }
            other => other,
        })?;
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkillInput {
    pub skill_name: String,
}

impl SkillInput {
    pub fn validate(&self) -> Result<(), QueryError> {
        required(&self.skill_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepartmentInput {
    pub department_name: String,
}

impl DepartmentInput {
    pub fn validate(&self) -> Result<(), QueryError> {
        required(&self.department_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_validation() {
        assert!(LoginInput::new("admin@workervet.test", "secret").validate().is_ok());
        assert_eq!(
            LoginInput::new("", "secret").validate(),
            Err(QueryError::ValidationError(REQUIRED_FIELDS.to_string()))
        );
        assert_eq!(
            LoginInput::new("admin", "secret").validate(),
            Err(QueryError::ValidationError("Invalid Email Format".to_string()))
        );
    }

    #[test]
    fn test_salary_range_format() {
        assert_eq!(format_salary_range("150000-300000").as_deref(), Some("₦150k - ₦300k"));
        assert_eq!(format_salary_range(" 99500 - 1000000 ").as_deref(), Some("₦100k - ₦1000k"));
        assert_eq!(format_salary_range("150000"), None);
        assert_eq!(format_salary_range("a - b"), None);
    }

    #[test]
    fn test_job_body_formats_salary() {
        let job = JobInput {
            job_title: "Cashier".to_string(),
            job_description: "Till".to_string(),
            department: "d1".to_string(),
            salary_range: Some("100000 - 200000".to_string()),
            ..JobInput::default()
        };
        assert!(job.validate().is_ok());
        assert_eq!(job.body().salary_range.as_deref(), Some("₦100k - ₦200k"));

        let bad = JobInput {
            salary_range: Some("negotiable".to_string()),
            ..job
        };
        assert!(matches!(bad.validate(), Err(QueryError::ValidationError(_))));
    }

    #[test]
    fn test_question_validation() {
        let question = QuestionInput::new("s1", "d1", "A customer asks...", "What do you do?")
            .option("Refuse")
            .option("Escalate")
            .correct(1);
        assert!(question.validate().is_ok());
        assert_eq!(question.time_seconds, 30);

        let out_of_range = question.clone().correct(2);
        assert!(matches!(out_of_range.validate(), Err(QueryError::ValidationError(_))));

        let missing_scenario = QuestionInput {
            scenario: String::new(),
            ..question
        };
        assert_eq!(
            missing_scenario.validate(),
            Err(QueryError::ValidationError(REQUIRED_FIELDS.to_string()))
        );
    }

    #[test]
    fn test_bulk_validation_names_row() {
        let good = QuestionInput::new("s1", "d1", "Scenario", "Question");
        let bad = QuestionInput::new("s1", "", "Scenario", "Question");
        assert_eq!(
            validate_bulk(&[good.clone(), bad]),
            Err(QueryError::ValidationError(format!("Row 2: {REQUIRED_FIELDS}")))
        );
        assert!(validate_bulk(&[good]).is_ok());
        assert!(validate_bulk(&[]).is_err());
    }
}
