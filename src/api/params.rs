//! Query parameters for the list and detail resources.
//!
//! Blank strings and `None` are left out of both the cache key and the
//! request URL, so an empty search box and no search share one entry.

use serde::Serialize;

use super::models::{UserRole, UserStatus};
use crate::debounce::PageRequest;
use crate::transport::Request;

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(|value| value.trim().is_empty())
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|value| !value.trim().is_empty())
}

fn non_zero(value: Option<u32>) -> Option<u32> {
    value.filter(|value| *value > 0)
}

// Zero pages and limits are never sent, so they stay out of the key too.
fn is_unset(value: &Option<u32>) -> bool {
    non_zero(*value).is_none()
}

const fn is_zero(value: &u32) -> bool {
    *value == 0
}

/// Parameters of a resource addressed by id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct ById {
    pub id: String,
}

impl ById {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// Queries by id stay disabled until an id is chosen.
    #[must_use]
    pub fn is_set(&self) -> bool {
        !self.id.trim().is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct CandidateParams {
    #[serde(skip_serializing_if = "is_blank")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "is_unset")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "is_unset")]
    pub limit: Option<u32>,
}

impl CandidateParams {
    /// Parameters for a debounced search box at its current page.
    #[must_use]
    pub fn from_page(request: &PageRequest<String>, limit: u32) -> Self {
        Self {
            search: Some(request.filter.clone()),
            page: Some(request.page),
            limit: Some(limit),
        }
    }

    pub(crate) fn apply(&self, request: Request) -> Request {
        request
            .query_opt("page", non_zero(self.page))
            .query_opt("limit", non_zero(self.limit))
            .query_opt("search", non_blank(&self.search))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct JobParams {
    #[serde(skip_serializing_if = "is_unset")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "is_unset")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "is_blank")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "is_blank")]
    pub department: Option<String>,
    #[serde(skip_serializing_if = "is_blank")]
    pub job: Option<String>,
}

impl JobParams {
    #[must_use]
    pub fn from_page(request: &PageRequest<String>, limit: u32) -> Self {
        Self {
            page: Some(request.page),
            limit: Some(limit),
            search: Some(request.filter.clone()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn department(mut self, department: impl Into<String>) -> Self {
        self.department = Some(department.into());
        self
    }

    pub(crate) fn apply(&self, request: Request) -> Request {
        request
            .query_opt("page", non_zero(self.page))
            .query_opt("limit", non_zero(self.limit))
            .query_opt("search", non_blank(&self.search))
            .query_opt("department", non_blank(&self.department))
            .query_opt("job", non_blank(&self.job))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct UserParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<UserStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<UserRole>,
    #[serde(skip_serializing_if = "is_blank")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "is_zero")]
    pub page: u32,
    #[serde(skip_serializing_if = "is_zero")]
    pub limit: u32,
}

impl UserParams {
    #[must_use]
    pub fn from_page(request: &PageRequest<String>, limit: u32) -> Self {
        Self {
            search: Some(request.filter.clone()),
            page: request.page,
            limit,
            ..Self::default()
        }
    }

    pub(crate) fn apply(&self, request: Request) -> Request {
        request
            .query_opt("search", non_blank(&self.search))
            .query_opt("status", self.status.map(UserStatus::as_str))
            .query_opt("role", self.role.map(UserRole::as_str))
            .query_opt("page", non_zero(Some(self.page)))
            .query_opt("limit", non_zero(Some(self.limit)))
    }
}
