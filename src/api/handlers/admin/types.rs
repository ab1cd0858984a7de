//! Request/response types for the admin API.
//!
//! These payloads are shared between handlers and `OpenAPI` generation.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct StudentRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    /// Date of birth, `YYYY-MM-DD`.
    pub dob: Option<String>,
    /// When given together with `email`, a student login is created. Ignored on update.
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CourseRequest {
    pub code: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
}

/// Identifier accepted either as a JSON number or as a numeric string.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum IdInput {
    Number(i64),
    Text(String),
}

impl IdInput {
    #[must_use]
    pub fn as_id(&self) -> Option<i64> {
        match self {
            Self::Number(id) => Some(*id),
            Self::Text(text) => text.trim().parse().ok(),
        }
        .filter(|id| *id > 0)
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct EnrollmentRequest {
    pub student_id: Option<IdInput>,
    pub course_id: Option<IdInput>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct StatsResponse {
    pub students: i64,
    pub courses: i64,
    pub enrollments: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StudentResponse {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub dob: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CourseResponse {
    pub id: i64,
    pub code: String,
    pub title: String,
    pub description: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EnrollmentResponse {
    pub id: i64,
    pub student_id: i64,
    pub course_id: i64,
    pub student_name: String,
    pub course_code: String,
    pub course_title: String,
    pub created_at: String,
}
