//! Enrollment handlers.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Extension, Path,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;

use super::{
    json_body, path_id,
    storage::{self, AdminError},
    types::{EnrollmentRequest, EnrollmentResponse},
};
use crate::api::handlers::auth::types::ErrorResponse;

fn parse_ids(request: &EnrollmentRequest) -> Result<(i64, i64), AdminError> {
    let student_id = request.student_id.as_ref().and_then(|id| id.as_id());
    let course_id = request.course_id.as_ref().and_then(|id| id.as_id());
    match (student_id, course_id) {
        (Some(student_id), Some(course_id)) => Ok((student_id, course_id)),
        _ => Err(AdminError::BadRequest("student_id and course_id are required")),
    }
}

#[utoipa::path(
    get,
    path = "/api/admin/enrollments",
    responses(
        (status = 200, description = "Enrollments with student and course names.", body = [EnrollmentResponse]),
        (status = 401, description = "Missing or invalid session."),
        (status = 403, description = "Session is not an admin."),
    ),
    tag = "admin"
)]
pub async fn list_enrollments(pool: Extension<PgPool>) -> impl IntoResponse {
    match storage::list_enrollments(&pool).await {
        Ok(rows) => (StatusCode::OK, Json(rows)).into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/admin/enrollments",
    request_body = EnrollmentRequest,
    responses(
        (status = 201, description = "Student enrolled.", body = EnrollmentResponse),
        (status = 400, description = "Missing or malformed ids.", body = ErrorResponse),
        (status = 404, description = "Student or course not found.", body = ErrorResponse),
        (status = 409, description = "Already enrolled.", body = ErrorResponse),
    ),
    tag = "admin"
)]
pub async fn create_enrollment(
    pool: Extension<PgPool>,
    payload: Result<Json<EnrollmentRequest>, JsonRejection>,
) -> impl IntoResponse {
    let request = match json_body(payload) {
        Ok(request) => request,
        Err(err) => return err.into_response(),
    };
    let (student_id, course_id) = match parse_ids(&request) {
        Ok(ids) => ids,
        Err(err) => return err.into_response(),
    };

    match storage::create_enrollment(&pool, student_id, course_id).await {
        Ok(created) => (StatusCode::CREATED, Json(created)).into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/api/admin/enrollments/{id}",
    params(("id" = i64, Path, description = "Enrollment id")),
    responses(
        (status = 204, description = "Enrollment removed."),
        (status = 400, description = "Invalid id.", body = ErrorResponse),
        (status = 404, description = "Enrollment not found.", body = ErrorResponse),
    ),
    tag = "admin"
)]
pub async fn delete_enrollment(
    id: Result<Path<i64>, PathRejection>,
    pool: Extension<PgPool>,
) -> impl IntoResponse {
    let id = match path_id(id) {
        Ok(id) => id,
        Err(err) => return err.into_response(),
    };
    match storage::delete_enrollment(&pool, id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => AdminError::NotFound("Enrollment not found").into_response(),
        Err(err) => err.into_response(),
    }
}
