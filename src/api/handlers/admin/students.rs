//! Student CRUD handlers.

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
use std::sync::Arc;
use tracing::{info, instrument};

use super::{
    json_body, path_id,
    storage::{self, AdminError, StudentInput},
    types::{StudentRequest, StudentResponse},
};
use crate::api::handlers::{
    auth::{password::hash_password_blocking, types::ErrorResponse, AuthState},
    non_blank, valid_date, valid_email,
};

/// Trim and validate a student payload. Blank optional fields are treated as absent.
fn validate(request: &StudentRequest) -> Result<StudentInput<'_>, AdminError> {
    let Some(name) = non_blank(request.name.as_deref()) else {
        return Err(AdminError::BadRequest("Name is required"));
    };
    let email = non_blank(request.email.as_deref());
    if email.is_some_and(|email| !valid_email(email)) {
        return Err(AdminError::BadRequest("Invalid email"));
    }
    let dob = non_blank(request.dob.as_deref());
    if dob.is_some_and(|dob| !valid_date(dob)) {
        return Err(AdminError::BadRequest("Invalid date of birth, expected YYYY-MM-DD"));
    }
    Ok(StudentInput { name, email, dob })
}

#[utoipa::path(
    get,
    path = "/api/admin/students",
    responses(
        (status = 200, description = "Students, newest first.", body = [StudentResponse]),
        (status = 401, description = "Missing or invalid session."),
        (status = 403, description = "Session is not an admin."),
    ),
    tag = "admin"
)]
pub async fn list_students(pool: Extension<PgPool>) -> impl IntoResponse {
    match storage::list_students(&pool).await {
        Ok(rows) => (StatusCode::OK, Json(rows)).into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/admin/students",
    request_body = StudentRequest,
    responses(
        (status = 201, description = "Student created.", body = StudentResponse),
        (status = 400, description = "Invalid input.", body = ErrorResponse),
        (status = 409, description = "Email already in use.", body = ErrorResponse),
    ),
    tag = "admin"
)]
/// Creates a student. When both `email` and `password` are present a `student`
/// login is created in the same transaction.
#[instrument(skip(pool, payload))]
pub async fn create_student(
    pool: Extension<PgPool>,
    payload: Result<Json<StudentRequest>, JsonRejection>,
) -> impl IntoResponse {
    let request = match json_body(payload) {
        Ok(request) => request,
        Err(err) => return err.into_response(),
    };
    let student = match validate(&request) {
        Ok(student) => student,
        Err(err) => return err.into_response(),
    };

    let password = request.password.as_deref().filter(|password| !password.is_empty());
    let password_hash = match (student.email, password) {
        (Some(_), Some(password)) => match hash_password_blocking(password.to_string()).await {
            Ok(hash) => Some(hash),
            Err(err) => return AdminError::Internal(err).into_response(),
        },
        _ => None,
    };
    let with_login = password_hash.is_some();

    match storage::create_student(&pool, &student, password_hash).await {
        Ok(created) => {
            info!(student_id = created.id, with_login, "student created");
            (StatusCode::CREATED, Json(created)).into_response()
        }
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/api/admin/students/{id}",
    request_body = StudentRequest,
    params(("id" = i64, Path, description = "Student id")),
    responses(
        (status = 200, description = "Student updated.", body = StudentResponse),
        (status = 400, description = "Invalid input.", body = ErrorResponse),
        (status = 404, description = "Student not found.", body = ErrorResponse),
        (status = 409, description = "Email already in use.", body = ErrorResponse),
    ),
    tag = "admin"
)]
pub async fn update_student(
    id: Result<Path<i64>, PathRejection>,
    pool: Extension<PgPool>,
    payload: Result<Json<StudentRequest>, JsonRejection>,
) -> impl IntoResponse {
    let id = match path_id(id) {
        Ok(id) => id,
        Err(err) => return err.into_response(),
    };
    let request = match json_body(payload) {
        Ok(request) => request,
        Err(err) => return err.into_response(),
    };
    let student = match validate(&request) {
        Ok(student) => student,
        Err(err) => return err.into_response(),
    };

    match storage::update_student(&pool, id, &student).await {
        Ok(Some(updated)) => (StatusCode::OK, Json(updated)).into_response(),
        Ok(None) => AdminError::NotFound("Student not found").into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/api/admin/students/{id}",
    params(("id" = i64, Path, description = "Student id")),
    responses(
        (status = 204, description = "Student, enrollments, login, and sessions removed."),
        (status = 400, description = "Invalid id.", body = ErrorResponse),
        (status = 404, description = "Student not found.", body = ErrorResponse),
    ),
    tag = "admin"
)]
pub async fn delete_student(
    id: Result<Path<i64>, PathRejection>,
    auth: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
) -> impl IntoResponse {
    let id = match path_id(id) {
        Ok(id) => id,
        Err(err) => return err.into_response(),
    };

    match storage::delete_student(&pool, id).await {
        Ok(true) => {}
        Ok(false) => return AdminError::NotFound("Student not found").into_response(),
        Err(err) => return err.into_response(),
    }

    // Process-local sessions outlive the deleted login unless dropped here.
    if let Err(err) = auth.manager().revoke_student_sessions(id).await {
        return err.into_response();
    }
    info!(student_id = id, "student deleted");
    StatusCode::NO_CONTENT.into_response()
}
