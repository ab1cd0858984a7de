//! Course CRUD handlers.

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
    storage::{self, AdminError, CourseInput},
    types::{CourseRequest, CourseResponse},
};
use crate::api::handlers::{auth::types::ErrorResponse, non_blank};

fn validate(request: &CourseRequest) -> Result<CourseInput<'_>, AdminError> {
    let code = non_blank(request.code.as_deref());
    let title = non_blank(request.title.as_deref());
    let (Some(code), Some(title)) = (code, title) else {
        return Err(AdminError::BadRequest("Code and title are required"));
    };
    Ok(CourseInput {
        code,
        title,
        description: non_blank(request.description.as_deref()),
    })
}

#[utoipa::path(
    get,
    path = "/api/admin/courses",
    responses(
        (status = 200, description = "Courses, newest first.", body = [CourseResponse]),
        (status = 401, description = "Missing or invalid session."),
        (status = 403, description = "Session is not an admin."),
    ),
    tag = "admin"
)]
pub async fn list_courses(pool: Extension<PgPool>) -> impl IntoResponse {
    match storage::list_courses(&pool).await {
        Ok(rows) => (StatusCode::OK, Json(rows)).into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/admin/courses",
    request_body = CourseRequest,
    responses(
        (status = 201, description = "Course created.", body = CourseResponse),
        (status = 400, description = "Invalid input.", body = ErrorResponse),
        (status = 409, description = "Course code already in use.", body = ErrorResponse),
    ),
    tag = "admin"
)]
pub async fn create_course(
    pool: Extension<PgPool>,
    payload: Result<Json<CourseRequest>, JsonRejection>,
) -> impl IntoResponse {
    let request = match json_body(payload) {
        Ok(request) => request,
        Err(err) => return err.into_response(),
    };
    let course = match validate(&request) {
        Ok(course) => course,
        Err(err) => return err.into_response(),
    };

    match storage::create_course(&pool, &course).await {
        Ok(created) => (StatusCode::CREATED, Json(created)).into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/api/admin/courses/{id}",
    request_body = CourseRequest,
    params(("id" = i64, Path, description = "Course id")),
    responses(
        (status = 200, description = "Course updated.", body = CourseResponse),
        (status = 400, description = "Invalid input.", body = ErrorResponse),
        (status = 404, description = "Course not found.", body = ErrorResponse),
        (status = 409, description = "Course code already in use.", body = ErrorResponse),
    ),
    tag = "admin"
)]
pub async fn update_course(
    id: Result<Path<i64>, PathRejection>,
    pool: Extension<PgPool>,
    payload: Result<Json<CourseRequest>, JsonRejection>,
) -> impl IntoResponse {
    let id = match path_id(id) {
        Ok(id) => id,
        Err(err) => return err.into_response(),
    };
    let request = match json_body(payload) {
        Ok(request) => request,
        Err(err) => return err.into_response(),
    };
    let course = match validate(&request) {
        Ok(course) => course,
        Err(err) => return err.into_response(),
    };

    match storage::update_course(&pool, id, &course).await {
        Ok(Some(updated)) => (StatusCode::OK, Json(updated)).into_response(),
        Ok(None) => AdminError::NotFound("Course not found").into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/api/admin/courses/{id}",
    params(("id" = i64, Path, description = "Course id")),
    responses(
        (status = 204, description = "Course and its enrollments removed."),
        (status = 400, description = "Invalid id.", body = ErrorResponse),
        (status = 404, description = "Course not found.", body = ErrorResponse),
    ),
    tag = "admin"
)]
pub async fn delete_course(
    id: Result<Path<i64>, PathRejection>,
    pool: Extension<PgPool>,
) -> impl IntoResponse {
    let id = match path_id(id) {
        Ok(id) => id,
        Err(err) => return err.into_response(),
    };
    match storage::delete_course(&pool, id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => AdminError::NotFound("Course not found").into_response(),
        Err(err) => err.into_response(),
    }
}
