//! Student self-service endpoints.
//!
//! Routes here sit behind the `student` role gate and read the caller from
//! `Extension<SessionIdentity>`. An identity without a linked student record is
//! valid: its profile carries only the login email and it has no enrollments.

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use tracing::{error, Instrument};
use utoipa::ToSchema;

use super::{
    auth::{types::ErrorResponse, SessionIdentity},
    db_span,
};

#[derive(Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct Profile {
    pub name: Option<String>,
    pub email: Option<String>,
    pub dob: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProfileResponse {
    pub profile: Profile,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MyEnrollment {
    pub code: String,
    pub title: String,
    pub created_at: String,
}

fn internal_error() -> axum::response::Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new("Internal server error")),
    )
        .into_response()
}

async fn fetch_profile(pool: &PgPool, identity: &SessionIdentity) -> sqlx::Result<Profile> {
    let fallback = Profile {
        name: None,
        email: Some(identity.email.clone()),
        dob: None,
    };
    let Some(student_id) = identity.student_id else {
        return Ok(fallback);
    };

    let query = r"
        SELECT name, email, to_char(dob, 'YYYY-MM-DD') AS dob
        FROM students
        WHERE id = $1
    ";
    let row = sqlx::query(query)
        .bind(student_id)
        .fetch_optional(pool)
        .instrument(db_span("SELECT", query))
        .await?;

    Ok(row.map_or(fallback, |row| Profile {
        name: row.get("name"),
        email: row.get("email"),
        dob: row.get("dob"),
    }))
}

#[utoipa::path(
    get,
    path = "/api/me",
    responses(
        (status = 200, description = "Profile of the logged-in student.", body = ProfileResponse),
        (status = 401, description = "Missing or invalid session."),
        (status = 403, description = "Session is not a student."),
    ),
    tag = "student"
)]
pub async fn me(
    Extension(identity): Extension<SessionIdentity>,
    pool: Extension<PgPool>,
) -> impl IntoResponse {
    match fetch_profile(&pool, &identity).await {
        Ok(profile) => (StatusCode::OK, Json(ProfileResponse { profile })).into_response(),
        Err(err) => {
            error!("Failed to load profile: {err}");
            internal_error()
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/my/enrollments",
    responses(
        (status = 200, description = "Courses the logged-in student is enrolled in.", body = [MyEnrollment]),
        (status = 401, description = "Missing or invalid session."),
        (status = 403, description = "Session is not a student."),
    ),
    tag = "student"
)]
pub async fn my_enrollments(
    Extension(identity): Extension<SessionIdentity>,
    pool: Extension<PgPool>,
) -> impl IntoResponse {
    let Some(student_id) = identity.student_id else {
        return (StatusCode::OK, Json(Vec::<MyEnrollment>::new())).into_response();
    };

    let query = r#"
        SELECT c.code, c.title,
            to_char(e.created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at
        FROM enrollments e
        JOIN courses c ON c.id = e.course_id
        WHERE e.student_id = $1
        ORDER BY e.created_at DESC, e.id DESC
    "#;
    let rows = match sqlx::query(query)
        .bind(student_id)
        .fetch_all(&*pool)
        .instrument(db_span("SELECT", query))
        .await
    {
        Ok(rows) => rows,
        Err(err) => {
            error!("Failed to list enrollments: {err}");
            return internal_error();
        }
    };

    let enrollments: Vec<MyEnrollment> = rows
        .iter()
        .map(|row| MyEnrollment {
            code: row.get("code"),
            title: row.get("title"),
            created_at: row.get("created_at"),
        })
        .collect();
    (StatusCode::OK, Json(enrollments)).into_response()
}
