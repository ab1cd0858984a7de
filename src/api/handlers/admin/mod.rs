//! Admin endpoints for students, courses, and enrollments.
//!
//! Every route here sits behind the `admin` role gate, so handlers receive an
//! already authorized request and only validate payloads before delegating to
//! `storage`.
//!
//! Flow Overview:
//! 1) The access guard resolves the session and requires `admin`.
//! 2) The handler validates and normalizes the payload (blank strings are absent).
//! 3) `storage` runs the SQL and maps constraint violations to `404`/`409`.

pub(crate) mod courses;
pub(crate) mod enrollments;
pub(crate) mod stats;
mod storage;
pub(crate) mod students;
pub(crate) mod types;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path,
    },
    Json,
};
use tracing::debug;

use storage::AdminError;

/// Unwrap a JSON body, mapping malformed or missing bodies to `400`.
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AdminError> {
    match payload {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => {
            debug!("Rejected admin payload: {rejection}");
            Err(AdminError::BadRequest("Invalid JSON body"))
        }
    }
}

/// Unwrap a numeric `:id` segment, mapping anything else to a JSON `400`.
fn path_id(id: Result<Path<i64>, PathRejection>) -> Result<i64, AdminError> {
    match id {
        Ok(Path(id)) => Ok(id),
        Err(rejection) => {
            debug!("Rejected admin path id: {rejection}");
            Err(AdminError::BadRequest("Invalid id"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        response::IntoResponse,
        routing::get,
        Router,
    };
    use serde_json::Value;
    use tower::ServiceExt;

    async fn echo(id: Result<Path<i64>, PathRejection>) -> axum::response::Response {
        match path_id(id) {
            Ok(id) => id.to_string().into_response(),
            Err(err) => err.into_response(),
        }
    }

    async fn get_id(segment: &str) -> Result<(StatusCode, Vec<u8>)> {
        let app = Router::new().route("/items/:id", get(echo));
        let response = app
            .oneshot(Request::get(format!("/items/{segment}")).body(Body::empty())?)
            .await?;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        Ok((status, bytes.to_vec()))
    }

    #[tokio::test]
    async fn numeric_ids_pass_through() -> Result<()> {
        let (status, body) = get_id("42").await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"42");
        Ok(())
    }

    #[tokio::test]
    async fn malformed_ids_are_json_bad_requests() -> Result<()> {
        for segment in ["abc", "1.5", "99999999999999999999"] {
            let (status, body) = get_id(segment).await?;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{segment}");
            let body: Value = serde_json::from_slice(&body)?;
            assert_eq!(body["error"], "Invalid id", "{segment}");
        }
        Ok(())
    }
}
