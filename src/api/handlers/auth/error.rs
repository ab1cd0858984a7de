//! Structured rejections for authentication and authorization.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::error;

use super::types::ErrorResponse;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Unknown email or wrong password; never says which.
    #[error("Invalid credentials")]
    InvalidCredentials,
    /// No valid session for the request.
    #[error("Unauthorized")]
    Unauthorized,
    /// Valid session with the wrong role.
    #[error("Forbidden")]
    Forbidden,
    /// Credential or session store could not be reached.
    #[error("store unavailable: {0:#}")]
    StoreUnavailable(anyhow::Error),
}

impl AuthError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::InvalidCredentials | Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::StoreUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::StoreUnavailable(err) => {
                error!("Auth store failure: {err:#}");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(ErrorResponse::new(message))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::AuthError;
    use anyhow::anyhow;
    use axum::{
        body::to_bytes,
        http::StatusCode,
        response::IntoResponse,
    };
    use serde_json::{json, Value};

    async fn body_json(error: AuthError) -> anyhow::Result<(StatusCode, Value)> {
        let response = error.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        Ok((status, serde_json::from_slice(&bytes)?))
    }

    #[tokio::test]
    async fn invalid_credentials_maps_to_401() -> anyhow::Result<()> {
        let (status, body) = body_json(AuthError::InvalidCredentials).await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({ "error": "Invalid credentials" }));
        Ok(())
    }

    #[tokio::test]
    async fn unauthorized_and_forbidden_bodies() -> anyhow::Result<()> {
        let (status, body) = body_json(AuthError::Unauthorized).await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({ "error": "Unauthorized" }));

        let (status, body) = body_json(AuthError::Forbidden).await?;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body, json!({ "error": "Forbidden" }));
        Ok(())
    }

    #[tokio::test]
    async fn store_unavailable_hides_details() -> anyhow::Result<()> {
        let error = AuthError::StoreUnavailable(anyhow!("connection refused on 10.0.0.7"));
        let (status, body) = body_json(error).await?;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "Internal server error" }));
        Ok(())
    }
}
