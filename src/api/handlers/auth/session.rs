//! Session endpoints for cookie and bearer auth.

use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::{
        header::{InvalidHeaderValue, AUTHORIZATION, COOKIE, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::{debug, error, instrument};

use super::{
    error::AuthError,
    state::{AuthConfig, AuthState},
    types::{ErrorResponse, LoginRequest, LoginResponse, MeResponse, MessageResponse},
};

pub(crate) const SESSION_COOKIE_NAME: &str = "campus_session";

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session established", body = LoginResponse),
        (status = 400, description = "Email or password missing", body = ErrorResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 500, description = "Store unavailable", body = ErrorResponse)
    ),
    tag = "auth"
)]
#[instrument(skip(auth_state, payload))]
pub async fn login(
    auth_state: Extension<Arc<AuthState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> impl IntoResponse {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            debug!("Rejected login body: {rejection}");
            LoginRequest::default()
        }
    };

    let email = request.email.as_deref().map(str::trim).unwrap_or_default();
    let password = request.password.as_deref().unwrap_or_default();
    if email.is_empty() || password.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Email and password are required")),
        )
            .into_response();
    }

    let session = match auth_state.manager().login(email, password).await {
        Ok(session) => session,
        Err(err) => return err.into_response(),
    };

    let mut headers = HeaderMap::new();
    match session_cookie(auth_state.config(), &session.token) {
        Ok(cookie) => {
            headers.insert(SET_COOKIE, cookie);
        }
        Err(err) => {
            error!("Failed to build session cookie: {err}");
            return AuthError::StoreUnavailable(err.into()).into_response();
        }
    }

    let body = LoginResponse {
        message: "Logged in".to_string(),
        role: session.identity.role,
    };
    (StatusCode::OK, headers, Json(body)).into_response()
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 200, description = "Session cleared", body = MessageResponse)
    ),
    tag = "auth"
)]
pub async fn logout(headers: HeaderMap, auth_state: Extension<Arc<AuthState>>) -> impl IntoResponse {
    let token = extract_session_token(&headers);
    if let Err(err) = auth_state.manager().logout(token.as_deref()).await {
        error!("Failed to revoke session: {err}");
    }

    // Always clear the cookie, even if the session was missing.
    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = clear_session_cookie(auth_state.config()) {
        response_headers.insert(SET_COOKIE, cookie);
    }
    let body = MessageResponse {
        message: "Logged out".to_string(),
    };
    (StatusCode::OK, response_headers, Json(body)).into_response()
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current identity, null when not logged in", body = MeResponse)
    ),
    tag = "auth"
)]
pub async fn me(headers: HeaderMap, auth_state: Extension<Arc<AuthState>>) -> impl IntoResponse {
    let token = extract_session_token(&headers);
    let user = match auth_state.manager().current_identity(token.as_deref()).await {
        Ok(user) => user,
        Err(err) => {
            error!("Failed to resolve session: {err}");
            None
        }
    };
    (StatusCode::OK, Json(MeResponse { user })).into_response()
}

/// Build an `HttpOnly` cookie for the session token.
pub(super) fn session_cookie(
    config: &AuthConfig,
    token: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let ttl_seconds = config.session_ttl_seconds();
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}"
    );
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn clear_session_cookie(config: &AuthConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Session token from a bearer header, falling back to the session cookie.
pub(crate) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    for header in headers.get_all(COOKIE) {
        let Ok(value) = header.to_str() else {
            continue;
        };
        for pair in value.split(';') {
            let Some((key, val)) = pair.trim().split_once('=') else {
                continue;
            };
            if key.trim() == SESSION_COOKIE_NAME && !val.trim().is_empty() {
                return Some(val.trim().to_string());
            }
        }
    }
    None
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn headers_with(name: axum::http::HeaderName, value: &str) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_str(value)?);
        Ok(headers)
    }

    #[test]
    fn extracts_token_from_cookie_among_others() -> Result<()> {
        let headers = headers_with(COOKIE, "theme=dark; campus_session=abc123; lang=en")?;
        assert_eq!(extract_session_token(&headers).as_deref(), Some("abc123"));
        Ok(())
    }

    #[test]
    fn bearer_header_wins_over_cookie() -> Result<()> {
        let mut headers = headers_with(COOKIE, "campus_session=from-cookie")?;
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        assert_eq!(extract_session_token(&headers).as_deref(), Some("from-header"));
        Ok(())
    }

    #[test]
    fn empty_or_foreign_values_yield_none() -> Result<()> {
        assert_eq!(extract_session_token(&HeaderMap::new()), None);
        assert_eq!(
            extract_session_token(&headers_with(COOKIE, "campus_session=")?),
            None
        );
        assert_eq!(
            extract_session_token(&headers_with(COOKIE, "other_session=abc")?),
            None
        );
        assert_eq!(
            extract_session_token(&headers_with(AUTHORIZATION, "Basic abc")?),
            None
        );
        assert_eq!(
            extract_session_token(&headers_with(AUTHORIZATION, "Bearer   ")?),
            None
        );
        Ok(())
    }

    #[test]
    fn session_cookie_carries_ttl_and_flags() -> Result<()> {
        let config = AuthConfig::new().with_session_ttl_seconds(120);
        let cookie = session_cookie(&config, "tok")?;
        assert_eq!(
            cookie.to_str()?,
            "campus_session=tok; Path=/; HttpOnly; SameSite=Lax; Max-Age=120"
        );

        let secure = session_cookie(&config.with_cookie_secure(true), "tok")?;
        assert!(secure.to_str()?.ends_with("; Secure"));
        Ok(())
    }

    #[test]
    fn clear_cookie_expires_immediately() -> Result<()> {
        let cookie = clear_session_cookie(&AuthConfig::new())?;
        assert!(cookie.to_str()?.contains("campus_session=;"));
        assert!(cookie.to_str()?.contains("Max-Age=0"));
        Ok(())
    }
}
