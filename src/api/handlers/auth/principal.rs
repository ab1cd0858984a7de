//! Authenticated identity and the access guard.
//!
//! Flow Overview: read the session token, resolve it to the bound identity
//! (`401` when absent), then compare the identity's role with the one the route
//! requires (`403` on mismatch). The role check never runs for unauthenticated
//! requests, so a missing session is always reported as `401`.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use utoipa::ToSchema;

use super::{error::AuthError, role::Role, session::extract_session_token, state::AuthState};

/// Minimal authenticated-identity view handed to handlers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SessionIdentity {
    pub id: i64,
    pub role: Role,
    pub student_id: Option<i64>,
    pub email: String,
}

/// Resolve the request's session into an identity, or reject with `Unauthorized`.
///
/// # Errors
/// `Unauthorized` when no live session is bound to the token; `StoreUnavailable`
/// when the session store fails.
pub async fn require_authenticated(
    headers: &HeaderMap,
    auth: &AuthState,
) -> Result<SessionIdentity, AuthError> {
    let token = extract_session_token(headers);
    auth.manager()
        .current_identity(token.as_deref())
        .await?
        .ok_or(AuthError::Unauthorized)
}

/// Exact role check on an already authenticated identity.
///
/// # Errors
/// `Forbidden` when the identity's role differs from `role`.
pub fn require_role(identity: SessionIdentity, role: Role) -> Result<SessionIdentity, AuthError> {
    if identity.role == role {
        Ok(identity)
    } else {
        debug!(
            user_id = identity.id,
            have = %identity.role,
            need = %role,
            "role mismatch"
        );
        Err(AuthError::Forbidden)
    }
}

/// Middleware state naming the role a route group requires.
#[derive(Clone)]
pub struct RoleGate {
    auth: Arc<AuthState>,
    role: Role,
}

impl RoleGate {
    #[must_use]
    pub fn new(auth: Arc<AuthState>, role: Role) -> Self {
        Self { auth, role }
    }
}

/// Middleware: require any authenticated session and expose it as `Extension<SessionIdentity>`.
pub async fn require_auth_layer(
    State(auth): State<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Response {
    match require_authenticated(request.headers(), &auth).await {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(err) => err.into_response(),
    }
}

/// Middleware: authentication first, then the exact role named by the gate.
pub async fn require_role_layer(
    State(gate): State<RoleGate>,
    mut request: Request,
    next: Next,
) -> Response {
    let checked = match require_authenticated(request.headers(), &gate.auth).await {
        Ok(identity) => require_role(identity, gate.role),
        Err(err) => Err(err),
    };
    match checked {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(err) => err.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(role: Role) -> SessionIdentity {
        SessionIdentity {
            id: 1,
            role,
            student_id: None,
            email: "x@example.com".to_string(),
        }
    }

    #[test]
    fn require_role_accepts_exact_match() {
        assert!(require_role(identity(Role::Admin), Role::Admin).is_ok());
        assert!(require_role(identity(Role::Student), Role::Student).is_ok());
    }

    #[test]
    fn require_role_has_no_hierarchy() {
        assert!(matches!(
            require_role(identity(Role::Admin), Role::Student),
            Err(AuthError::Forbidden)
        ));
        assert!(matches!(
            require_role(identity(Role::Student), Role::Admin),
            Err(AuthError::Forbidden)
        ));
    }

    #[test]
    fn session_identity_serializes_with_nullable_student() -> anyhow::Result<()> {
        let value = serde_json::to_value(identity(Role::Admin))?;
        assert_eq!(
            value,
            serde_json::json!({
                "id": 1,
                "role": "admin",
                "student_id": null,
                "email": "x@example.com"
            })
        );
        Ok(())
    }

    async fn any_session_app() -> anyhow::Result<(axum::Router, String)> {
        use crate::api::handlers::auth::{
            test_support::MemoryCredentialStore, AuthConfig, MemorySessionStore, SessionManager,
        };
        use axum::{middleware, routing::get, Extension};
        use secrecy::SecretString;
        use std::time::Duration;

        let manager = SessionManager::new(
            Arc::new(MemoryCredentialStore::new()),
            Arc::new(MemorySessionStore::new()),
            Duration::from_secs(60),
        );
        manager
            .provision_default_admin("root@example.com", &SecretString::from("pw"))
            .await?;
        let session = manager.login("root@example.com", "pw").await?;
        let auth = Arc::new(AuthState::new(AuthConfig::new(), manager));

        let app = axum::Router::new()
            .route(
                "/whoami",
                get(|Extension(identity): Extension<SessionIdentity>| async move {
                    identity.email
                }),
            )
            .route_layer(middleware::from_fn_with_state(auth, require_auth_layer));
        Ok((app, session.token))
    }

    #[tokio::test]
    async fn auth_layer_attaches_identity_for_any_role() -> anyhow::Result<()> {
        use axum::{
            body::{to_bytes, Body},
            http::{header::AUTHORIZATION, Request, StatusCode},
        };
        use tower::ServiceExt;

        let (app, token) = any_session_app().await?;

        let anonymous = app
            .clone()
            .oneshot(Request::builder().uri("/whoami").body(Body::empty())?)
            .await?;
        assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/whoami")
                    .header(AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())?,
            )
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        assert_eq!(&bytes[..], b"root@example.com");
        Ok(())
    }
}
