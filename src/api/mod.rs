use crate::{
    api::handlers::{
        admin::{courses, enrollments, stats, students},
        auth::{
            require_role_layer, session, AuthConfig, AuthState, CredentialStore,
            MemorySessionStore, PgCredentialStore, PgSessionStore, ProvisionOutcome, Role,
            RoleGate, SessionManager, SessionStore,
        },
        health, me,
    },
    cli::telemetry,
};
use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    middleware,
    routing::{delete, get, post, put},
    Extension, Router,
};
use secrecy::{ExposeSecret, SecretString};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{fmt, str::FromStr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{info, info_span, warn, Span};
use ulid::Ulid;

pub mod handlers;
// OpenAPI document assembly lives in openapi.rs.
mod openapi;

pub use handlers::auth;
pub use openapi::openapi;

/// Backing store for login sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionBackend {
    Postgres,
    Memory,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown session store: {0}")]
pub struct UnknownSessionBackend(pub String);

impl FromStr for SessionBackend {
    type Err = UnknownSessionBackend;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "postgres" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => Err(UnknownSessionBackend(other.to_string())),
        }
    }
}

impl fmt::Display for SessionBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Postgres => "postgres",
            Self::Memory => "memory",
        })
    }
}

/// Everything the server needs at startup.
#[derive(Debug)]
pub struct ServerConfig {
    pub port: u16,
    pub dsn: SecretString,
    pub admin_email: String,
    pub admin_password: SecretString,
    pub session_store: SessionBackend,
    pub auth_config: AuthConfig,
}

/// Start the server
/// # Errors
/// Return error if the DSN is unusable or the listener fails
pub async fn new(config: ServerConfig) -> Result<()> {
    // Lazy pool: the process starts even when the database is down.
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .acquire_timeout(Duration::from_secs(5))
        .test_before_acquire(true)
        .connect_lazy(config.dsn.expose_secret())
        .context("Failed to configure database pool")?;

    let credentials: Arc<dyn CredentialStore> = Arc::new(PgCredentialStore::new(pool.clone()));
    let sessions: Arc<dyn SessionStore> = match config.session_store {
        SessionBackend::Postgres => Arc::new(PgSessionStore::new(pool.clone())),
        SessionBackend::Memory => Arc::new(MemorySessionStore::new()),
    };

    let manager = SessionManager::new(
        credentials,
        sessions,
        Duration::from_secs(config.auth_config.session_ttl_seconds()),
    );

    bootstrap(&manager, &config.admin_email, &config.admin_password).await;

    let auth_state = Arc::new(AuthState::new(config.auth_config, manager));
    let app = router(auth_state, pool);

    let listener = TcpListener::bind(format!("::0:{}", config.port)).await?;

    info!(
        session_store = %config.session_store,
        "Listening on [::]:{}",
        config.port
    );

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {err}");
            }
            info!("Gracefully shutdown");
        })
        .await?;

    telemetry::shutdown_tracer();

    Ok(())
}

/// Create the schema and the default admin. Failures are logged, never fatal.
async fn bootstrap(manager: &SessionManager, email: &str, password: &SecretString) {
    match manager.provision_default_admin(email, password).await {
        Ok(ProvisionOutcome::Created) => info!(email, "Default admin created"),
        Ok(ProvisionOutcome::AlreadyPresent) => info!(email, "Default admin already present"),
        Err(err) => warn!("Bootstrap failed, continuing without it: {err:#}"),
    }
}

/// Build the application router with every route and shared layer.
#[must_use]
pub fn router(auth_state: Arc<AuthState>, pool: PgPool) -> Router {
    let admin_gate = RoleGate::new(auth_state.clone(), Role::Admin);
    let student_gate = RoleGate::new(auth_state.clone(), Role::Student);

    let admin = Router::new()
        .route("/stats", get(stats::stats))
        .route(
            "/students",
            get(students::list_students).post(students::create_student),
        )
        .route(
            "/students/:id",
            put(students::update_student).delete(students::delete_student),
        )
        .route(
            "/courses",
            get(courses::list_courses).post(courses::create_course),
        )
        .route(
            "/courses/:id",
            put(courses::update_course).delete(courses::delete_course),
        )
        .route(
            "/enrollments",
            get(enrollments::list_enrollments).post(enrollments::create_enrollment),
        )
        .route(
            "/enrollments/:id",
            delete(enrollments::delete_enrollment),
        )
        .route_layer(middleware::from_fn_with_state(
            admin_gate,
            require_role_layer,
        ));

    let student = Router::new()
        .route("/api/me", get(me::me))
        .route("/api/my/enrollments", get(me::my_enrollments))
        .route_layer(middleware::from_fn_with_state(
            student_gate,
            require_role_layer,
        ));

    Router::new()
        .route("/api/auth/login", post(session::login))
        .route("/api/auth/logout", post(session::logout))
        .route("/api/auth/me", get(session::me))
        .nest("/api/admin", admin)
        .merge(student)
        .route("/health", get(health::health).options(health::health))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(auth_state))
                .layer(Extension(pool)),
        )
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
