use crate::api::{self, auth::AuthConfig, ServerConfig, SessionBackend};
use anyhow::Result;
use secrecy::SecretString;
use tracing::debug;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub admin_email: String,
    pub admin_password: SecretString,
    pub session_ttl_seconds: u64,
    pub session_store: SessionBackend,
    pub cookie_secure: bool,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the server fails to bind or serve.
pub async fn execute(args: Args) -> Result<()> {
    let auth_config = AuthConfig::new()
        .with_session_ttl_seconds(args.session_ttl_seconds)
        .with_cookie_secure(args.cookie_secure);

    debug!(
        port = args.port,
        session_store = %args.session_store,
        session_ttl_seconds = args.session_ttl_seconds,
        "starting server"
    );

    api::new(ServerConfig {
        port: args.port,
        dsn: SecretString::from(args.dsn),
        admin_email: args.admin_email,
        admin_password: args.admin_password,
        session_store: args.session_store,
        auth_config,
    })
    .await
}
