//! Command-line argument dispatch.
//!
//! Maps validated CLI matches to an action, such as starting the API server
//! with its full configuration.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{auth, ARG_DSN, ARG_PORT};
use anyhow::{bail, Context, Result};
use url::Url;

/// Only Postgres connection strings are accepted.
fn validate_dsn(dsn: &str) -> Result<()> {
    let parsed = Url::parse(dsn).context("invalid --dsn")?;
    match parsed.scheme() {
        "postgres" | "postgresql" => Ok(()),
        scheme => bail!("invalid --dsn: unsupported scheme '{scheme}', expected postgres://"),
    }
}

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>(ARG_DSN)
        .cloned()
        .context("missing required argument: --dsn")?;
    validate_dsn(&dsn)?;

    let auth_opts = auth::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        admin_email: auth_opts.admin_email,
        admin_password: auth_opts.admin_password,
        session_ttl_seconds: auth_opts.session_ttl_seconds,
        session_store: auth_opts.session_store,
        cookie_secure: auth_opts.cookie_secure,
    }))
}
