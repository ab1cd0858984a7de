use anyhow::Context;
use clap::{Arg, ArgAction, ArgMatches, Command};
use secrecy::SecretString;

use crate::api::SessionBackend;

pub const ARG_ADMIN_EMAIL: &str = "admin-email";
pub const ARG_ADMIN_PASSWORD: &str = "admin-password";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_SESSION_STORE: &str = "session-store";
pub const ARG_COOKIE_SECURE: &str = "cookie-secure";

/// One year.
pub const MAX_SESSION_TTL_SECONDS: u64 = 365 * 24 * 60 * 60;

#[derive(Debug)]
pub struct Options {
    pub admin_email: String,
    pub admin_password: SecretString,
    pub session_ttl_seconds: u64,
    pub session_store: SessionBackend,
    pub cookie_secure: bool,
}

impl Options {
    /// Parse auth arguments from matches.
    ///
    /// # Errors
    /// Returns an error if a required value is missing or blank.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let read_required = |id: &str| -> anyhow::Result<String> {
            matches
                .get_one::<String>(id)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| anyhow::anyhow!("missing required argument: --{id}"))
        };

        let session_store = read_required(ARG_SESSION_STORE)?
            .parse::<SessionBackend>()
            .context("invalid --session-store")?;

        Ok(Self {
            admin_email: read_required(ARG_ADMIN_EMAIL)?,
            admin_password: SecretString::from(read_required(ARG_ADMIN_PASSWORD)?),
            session_ttl_seconds: matches
                .get_one::<u64>(ARG_SESSION_TTL_SECONDS)
                .copied()
                .unwrap_or(43_200),
            session_store,
            cookie_secure: matches.get_flag(ARG_COOKIE_SECURE),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_ADMIN_EMAIL)
                .long(ARG_ADMIN_EMAIL)
                .help("Email of the admin account provisioned at startup")
                .env("CAMPUS_ADMIN_EMAIL")
                .default_value("admin@example.com"),
        )
        .arg(
            Arg::new(ARG_ADMIN_PASSWORD)
                .long(ARG_ADMIN_PASSWORD)
                .help("Password for the provisioned admin (only used when the account is created)")
                .env("CAMPUS_ADMIN_PASSWORD")
                .hide_env_values(true)
                .default_value("admin123"),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Session cookie TTL in seconds (at most one year)")
                .env("CAMPUS_SESSION_TTL_SECONDS")
                .default_value("43200")
                .value_parser(clap::value_parser!(u64).range(1..=MAX_SESSION_TTL_SECONDS)),
        )
        .arg(
            Arg::new(ARG_SESSION_STORE)
                .long(ARG_SESSION_STORE)
                .help("Where sessions are kept")
                .env("CAMPUS_SESSION_STORE")
                .default_value("postgres")
                .value_parser(["postgres", "memory"]),
        )
        .arg(
            Arg::new(ARG_COOKIE_SECURE)
                .long(ARG_COOKIE_SECURE)
                .help("Mark the session cookie `Secure` (serve over HTTPS)")
                .env("CAMPUS_COOKIE_SECURE")
                .action(ArgAction::SetTrue),
        )
}
