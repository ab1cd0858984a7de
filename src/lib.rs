//! # Campus (Student Enrollment Service)
//!
//! `campus` is a small role-based web service: an admin manages students,
//! courses, and enrollments, while students view their own profile and
//! enrollments.
//!
//! ## Authentication
//!
//! Credentials live in the `users` table as Argon2id PHC strings. A successful
//! login binds a [`SessionIdentity`](api::handlers::auth::SessionIdentity) to an
//! opaque, random session token delivered as an `HttpOnly` cookie. Only a SHA-256
//! hash of the token is ever stored.
//!
//! - **Indistinguishable failures:** unknown emails and wrong passwords yield the
//!   same `401 {"error": "Invalid credentials"}` response.
//! - **Session stores:** sessions are kept behind the `SessionStore` trait, either
//!   in memory or in Postgres (`user_sessions`).
//!
//! ## Authorization
//!
//! Roles are a closed set (`admin`, `student`) with no hierarchy. Protected routes
//! are wrapped in an access guard that first requires a session (`401`) and then
//! an exact role match (`403`).
//!
//! ## Bootstrap
//!
//! On startup the schema is created if missing and a default admin is provisioned.
//! Failures during bootstrap are logged and never stop the process.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }
}
