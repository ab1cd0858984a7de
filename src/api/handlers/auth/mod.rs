//! Auth handlers and supporting modules.
//!
//! This module owns the credential model, server-side sessions, and the access
//! guard that protects the admin and student routes.
//!
//! ## Sessions
//!
//! A session token is 32 random bytes encoded as URL-safe base64. Clients get the
//! raw value in the `campus_session` cookie (or may send it as a bearer token);
//! stores only ever see its SHA-256 hash. Expiry is passive: a session past its
//! deadline simply stops resolving.
//!
//! ## Roles
//!
//! `admin` and `student` are unrelated roles. An admin session is rejected with
//! `403` on student routes and vice versa.

mod credentials;
mod error;
mod manager;
pub(crate) mod password;
pub(crate) mod principal;
mod role;
pub(crate) mod session;
mod session_store;
mod state;
mod storage;
pub(crate) mod types;
mod utils;

pub use credentials::{CredentialRecord, CredentialStore, NewCredential};
pub use error::AuthError;
pub use manager::{LoginSession, ProvisionOutcome, SessionManager};
pub use password::{hash_password, verify_password};
pub use principal::{
    require_auth_layer, require_authenticated, require_role, require_role_layer, RoleGate,
    SessionIdentity,
};
pub use role::{Role, UnknownRole};
pub use session_store::{MemorySessionStore, SessionStore};
pub use state::{AuthConfig, AuthState};
pub use storage::{PgCredentialStore, PgSessionStore};
pub(crate) use utils::{is_foreign_key_violation, is_unique_violation};

#[cfg(test)]
pub(crate) mod test_support;
