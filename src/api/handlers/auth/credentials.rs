//! Credential store abstraction.
//!
//! The Postgres implementation lives in `storage.rs`; tests use an in-memory one.

use anyhow::Result;
use async_trait::async_trait;

use super::role::Role;

/// Stored identity with its password hash and role.
#[derive(Clone, Debug)]
pub struct CredentialRecord {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    /// Linked student, only meaningful for `Role::Student`.
    pub student_id: Option<i64>,
}

/// Fields required to create a credential record.
#[derive(Clone, Debug)]
pub struct NewCredential {
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub student_id: Option<i64>,
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Create tables and indexes when they are missing.
    async fn ensure_schema(&self) -> Result<()>;

    /// Exact-match lookup by email.
    async fn find_by_email(&self, email: &str) -> Result<Option<CredentialRecord>>;

    /// Insert unless the email is already taken. Returns `true` when a row was created.
    async fn insert_if_absent(&self, credential: NewCredential) -> Result<bool>;
}
