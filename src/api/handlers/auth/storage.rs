//! Postgres-backed credential and session stores.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Row};
use std::time::Duration;
use tracing::Instrument;

use super::{
    credentials::{CredentialRecord, CredentialStore, NewCredential},
    principal::SessionIdentity,
    role::Role,
    session_store::SessionStore,
    utils::{generate_session_token, hash_session_token, is_unique_violation},
};

pub(crate) const SCHEMA_SQL: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

const SESSION_INSERT_ATTEMPTS: usize = 3;

/// Credential records in the `users` table.
#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn ensure_schema(&self) -> Result<()> {
        for (index, statement) in split_sql_statements(SCHEMA_SQL).iter().enumerate() {
            let span = tracing::info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "DDL",
                db.statement = statement.as_str()
            );
            sqlx::query(statement)
                .execute(&self.pool)
                .instrument(span)
                .await
                .with_context(|| format!("failed to execute schema statement {}", index + 1))?;
        }
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<CredentialRecord>> {
        let query = r"
            SELECT id, email, password_hash, role, student_id
            FROM users
            WHERE email = $1
            LIMIT 1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup credential")?;

        row.map(|row| {
            Ok(CredentialRecord {
                id: row.get("id"),
                email: row.get("email"),
                password_hash: row.get("password_hash"),
                role: role_from_row(&row)?,
                student_id: row.get("student_id"),
            })
        })
        .transpose()
    }

    async fn insert_if_absent(&self, credential: NewCredential) -> Result<bool> {
        let query = r"
            INSERT INTO users (email, password_hash, role, student_id)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (email) DO NOTHING
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(&credential.email)
            .bind(&credential.password_hash)
            .bind(credential.role.as_str())
            .bind(credential.student_id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to insert credential")?;
        Ok(result.rows_affected() == 1)
    }
}

/// Sessions in the `user_sessions` table, keyed by token hash.
#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn prune_expired(&self) -> Result<()> {
        let query = "DELETE FROM user_sessions WHERE expires_at <= NOW()";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        sqlx::query(query)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to prune expired sessions")?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create(&self, identity: &SessionIdentity, ttl: Duration) -> Result<String> {
        self.prune_expired().await?;

        let ttl_seconds = i64::try_from(ttl.as_secs()).context("session ttl out of range")?;
        let query = r"
            INSERT INTO user_sessions (user_id, session_hash, expires_at)
            VALUES ($1, $2, NOW() + ($3 * INTERVAL '1 second'))
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );

        for _ in 0..SESSION_INSERT_ATTEMPTS {
            let token = generate_session_token()?;
            let token_hash = hash_session_token(&token);
            let result = sqlx::query(query)
                .bind(identity.id)
                .bind(token_hash)
                .bind(ttl_seconds)
                .execute(&self.pool)
                .instrument(span.clone())
                .await;

            match result {
                Ok(_) => return Ok(token),
                Err(err) if is_unique_violation(&err) => {}
                Err(err) => return Err(err).context("failed to insert session"),
            }
        }

        Err(anyhow!("failed to generate unique session token"))
    }

    async fn lookup(&self, token: &str) -> Result<Option<SessionIdentity>> {
        let token_hash = hash_session_token(token);
        let query = r"
            SELECT users.id, users.email, users.role, users.student_id
            FROM user_sessions
            JOIN users ON users.id = user_sessions.user_id
            WHERE user_sessions.session_hash = $1
              AND user_sessions.expires_at > NOW()
            LIMIT 1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let Some(row) = sqlx::query(query)
            .bind(&token_hash)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup session")?
        else {
            return Ok(None);
        };

        // Activity is recorded without extending the session.
        let query = "UPDATE user_sessions SET last_seen_at = NOW() WHERE session_hash = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(&token_hash)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to update session last_seen_at")?;

        Ok(Some(SessionIdentity {
            id: row.get("id"),
            role: role_from_row(&row)?,
            student_id: row.get("student_id"),
            email: row.get("email"),
        }))
    }

    async fn revoke(&self, token: &str) -> Result<()> {
        let query = "DELETE FROM user_sessions WHERE session_hash = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(hash_session_token(token))
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to delete session")?;
        Ok(())
    }

    async fn revoke_student(&self, student_id: i64) -> Result<()> {
        // Usually a no-op: deleting the student cascades through users.
        let query = r"
            DELETE FROM user_sessions
            USING users
            WHERE users.id = user_sessions.user_id
              AND users.student_id = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(student_id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to delete student sessions")?;
        Ok(())
    }
}

fn role_from_row(row: &PgRow) -> Result<Role> {
    let role: String = row.get("role");
    role.parse::<Role>()
        .with_context(|| format!("unexpected role in users table: {role}"))
}

/// Split a schema file into statements. Assumes each statement ends with `;`
/// at the end of a line and that statements never nest semicolons.
pub(crate) fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in sql.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("--") {
            continue;
        }
        current.push_str(line);
        current.push('\n');

        if trimmed.ends_with(';') {
            let statement = current.trim();
            if !statement.is_empty() {
                statements.push(statement.to_string());
            }
            current.clear();
        }
    }

    let leftover = current.trim();
    if !leftover.is_empty() {
        statements.push(leftover.to_string());
    }

    statements
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_trailing_semicolons_and_skips_comments() {
        let sql = "-- header\nCREATE TABLE a (\n  id INT\n);\n\nCREATE INDEX b ON a (id);\n";
        let statements = split_sql_statements(sql);
        assert_eq!(
            statements,
            vec![
                "CREATE TABLE a (\n  id INT\n);".to_string(),
                "CREATE INDEX b ON a (id);".to_string()
            ]
        );
    }

    #[test]
    fn keeps_unterminated_tail() {
        assert_eq!(split_sql_statements("SELECT 1"), vec!["SELECT 1".to_string()]);
    }

    #[test]
    fn bundled_schema_is_idempotent() {
        let statements = split_sql_statements(SCHEMA_SQL);
        assert!(statements.len() >= 5);
        for statement in &statements {
            assert!(
                statement.contains("IF NOT EXISTS"),
                "statement is not idempotent: {statement}"
            );
        }
    }

    #[test]
    fn bundled_schema_cascades_student_deletes_to_logins() {
        let users = split_sql_statements(SCHEMA_SQL)
            .into_iter()
            .find(|statement| statement.contains("CREATE TABLE IF NOT EXISTS users"));
        assert!(users.is_some_and(|users| {
            users.contains("REFERENCES students(id) ON DELETE CASCADE")
                && users.contains("email         TEXT NOT NULL UNIQUE")
        }));
    }
}
