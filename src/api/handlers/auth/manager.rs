//! Session manager: login, identity resolution, logout, and admin bootstrap.
//!
//! The manager is the only component that mutates session state. It talks to
//! the credential store for lookups and to the session store for bindings.

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, instrument};

use super::{
    credentials::{CredentialStore, NewCredential},
    error::AuthError,
    password::{hash_password_blocking, verify_password_blocking},
    principal::SessionIdentity,
    role::Role,
    session_store::SessionStore,
};

/// Outcome of [`SessionManager::provision_default_admin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionOutcome {
    Created,
    AlreadyPresent,
}

/// A freshly established session.
#[derive(Debug)]
pub struct LoginSession {
    pub token: String,
    pub identity: SessionIdentity,
}

pub struct SessionManager {
    credentials: Arc<dyn CredentialStore>,
    sessions: Arc<dyn SessionStore>,
    session_ttl: Duration,
}

impl SessionManager {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        sessions: Arc<dyn SessionStore>,
        session_ttl: Duration,
    ) -> Self {
        Self {
            credentials,
            sessions,
            session_ttl,
        }
    }

    #[must_use]
    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    /// Verify credentials and bind the resulting identity to a new session.
    ///
    /// # Errors
    /// `InvalidCredentials` for an unknown email or a wrong password (the two are
    /// indistinguishable); `StoreUnavailable` when a store fails.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginSession, AuthError> {
        let record = self
            .credentials
            .find_by_email(email)
            .await
            .map_err(AuthError::StoreUnavailable)?;

        // Unknown emails still pay for one verification against a dummy hash.
        let hash = record.as_ref().map(|record| record.password_hash.clone());
        let verified = verify_password_blocking(hash, password.to_string())
            .await
            .map_err(AuthError::StoreUnavailable)?;

        let record = match record {
            Some(record) if verified => record,
            _ => {
                debug!("login rejected");
                return Err(AuthError::InvalidCredentials);
            }
        };

        let identity = SessionIdentity {
            id: record.id,
            role: record.role,
            student_id: record.student_id,
            email: record.email,
        };
        let token = self
            .sessions
            .create(&identity, self.session_ttl)
            .await
            .map_err(AuthError::StoreUnavailable)?;

        info!(user_id = identity.id, role = %identity.role, "session established");
        Ok(LoginSession { token, identity })
    }

    /// Identity bound to `token`, or `None` when missing, unknown, or expired.
    ///
    /// # Errors
    /// `StoreUnavailable` when the session store fails.
    pub async fn current_identity(
        &self,
        token: Option<&str>,
    ) -> Result<Option<SessionIdentity>, AuthError> {
        let Some(token) = token.filter(|token| !token.is_empty()) else {
            return Ok(None);
        };
        self.sessions
            .lookup(token)
            .await
            .map_err(AuthError::StoreUnavailable)
    }

    /// Invalidate the session for `token`. Missing or stale tokens are a no-op.
    ///
    /// # Errors
    /// `StoreUnavailable` when the session store fails.
    pub async fn logout(&self, token: Option<&str>) -> Result<(), AuthError> {
        let Some(token) = token.filter(|token| !token.is_empty()) else {
            return Ok(());
        };
        self.sessions
            .revoke(token)
            .await
            .map_err(AuthError::StoreUnavailable)
    }

    /// Drop every session held by the login linked to `student_id`.
    ///
    /// # Errors
    /// `StoreUnavailable` when the session store fails.
    pub async fn revoke_student_sessions(&self, student_id: i64) -> Result<(), AuthError> {
        self.sessions
            .revoke_student(student_id)
            .await
            .map_err(AuthError::StoreUnavailable)
    }

    /// Create the schema if needed and insert an admin for `email` unless one exists.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created or the insert fails.
    #[instrument(skip(self, password))]
    pub async fn provision_default_admin(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<ProvisionOutcome> {
        self.credentials
            .ensure_schema()
            .await
            .context("failed to ensure credential schema")?;

        if self.credentials.find_by_email(email).await?.is_some() {
            return Ok(ProvisionOutcome::AlreadyPresent);
        }

        let password_hash = hash_password_blocking(password.expose_secret().to_string()).await?;
        let created = self
            .credentials
            .insert_if_absent(NewCredential {
                email: email.to_string(),
                password_hash,
                role: Role::Admin,
                student_id: None,
            })
            .await
            .context("failed to insert default admin")?;

        Ok(if created {
            ProvisionOutcome::Created
        } else {
            ProvisionOutcome::AlreadyPresent
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::auth::{
        password::hash_password,
        session_store::MemorySessionStore,
        test_support::{FailingCredentialStore, MemoryCredentialStore},
    };

    const ADMIN_EMAIL: &str = "admin@example.com";
    const ADMIN_PASSWORD: &str = "admin123";

    fn manager(credentials: Arc<MemoryCredentialStore>) -> SessionManager {
        SessionManager::new(
            credentials,
            Arc::new(MemorySessionStore::new()),
            Duration::from_secs(60),
        )
    }

    async fn bootstrapped() -> Result<(Arc<MemoryCredentialStore>, SessionManager)> {
        let credentials = Arc::new(MemoryCredentialStore::new());
        let manager = manager(credentials.clone());
        manager
            .provision_default_admin(ADMIN_EMAIL, &SecretString::from(ADMIN_PASSWORD))
            .await?;
        Ok((credentials, manager))
    }

    #[tokio::test]
    async fn unknown_email_is_invalid_credentials() -> Result<()> {
        let (_, manager) = bootstrapped().await?;
        for (email, password) in [
            ("nobody@example.com", "admin123"),
            ("nobody@example.com", ""),
            ("", "whatever"),
            ("ADMIN@example.com", ADMIN_PASSWORD),
        ] {
            let result = manager.login(email, password).await;
            assert!(
                matches!(result, Err(AuthError::InvalidCredentials)),
                "{email}/{password} should be rejected"
            );
        }
        Ok(())
    }

    #[tokio::test]
    async fn wrong_password_matches_unknown_email_shape() -> Result<()> {
        let (_, manager) = bootstrapped().await?;
        let wrong_password = manager.login(ADMIN_EMAIL, "admin124").await;
        let unknown_email = manager.login("ghost@example.com", "admin124").await;
        match (wrong_password, unknown_email) {
            (Err(left), Err(right)) => {
                assert!(matches!(left, AuthError::InvalidCredentials));
                assert!(matches!(right, AuthError::InvalidCredentials));
                assert_eq!(left.to_string(), right.to_string());
                assert_eq!(left.status(), right.status());
            }
            other => panic!("expected two rejections, got {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn admin_login_binds_admin_identity() -> Result<()> {
        let (_, manager) = bootstrapped().await?;
        let session = manager.login(ADMIN_EMAIL, ADMIN_PASSWORD).await?;
        assert_eq!(session.identity.role, Role::Admin);
        assert_eq!(session.identity.email, ADMIN_EMAIL);
        assert_eq!(session.identity.student_id, None);

        let current = manager.current_identity(Some(&session.token)).await?;
        assert_eq!(current.map(|identity| identity.role), Some(Role::Admin));
        Ok(())
    }

    #[tokio::test]
    async fn logout_invalidates_and_is_idempotent() -> Result<()> {
        let (_, manager) = bootstrapped().await?;
        let session = manager.login(ADMIN_EMAIL, ADMIN_PASSWORD).await?;

        manager.logout(Some(&session.token)).await?;
        assert_eq!(manager.current_identity(Some(&session.token)).await?, None);

        manager.logout(Some(&session.token)).await?;
        manager.logout(None).await?;
        Ok(())
    }

    #[tokio::test]
    async fn missing_token_has_no_identity() -> Result<()> {
        let (_, manager) = bootstrapped().await?;
        assert_eq!(manager.current_identity(None).await?, None);
        assert_eq!(manager.current_identity(Some("")).await?, None);
        assert_eq!(manager.current_identity(Some("forged")).await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn provisioning_twice_creates_one_record() -> Result<()> {
        let credentials = Arc::new(MemoryCredentialStore::new());
        let manager = manager(credentials.clone());
        let password = SecretString::from(ADMIN_PASSWORD);

        let first = manager.provision_default_admin(ADMIN_EMAIL, &password).await?;
        let second = manager.provision_default_admin(ADMIN_EMAIL, &password).await?;

        assert_eq!(first, ProvisionOutcome::Created);
        assert_eq!(second, ProvisionOutcome::AlreadyPresent);
        assert_eq!(credentials.count_email(ADMIN_EMAIL).await, 1);
        assert!(credentials.schema_ensured().await);
        Ok(())
    }

    #[tokio::test]
    async fn provisioning_keeps_existing_password() -> Result<()> {
        let credentials = Arc::new(MemoryCredentialStore::new());
        credentials
            .insert_if_absent(NewCredential {
                email: ADMIN_EMAIL.to_string(),
                password_hash: hash_password("original")?,
                role: Role::Admin,
                student_id: None,
            })
            .await?;
        let manager = manager(credentials.clone());
        let outcome = manager
            .provision_default_admin(ADMIN_EMAIL, &SecretString::from("replacement"))
            .await?;
        assert_eq!(outcome, ProvisionOutcome::AlreadyPresent);
        assert!(manager.login(ADMIN_EMAIL, "original").await.is_ok());
        assert!(manager.login(ADMIN_EMAIL, "replacement").await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn student_without_linked_record_can_log_in() -> Result<()> {
        let credentials = Arc::new(MemoryCredentialStore::new());
        credentials
            .insert_if_absent(NewCredential {
                email: "guest@example.com".to_string(),
                password_hash: hash_password("guest")?,
                role: Role::Student,
                student_id: None,
            })
            .await?;
        let manager = manager(credentials);
        let session = manager.login("guest@example.com", "guest").await?;
        assert_eq!(session.identity.role, Role::Student);
        assert_eq!(session.identity.student_id, None);
        Ok(())
    }

    #[tokio::test]
    async fn store_failures_surface_instead_of_rejecting() {
        let manager = SessionManager::new(
            Arc::new(FailingCredentialStore),
            Arc::new(MemorySessionStore::new()),
            Duration::from_secs(60),
        );
        let result = manager.login(ADMIN_EMAIL, ADMIN_PASSWORD).await;
        assert!(matches!(result, Err(AuthError::StoreUnavailable(_))));

        let result = manager
            .provision_default_admin(ADMIN_EMAIL, &SecretString::from(ADMIN_PASSWORD))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn revoking_a_student_ends_only_their_sessions() -> Result<()> {
        let (credentials, manager) = bootstrapped().await?;
        credentials
            .insert_if_absent(NewCredential {
                email: "ada@example.com".to_string(),
                password_hash: hash_password("analytical")?,
                role: Role::Student,
                student_id: Some(7),
            })
            .await?;
        let student = manager.login("ada@example.com", "analytical").await?;
        let admin = manager.login(ADMIN_EMAIL, ADMIN_PASSWORD).await?;

        manager.revoke_student_sessions(7).await?;

        assert!(manager.current_identity(Some(&student.token)).await?.is_none());
        assert!(manager.current_identity(Some(&admin.token)).await?.is_some());
        Ok(())
    }
}
