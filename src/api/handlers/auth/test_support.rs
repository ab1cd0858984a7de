//! In-memory and failing store doubles for unit and router tests.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::RwLock;

use super::{
    credentials::{CredentialRecord, CredentialStore, NewCredential},
    principal::SessionIdentity,
    session_store::SessionStore,
};

#[derive(Default)]
pub(crate) struct MemoryCredentialStore {
    records: RwLock<Vec<CredentialRecord>>,
    schema_ensured: RwLock<bool>,
}

impl MemoryCredentialStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn count_email(&self, email: &str) -> usize {
        self.records
            .read()
            .await
            .iter()
            .filter(|record| record.email == email)
            .count()
    }

    pub(crate) async fn schema_ensured(&self) -> bool {
        *self.schema_ensured.read().await
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn ensure_schema(&self) -> Result<()> {
        *self.schema_ensured.write().await = true;
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<CredentialRecord>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .find(|record| record.email == email)
            .cloned())
    }

    async fn insert_if_absent(&self, credential: NewCredential) -> Result<bool> {
        let mut records = self.records.write().await;
        if records.iter().any(|record| record.email == credential.email) {
            return Ok(false);
        }
        let id = i64::try_from(records.len())? + 1;
        records.push(CredentialRecord {
            id,
            email: credential.email,
            password_hash: credential.password_hash,
            role: credential.role,
            student_id: credential.student_id,
        });
        Ok(true)
    }
}

pub(crate) struct FailingCredentialStore;

#[async_trait]
impl CredentialStore for FailingCredentialStore {
    async fn ensure_schema(&self) -> Result<()> {
        Err(anyhow!("credential store offline"))
    }

    async fn find_by_email(&self, _email: &str) -> Result<Option<CredentialRecord>> {
        Err(anyhow!("credential store offline"))
    }

    async fn insert_if_absent(&self, _credential: NewCredential) -> Result<bool> {
        Err(anyhow!("credential store offline"))
    }
}

pub(crate) struct FailingSessionStore;

#[async_trait]
impl SessionStore for FailingSessionStore {
    async fn create(&self, _identity: &SessionIdentity, _ttl: Duration) -> Result<String> {
        Err(anyhow!("session store offline"))
    }

    async fn lookup(&self, _token: &str) -> Result<Option<SessionIdentity>> {
        Err(anyhow!("session store offline"))
    }

    async fn revoke(&self, _token: &str) -> Result<()> {
        Err(anyhow!("session store offline"))
    }

    async fn revoke_student(&self, _student_id: i64) -> Result<()> {
        Err(anyhow!("session store offline"))
    }
}
