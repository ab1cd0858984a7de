//! Server-side session storage.
//!
//! Flow Overview: `create` mints a random token and binds an identity to its
//! hash; `lookup` resolves a presented token while it is unexpired; `revoke`
//! removes the binding. Expiry is passive: entries are checked on lookup and
//! pruned on insert, never by a timer.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::{
    collections::HashMap,
    time::{Duration, Instant},
};
use tokio::sync::RwLock;

use super::{
    principal::SessionIdentity,
    utils::{generate_session_token, hash_session_token},
};

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Bind `identity` to a fresh token valid for `ttl`. Returns the raw token.
    async fn create(&self, identity: &SessionIdentity, ttl: Duration) -> Result<String>;

    /// Resolve a raw token. Unknown and expired tokens yield `None`.
    async fn lookup(&self, token: &str) -> Result<Option<SessionIdentity>>;

    /// Invalidate a raw token. Unknown tokens are not an error.
    async fn revoke(&self, token: &str) -> Result<()>;

    /// Invalidate every session bound to a student record.
    async fn revoke_student(&self, student_id: i64) -> Result<()>;
}

struct MemorySession {
    identity: SessionIdentity,
    expires_at: Instant,
}

impl MemorySession {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Process-local session store keyed by token hash.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<Vec<u8>, MemorySession>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included until the next prune.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, identity: &SessionIdentity, ttl: Duration) -> Result<String> {
        let now = Instant::now();
        let expires_at = now
            .checked_add(ttl)
            .ok_or_else(|| anyhow!("session ttl out of range: {}s", ttl.as_secs()))?;

        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, session| session.is_live(now));

        // 256-bit tokens make collisions practically impossible; loop anyway so
        // an existing binding is never overwritten.
        loop {
            let token = generate_session_token()?;
            let token_hash = hash_session_token(&token);
            if sessions.contains_key(&token_hash) {
                continue;
            }
            sessions.insert(
                token_hash,
                MemorySession {
                    identity: identity.clone(),
                    expires_at,
                },
            );
            return Ok(token);
        }
    }

    async fn lookup(&self, token: &str) -> Result<Option<SessionIdentity>> {
        let token_hash = hash_session_token(token);
        let sessions = self.sessions.read().await;
        Ok(sessions
            .get(&token_hash)
            .filter(|session| session.is_live(Instant::now()))
            .map(|session| session.identity.clone()))
    }

    async fn revoke(&self, token: &str) -> Result<()> {
        let token_hash = hash_session_token(token);
        self.sessions.write().await.remove(&token_hash);
        Ok(())
    }

    async fn revoke_student(&self, student_id: i64) -> Result<()> {
        self.sessions
            .write()
            .await
            .retain(|_, session| session.identity.student_id != Some(student_id));
        Ok(())
    }
}
