//! Password hashing and verification (Argon2id, PHC strings).
//!
//! Hashing is CPU bound; the async wrappers run it on the blocking pool.

use anyhow::{anyhow, Context, Result};
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use once_cell::sync::Lazy;
use rand::rngs::OsRng;

/// Hash used when the email is unknown, so both failure paths cost one verification.
static DUMMY_HASH: Lazy<Option<String>> =
    Lazy::new(|| hash_password("campus-dummy-password").ok());

/// Hash a password with a fresh random salt.
///
/// # Errors
/// Returns an error if Argon2 rejects the input.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow!("failed to hash password: {err}"))?
        .to_string();
    Ok(hash)
}

/// Verify a candidate password against a stored PHC hash.
///
/// Malformed hashes never verify.
#[must_use]
pub fn verify_password(hash: &str, candidate: &str) -> bool {
    PasswordHash::new(hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(candidate.as_bytes(), &parsed)
            .is_ok()
    })
}

/// Spend the same work as a real verification and always fail.
#[must_use]
pub fn verify_against_dummy(candidate: &str) -> bool {
    if let Some(hash) = DUMMY_HASH.as_deref() {
        let _ = verify_password(hash, candidate);
    }
    false
}

pub(crate) async fn hash_password_blocking(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .context("password hashing task failed")?
}

/// Verify on the blocking pool. `None` stands for "no such account".
pub(crate) async fn verify_password_blocking(hash: Option<String>, candidate: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || match hash {
        Some(hash) => verify_password(&hash, &candidate),
        None => verify_against_dummy(&candidate),
    })
    .await
    .context("password verification task failed")
}
