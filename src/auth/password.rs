//! Password policy and argon2 hashing for account credentials.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use thiserror::Error;

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 128;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("Password must be at least {} characters", MIN_PASSWORD_LEN)]
    TooShort,
    #[error("Password must be at most {} characters", MAX_PASSWORD_LEN)]
    TooLong,
    #[error("New password must differ from the current one")]
    Unchanged,
}

/// Length is counted in characters, so `₹` counts once.
pub fn check_policy(plain: &str) -> Result<(), PolicyError> {
    match plain.chars().count() {
        n if n < MIN_PASSWORD_LEN => Err(PolicyError::TooShort),
        n if n > MAX_PASSWORD_LEN => Err(PolicyError::TooLong),
        _ => Ok(()),
    }
}

pub fn check_change(current: &str, new: &str) -> Result<(), PolicyError> {
    check_policy(new)?;
    if current == new {
        return Err(PolicyError::Unchanged);
    }
    Ok(())
}

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow::anyhow!("hash password: {e}"))
}

/// `Ok(false)` on a wrong password; `Err` only when the stored hash is unreadable.
pub fn verify_password(plain: &str, stored_hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| anyhow::anyhow!("stored password hash is malformed: {e}"))?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}
