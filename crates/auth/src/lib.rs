//! # Subarr Auth
//!
//! Password digesting and opaque credential generation.
//!
//! The store persists Argon2id digests, never plaintext passwords, and
//! issues opaque random tokens for sessions, API keys and one-time
//! logins. Hashing and verification are CPU-heavy; async callers should
//! run them on the blocking thread pool (`tokio::task::spawn_blocking`),
//! which is what `subarr-repository` does.

#![deny(unsafe_code)]

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

/// Result type alias for auth operations.
pub type AuthResult<T> = Result<T, AuthError>;

/// Errors from digesting or verifying credentials.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The password could not be hashed.
    #[error("failed to hash password: {0}")]
    Hash(String),

    /// A stored digest is not a parseable PHC string.
    #[error("invalid password digest format: {0}")]
    InvalidDigest(String),
}

/// Hash a password with Argon2id and a fresh random salt.
///
/// Returns the digest in PHC string format, ready to persist.
pub fn hash_password(password: &str) -> AuthResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthError::Hash(e.to_string()))?;
    Ok(hash.to_string())
}

/// Verify a password against a stored digest.
///
/// A wrong password is `Ok(false)`; only an unparseable digest is an
/// error.
pub fn verify_password(password: &str, digest: &str) -> AuthResult<bool> {
    let parsed = PasswordHash::new(digest).map_err(|e| AuthError::InvalidDigest(e.to_string()))?;
    Ok(Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
}

/// Generate an opaque credential value (64 character hex string).
///
/// Used for session tokens, API keys and one-time login tokens.
#[must_use]
pub fn generate_token() -> String {
    use rand::Rng;

    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();

    bytes.iter().fold(String::with_capacity(64), |mut acc, b| {
        use std::fmt::Write;
        let _ = write!(acc, "{b:02x}");
        acc
    })
}
