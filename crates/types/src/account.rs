//! Account type
//!
//! Represents a user account in the subtitle manager.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user account.
///
/// Accounts own sessions, API keys, one-time login tokens and a dashboard
/// preference. The username is unique across the store; the email, when
/// present, is unique as well. Both resolve to the account id through
/// secondary indexes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier for this account.
    pub id: Uuid,

    /// Unique login name.
    pub username: String,

    /// Argon2id digest of the account password. Never the plaintext.
    pub password_digest: String,

    /// Optional unique email address.
    pub email: Option<String>,

    /// Role name used for permission lookups (e.g. "admin", "user").
    pub role: String,

    /// When this account was created.
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Create a new Account with a fresh random id.
    pub fn new(
        username: impl Into<String>,
        password_digest: impl Into<String>,
        email: Option<String>,
        role: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            password_digest: password_digest.into(),
            email,
            role: role.into(),
            created_at: Utc::now(),
        }
    }
}
