//! Credential types
//!
//! Sessions, API keys, one-time login tokens and dashboard preferences.
//! All of them belong to an [`Account`](crate::Account) and are removed
//! when the owning account is deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A browser session.
///
/// Sessions carry an expiry but are not purged by a background job: an
/// expired session stays on disk until a validation touches it or an
/// explicit cleanup pass runs. "Expired but still present" is an expected
/// transient state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Unique identifier for this session.
    pub id: Uuid,

    /// The account this session authenticates.
    pub account_id: Uuid,

    /// Opaque bearer token presented by the client.
    pub token: String,

    /// When this session stops being valid.
    pub expires_at: DateTime<Utc>,

    /// When this session was created.
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Create a new session valid for `ttl` from now.
    pub fn new(account_id: Uuid, token: impl Into<String>, ttl: chrono::Duration) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            account_id,
            token: token.into(),
            expires_at: now + ttl,
            created_at: now,
        }
    }

    /// Check whether the session has expired as of `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// A long-lived API key.
///
/// The key value indexes straight to the owning account id, so validating
/// a key is a single point read with no intermediate record load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKey {
    /// Unique identifier for this key record.
    pub id: Uuid,

    /// The account this key authenticates.
    pub account_id: Uuid,

    /// Opaque key value presented by the client.
    pub key: String,

    /// When this key was created.
    pub created_at: DateTime<Utc>,
}

impl ApiKey {
    /// Create a new API key record.
    pub fn new(account_id: Uuid, key: impl Into<String>) -> Self {
        Self { id: Uuid::new_v4(), account_id, key: key.into(), created_at: Utc::now() }
    }
}

/// A single-use login token.
///
/// The `used` flag transitions `false → true` exactly once; consumed or
/// expired tokens always fail further consumption attempts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneTimeToken {
    /// Unique identifier for this token record.
    pub id: Uuid,

    /// The account this token logs in.
    pub account_id: Uuid,

    /// Opaque token value.
    pub token: String,

    /// When this token stops being consumable.
    pub expires_at: DateTime<Utc>,

    /// Whether this token has already been consumed.
    pub used: bool,

    /// When this token was created.
    pub created_at: DateTime<Utc>,
}

impl OneTimeToken {
    /// Create a new unused token valid for `ttl` from now.
    pub fn new(account_id: Uuid, token: impl Into<String>, ttl: chrono::Duration) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            account_id,
            token: token.into(),
            expires_at: now + ttl,
            used: false,
            created_at: now,
        }
    }

    /// Check whether the token has expired as of `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Per-account dashboard layout, last-write-wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardPref {
    /// The account this preference belongs to.
    pub account_id: Uuid,

    /// Opaque layout description owned by the frontend.
    pub layout: String,

    /// When this preference was last written.
    pub updated_at: DateTime<Utc>,
}

impl DashboardPref {
    /// Create a preference stamped with the current time.
    pub fn new(account_id: Uuid, layout: impl Into<String>) -> Self {
        Self { account_id, layout: layout.into(), updated_at: Utc::now() }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn test_session_expiry() {
        let session = Session::new(Uuid::new_v4(), "tok", Duration::hours(1));
        assert!(!session.is_expired(Utc::now()));
        assert!(session.is_expired(Utc::now() + Duration::hours(2)));
    }

    #[test]
    fn test_session_expires_exactly_at_boundary() {
        let session = Session::new(Uuid::new_v4(), "tok", Duration::hours(1));
        assert!(session.is_expired(session.expires_at));
    }

    #[test]
    fn test_one_time_token_starts_unused() {
        let token = OneTimeToken::new(Uuid::new_v4(), "tok", Duration::minutes(15));
        assert!(!token.used);
        assert!(!token.is_expired(Utc::now()));
    }

    #[test]
    fn test_api_key_serialization() {
        let key = ApiKey::new(Uuid::new_v4(), "abc123");
        let json = serde_json::to_string(&key).unwrap();
        let deserialized: ApiKey = serde_json::from_str(&json).unwrap();
        assert_eq!(key, deserialized);
    }

    #[test]
    fn test_dashboard_pref_serialization() {
        let pref = DashboardPref::new(Uuid::new_v4(), "{\"panels\":[]}");
        let json = serde_json::to_string(&pref).unwrap();
        let deserialized: DashboardPref = serde_json::from_str(&json).unwrap();
        assert_eq!(pref, deserialized);
    }
}
