//! Repository for accounts and everything that authenticates them.
//!
//! This module provides [`AccountRepository`] which handles accounts,
//! sessions, API keys, one-time login tokens and dashboard preferences
//! using a generic [`StorageBackend`].
//!
//! # Key Schema
//!
//! - `user:{id}` → JSON-serialized `Account`
//! - `user_username:{name}` / `user_email:{email}` → account id bytes
//! - `session:{id}` → JSON-serialized `Session`
//! - `session_token:{token}` → session id bytes
//! - `session_user:{account_id}:{session_id}` → session id bytes
//! - `api_key:{id}` → JSON-serialized `ApiKey`
//! - `api_key_value:{key}` → account id bytes
//! - `login_token:{id}` → JSON-serialized `OneTimeToken`
//! - `login_token_value:{token}` → token id bytes
//! - `dashboard:{account_id}` → JSON-serialized `DashboardPref`
//!
//! # Expiry model
//!
//! Sessions and one-time tokens become logically dead at `expires_at` but
//! stay on disk until a validation touches them or
//! [`AccountRepository::cleanup_expired_sessions`] runs. Expired-but-present
//! is an expected state, not a bug.

use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use subarr_storage::StorageBackend;
use subarr_types::{Account, ApiKey, DashboardPref, OneTimeToken, Session};

use crate::{
    error::{RepositoryError, RepositoryResult},
    keys,
    record::{id_bytes, parse_id_bytes, read_id_index, read_record, to_json},
};

/// Repository for account, session, API key, one-time token and dashboard
/// preference operations.
///
/// Multi-step read-decide-write sequences (creation uniqueness checks,
/// role/password updates, cascade deletion, one-time token consumption)
/// run behind a per-family write lock so concurrent mutations cannot lose
/// updates. Expiry-triggered deletions are idempotent and skip the lock.
pub struct AccountRepository<S: StorageBackend> {
    storage: S,
    write_lock: tokio::sync::Mutex<()>,
}

impl<S: StorageBackend> AccountRepository<S> {
    /// Create a new account repository with the given storage backend.
    pub fn new(storage: S) -> Self {
        Self { storage, write_lock: tokio::sync::Mutex::new(()) }
    }

    // =========================================================================
    // Accounts
    // =========================================================================

    /// Create a new account with a unique username and optional unique
    /// email. The password is digested before anything is stored.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if the username or email is taken.
    pub async fn create_account(
        &self,
        username: &str,
        password: &str,
        email: Option<&str>,
        role: &str,
    ) -> RepositoryResult<Account> {
        let _guard = self.write_lock.lock().await;

        if self.storage.get(&keys::account::by_username(username)).await?.is_some() {
            return Err(RepositoryError::AlreadyExists(format!("account username {username:?}")));
        }
        if let Some(email) = email
            && self.storage.get(&keys::account::by_email(email)).await?.is_some()
        {
            return Err(RepositoryError::AlreadyExists(format!("account email {email:?}")));
        }

        let digest = digest_password(password).await?;
        let account = Account::new(username, digest, email.map(String::from), role);
        let data = to_json(&account)?;

        let mut txn = self.storage.transaction().await?;
        txn.set(keys::account::by_id(account.id), data);
        txn.set(keys::account::by_username(username), id_bytes(account.id));
        if let Some(email) = email {
            txn.set(keys::account::by_email(email), id_bytes(account.id));
        }
        txn.commit().await?;

        Ok(account)
    }

    /// Get an account by id. Returns `None` if it does not exist.
    pub async fn get_account(&self, id: Uuid) -> RepositoryResult<Option<Account>> {
        read_record(&self.storage, &keys::account::by_id(id)).await
    }

    /// Get an account through the username index.
    pub async fn get_account_by_username(
        &self,
        username: &str,
    ) -> RepositoryResult<Option<Account>> {
        match read_id_index(&self.storage, &keys::account::by_username(username)).await? {
            Some(id) => self.get_account(id).await,
            None => Ok(None),
        }
    }

    /// Get an account through the email index.
    pub async fn get_account_by_email(&self, email: &str) -> RepositoryResult<Option<Account>> {
        match read_id_index(&self.storage, &keys::account::by_email(email)).await? {
            Some(id) => self.get_account(id).await,
            None => Ok(None),
        }
    }

    /// List all accounts, oldest first.
    pub async fn list_accounts(&self) -> RepositoryResult<Vec<Account>> {
        let (start, end) = keys::account::scan_range();
        let entries = self.storage.get_range(start..end).await?;

        let mut accounts = Vec::with_capacity(entries.len());
        for kv in entries {
            let account: Account =
                serde_json::from_slice(&kv.value).map_err(RepositoryError::serialization)?;
            accounts.push(account);
        }
        accounts.sort_by_key(|a| a.created_at);

        Ok(accounts)
    }

    /// Change an account's role.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the account does not exist.
    pub async fn update_role(&self, id: Uuid, role: &str) -> RepositoryResult<Account> {
        let _guard = self.write_lock.lock().await;

        let mut account = self
            .get_account(id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("account {id}")))?;
        account.role = role.to_string();

        let data = to_json(&account)?;
        self.storage.set(keys::account::by_id(id), data).await?;

        Ok(account)
    }

    /// Replace an account's password digest with a digest of
    /// `new_password`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the account does not exist.
    pub async fn update_password(&self, id: Uuid, new_password: &str) -> RepositoryResult<()> {
        let _guard = self.write_lock.lock().await;

        let mut account = self
            .get_account(id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("account {id}")))?;
        account.password_digest = digest_password(new_password).await?;

        let data = to_json(&account)?;
        self.storage.set(keys::account::by_id(id), data).await?;

        Ok(())
    }

    /// Check a username/password pair. Unknown usernames and wrong
    /// passwords both come back as `None`.
    pub async fn verify_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> RepositoryResult<Option<Uuid>> {
        let Some(account) = self.get_account_by_username(username).await? else {
            return Ok(None);
        };

        let password = password.to_string();
        let digest = account.password_digest.clone();
        let valid = tokio::task::spawn_blocking(move || {
            subarr_auth::verify_password(&password, &digest)
        })
        .await
        .map_err(|e| RepositoryError::Validation(format!("verification task panicked: {e}")))?
        .map_err(|e| RepositoryError::Validation(e.to_string()))?;

        Ok(valid.then_some(account.id))
    }

    /// Delete an account together with its sessions, API keys, login
    /// tokens and dashboard preference, as one atomic batch.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the account does not exist.
    pub async fn delete_account(&self, id: Uuid) -> RepositoryResult<()> {
        let _guard = self.write_lock.lock().await;

        let account = self
            .get_account(id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("account {id}")))?;

        let mut txn = self.storage.transaction().await?;
        txn.delete(keys::account::by_id(id));
        txn.delete(keys::account::by_username(&account.username));
        if let Some(email) = &account.email {
            txn.delete(keys::account::by_email(email));
        }
        txn.delete(keys::dashboard::by_account(id));

        // Sessions, through the per-account index.
        let (start, end) = keys::session::user_scan_range(id);
        for kv in self.storage.get_range(start..end).await? {
            if let Some(session) = self.session_from_index_entry(&kv.key, &kv.value).await? {
                txn.delete(keys::session::by_id(session.id));
                txn.delete(keys::session::by_token(&session.token));
            }
            txn.delete(kv.key);
        }

        // API keys and login tokens carry the account id in the record;
        // their namespaces are scanned bounded and filtered.
        let (start, end) = keys::api_key::scan_range();
        for kv in self.storage.get_range(start..end).await? {
            let Ok(api_key) = serde_json::from_slice::<ApiKey>(&kv.value) else {
                warn!(key = %String::from_utf8_lossy(&kv.key), "skipping malformed api key record");
                continue;
            };
            if api_key.account_id == id {
                txn.delete(keys::api_key::by_value(&api_key.key));
                txn.delete(kv.key);
            }
        }

        let (start, end) = keys::login_token::scan_range();
        for kv in self.storage.get_range(start..end).await? {
            let Ok(token) = serde_json::from_slice::<OneTimeToken>(&kv.value) else {
                warn!(key = %String::from_utf8_lossy(&kv.key), "skipping malformed login token record");
                continue;
            };
            if token.account_id == id {
                txn.delete(keys::login_token::by_value(&token.token));
                txn.delete(kv.key);
            }
        }

        debug!(account = %id, ops = txn.len(), "deleting account cascade");
        txn.commit().await?;

        Ok(())
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    /// Create a session for `account_id` valid for `ttl` from now. The
    /// opaque token is generated here and returned inside the session.
    pub async fn create_session(
        &self,
        account_id: Uuid,
        ttl: chrono::Duration,
    ) -> RepositoryResult<Session> {
        let session = Session::new(account_id, subarr_auth::generate_token(), ttl);
        let data = to_json(&session)?;

        let mut txn = self.storage.transaction().await?;
        txn.set(keys::session::by_id(session.id), data);
        txn.set(keys::session::by_token(&session.token), id_bytes(session.id));
        txn.set(keys::session::user_index(account_id, session.id), id_bytes(session.id));
        txn.commit().await?;

        Ok(session)
    }

    /// Resolve a session token to the owning account id.
    ///
    /// Absent and expired tokens both come back as `None`; an expired
    /// session is invalidated as a side effect, so a later call cannot
    /// retrieve it either.
    pub async fn validate_session(&self, token: &str) -> RepositoryResult<Option<Uuid>> {
        let Some(id) = read_id_index(&self.storage, &keys::session::by_token(token)).await? else {
            return Ok(None);
        };
        let Some(session) = read_record::<_, Session>(&self.storage, &keys::session::by_id(id)).await? else {
            return Ok(None);
        };

        if session.is_expired(Utc::now()) {
            self.remove_session(&session).await?;
            return Ok(None);
        }

        Ok(Some(session.account_id))
    }

    /// Invalidate the session behind `token`. Unknown tokens are a no-op.
    pub async fn invalidate_session(&self, token: &str) -> RepositoryResult<()> {
        let Some(id) = read_id_index(&self.storage, &keys::session::by_token(token)).await? else {
            return Ok(());
        };
        if let Some(session) = read_record::<_, Session>(&self.storage, &keys::session::by_id(id)).await? {
            self.remove_session(&session).await?;
        } else {
            // Dangling token index; clear it.
            self.storage.delete(&keys::session::by_token(token)).await?;
        }
        Ok(())
    }

    /// Invalidate every session belonging to `account_id`. Returns how
    /// many sessions were removed.
    pub async fn invalidate_account_sessions(&self, account_id: Uuid) -> RepositoryResult<usize> {
        let (start, end) = keys::session::user_scan_range(account_id);
        let entries = self.storage.get_range(start..end).await?;

        let mut txn = self.storage.transaction().await?;
        let mut removed = 0;
        for kv in entries {
            if let Some(session) = self.session_from_index_entry(&kv.key, &kv.value).await? {
                txn.delete(keys::session::by_id(session.id));
                txn.delete(keys::session::by_token(&session.token));
                removed += 1;
            }
            txn.delete(kv.key);
        }
        txn.commit().await?;

        debug!(account = %account_id, removed, "invalidated account sessions");
        Ok(removed)
    }

    /// Remove every expired session in one pass. Returns how many were
    /// removed.
    pub async fn cleanup_expired_sessions(&self) -> RepositoryResult<usize> {
        let now = Utc::now();
        let (start, end) = keys::session::scan_range();
        let entries = self.storage.get_range(start..end).await?;

        let mut txn = self.storage.transaction().await?;
        let mut removed = 0;
        for kv in entries {
            let Ok(session) = serde_json::from_slice::<Session>(&kv.value) else {
                warn!(key = %String::from_utf8_lossy(&kv.key), "skipping malformed session record");
                continue;
            };
            if session.is_expired(now) {
                txn.delete(keys::session::by_id(session.id));
                txn.delete(keys::session::by_token(&session.token));
                txn.delete(keys::session::user_index(session.account_id, session.id));
                removed += 1;
            }
        }
        txn.commit().await?;

        debug!(removed, "expired session cleanup");
        Ok(removed)
    }

    // =========================================================================
    // API keys
    // =========================================================================

    /// Create an API key for `account_id`. The key value indexes straight
    /// to the account id, so validation never loads the key record.
    pub async fn create_api_key(&self, account_id: Uuid) -> RepositoryResult<ApiKey> {
        let api_key = ApiKey::new(account_id, subarr_auth::generate_token());
        let data = to_json(&api_key)?;

        let mut txn = self.storage.transaction().await?;
        txn.set(keys::api_key::by_id(api_key.id), data);
        txn.set(keys::api_key::by_value(&api_key.key), id_bytes(account_id));
        txn.commit().await?;

        Ok(api_key)
    }

    /// Resolve an API key value to the owning account id.
    pub async fn validate_api_key(&self, key: &str) -> RepositoryResult<Option<Uuid>> {
        read_id_index(&self.storage, &keys::api_key::by_value(key)).await
    }

    /// List the API keys belonging to `account_id`.
    pub async fn list_api_keys(&self, account_id: Uuid) -> RepositoryResult<Vec<ApiKey>> {
        let (start, end) = keys::api_key::scan_range();
        let entries = self.storage.get_range(start..end).await?;

        let mut api_keys = Vec::new();
        for kv in entries {
            let api_key: ApiKey =
                serde_json::from_slice(&kv.value).map_err(RepositoryError::serialization)?;
            if api_key.account_id == account_id {
                api_keys.push(api_key);
            }
        }
        Ok(api_keys)
    }

    /// Remove an API key record and its value index.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the key record does not exist.
    pub async fn revoke_api_key(&self, id: Uuid) -> RepositoryResult<()> {
        let _guard = self.write_lock.lock().await;

        let api_key = read_record::<_, ApiKey>(&self.storage, &keys::api_key::by_id(id))
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("api key {id}")))?;

        let mut txn = self.storage.transaction().await?;
        txn.delete(keys::api_key::by_id(id));
        txn.delete(keys::api_key::by_value(&api_key.key));
        txn.commit().await?;

        Ok(())
    }

    // =========================================================================
    // One-time login tokens
    // =========================================================================

    /// Create a one-time login token for `account_id` valid for `ttl`
    /// from now.
    pub async fn create_login_token(
        &self,
        account_id: Uuid,
        ttl: chrono::Duration,
    ) -> RepositoryResult<OneTimeToken> {
        let token = OneTimeToken::new(account_id, subarr_auth::generate_token(), ttl);
        let data = to_json(&token)?;

        let mut txn = self.storage.transaction().await?;
        txn.set(keys::login_token::by_id(token.id), data);
        txn.set(keys::login_token::by_value(&token.token), id_bytes(token.id));
        txn.commit().await?;

        Ok(token)
    }

    /// Consume a one-time login token.
    ///
    /// Succeeds at most once per token: the first valid consumption flips
    /// the `used` flag and returns the account id; absent, expired and
    /// already-used tokens all come back as `None`, indistinguishably.
    pub async fn consume_login_token(&self, token: &str) -> RepositoryResult<Option<Uuid>> {
        let _guard = self.write_lock.lock().await;

        let Some(id) = read_id_index(&self.storage, &keys::login_token::by_value(token)).await? else {
            return Ok(None);
        };
        let Some(mut record) =
            read_record::<_, OneTimeToken>(&self.storage, &keys::login_token::by_id(id)).await?
        else {
            return Ok(None);
        };

        if record.used || record.is_expired(Utc::now()) {
            return Ok(None);
        }

        record.used = true;
        let data = to_json(&record)?;
        self.storage.set(keys::login_token::by_id(id), data).await?;

        Ok(Some(record.account_id))
    }

    // =========================================================================
    // Dashboard preferences
    // =========================================================================

    /// Get the stored dashboard layout for `account_id`.
    pub async fn get_dashboard_layout(&self, account_id: Uuid) -> RepositoryResult<Option<String>> {
        let pref =
            read_record::<_, DashboardPref>(&self.storage, &keys::dashboard::by_account(account_id))
                .await?;
        Ok(pref.map(|p| p.layout))
    }

    /// Store the dashboard layout for `account_id`, last write wins.
    pub async fn set_dashboard_layout(
        &self,
        account_id: Uuid,
        layout: &str,
    ) -> RepositoryResult<()> {
        let pref = DashboardPref::new(account_id, layout);
        let data = to_json(&pref)?;
        self.storage.set(keys::dashboard::by_account(account_id), data).await?;
        Ok(())
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Load the session behind a `session_user:` index entry, skipping
    /// (with a warning) entries whose target is gone or unparseable.
    async fn session_from_index_entry(
        &self,
        index_key: &[u8],
        value: &[u8],
    ) -> RepositoryResult<Option<Session>> {
        let Ok(id) = parse_id_bytes(value) else {
            warn!(key = %String::from_utf8_lossy(index_key), "skipping malformed session index entry");
            return Ok(None);
        };
        match self.storage.get(&keys::session::by_id(id)).await? {
            Some(data) => match serde_json::from_slice(&data) {
                Ok(session) => Ok(Some(session)),
                Err(_) => {
                    warn!(session = %id, "skipping malformed session record");
                    Ok(None)
                },
            },
            None => Ok(None),
        }
    }

    /// Remove a session record and both its indexes atomically.
    async fn remove_session(&self, session: &Session) -> RepositoryResult<()> {
        let mut txn = self.storage.transaction().await?;
        txn.delete(keys::session::by_id(session.id));
        txn.delete(keys::session::by_token(&session.token));
        txn.delete(keys::session::user_index(session.account_id, session.id));
        txn.commit().await?;
        Ok(())
    }
}

/// Digest a password off the async runtime.
async fn digest_password(password: &str) -> RepositoryResult<String> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || subarr_auth::hash_password(&password))
        .await
        .map_err(|e| RepositoryError::Validation(format!("hashing task panicked: {e}")))?
        .map_err(|e| RepositoryError::Validation(e.to_string()))
}
