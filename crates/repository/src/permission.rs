//! Repository for role permission grants.
//!
//! This module provides [`PermissionRepository`], a plain role →
//! permission multimap over a generic [`StorageBackend`]. There is no
//! secondary index: role lookups filter a bounded scan of the
//! `permission:` namespace, which stays small (a handful of grants per
//! role).
//!
//! # Key Schema
//!
//! - `permission:{id}` → JSON-serialized `Permission`

use tracing::debug;
use uuid::Uuid;

use subarr_storage::StorageBackend;
use subarr_types::Permission;

use crate::{
    error::{RepositoryError, RepositoryResult},
    keys,
    record::{read_record, to_json},
};

/// The grants seeded into an empty store: admins can do everything,
/// users can read and download, guests can only read.
const DEFAULT_GRANTS: &[(&str, &str)] = &[
    ("admin", "all"),
    ("user", "read"),
    ("user", "download"),
    ("guest", "read"),
];

/// Repository for permission grant operations.
pub struct PermissionRepository<S: StorageBackend> {
    storage: S,
    write_lock: tokio::sync::Mutex<()>,
}

impl<S: StorageBackend> PermissionRepository<S> {
    /// Create a new permission repository with the given storage backend.
    pub fn new(storage: S) -> Self {
        Self { storage, write_lock: tokio::sync::Mutex::new(()) }
    }

    /// Grant `permission` to `role`.
    pub async fn create(&self, role: &str, permission: &str) -> RepositoryResult<Permission> {
        let grant = Permission::new(role, permission);
        let data = to_json(&grant)?;
        self.storage.set(keys::permission::by_id(grant.id), data).await?;
        Ok(grant)
    }

    /// Get a grant by id. Returns `None` if it does not exist.
    pub async fn get(&self, id: Uuid) -> RepositoryResult<Option<Permission>> {
        read_record(&self.storage, &keys::permission::by_id(id)).await
    }

    /// List every grant in the store.
    pub async fn list_all(&self) -> RepositoryResult<Vec<Permission>> {
        let (start, end) = keys::permission::scan_range();
        let entries = self.storage.get_range(start..end).await?;

        let mut grants = Vec::with_capacity(entries.len());
        for kv in entries {
            let grant: Permission =
                serde_json::from_slice(&kv.value).map_err(RepositoryError::serialization)?;
            grants.push(grant);
        }
        Ok(grants)
    }

    /// List the permission strings granted to `role`.
    pub async fn permissions_for_role(&self, role: &str) -> RepositoryResult<Vec<String>> {
        Ok(self
            .list_all()
            .await?
            .into_iter()
            .filter(|grant| grant.role == role)
            .map(|grant| grant.permission)
            .collect())
    }

    /// Remove a grant.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the grant does not exist.
    pub async fn delete(&self, id: Uuid) -> RepositoryResult<()> {
        let _guard = self.write_lock.lock().await;

        let key = keys::permission::by_id(id);
        if self.storage.get(&key).await?.is_none() {
            return Err(RepositoryError::NotFound(format!("permission {id}")));
        }
        self.storage.delete(&key).await?;
        Ok(())
    }

    /// Seed the default grants, but only into a completely empty
    /// permission set. Idempotent: once any grant exists (seeded or
    /// hand-made), calling this again writes nothing.
    ///
    /// Returns the number of grants written (zero when already seeded).
    pub async fn bootstrap_defaults(&self) -> RepositoryResult<usize> {
        let _guard = self.write_lock.lock().await;

        let (start, end) = keys::permission::scan_range();
        if !self.storage.get_range(start..end).await?.is_empty() {
            return Ok(0);
        }

        let mut txn = self.storage.transaction().await?;
        for (role, permission) in DEFAULT_GRANTS {
            let grant = Permission::new(*role, *permission);
            txn.set(keys::permission::by_id(grant.id), to_json(&grant)?);
        }
        let seeded = txn.len();
        txn.commit().await?;

        debug!(seeded, "bootstrapped default permissions");
        Ok(seeded)
    }
}
