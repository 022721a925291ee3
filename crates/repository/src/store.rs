//! Unified store facade combining every repository.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      DomainStore<S>                      │
//! │        (Unified facade for all store operations)         │
//! ├──────────┬───────┬─────────────┬───────────┬─────────────┤
//! │ Accounts │ Tags  │ Permissions │ Profiles  │   Sources   │
//! └──────────┴───────┴─────────────┴───────────┴─────────────┘
//!                           │
//!                           ▼
//!                   StorageBackend (S)
//! ```

use subarr_storage::StorageBackend;

use crate::{
    AccountRepository, PermissionRepository, ProfileRepository, RepositoryResult, SourceRepository,
    TagRepository,
};

/// Unified facade owning one repository per entity family.
///
/// The backend is cloned for each repository, so every repository shares
/// the same underlying storage. Callers reach the repositories through
/// the accessors; there is no extra indirection layer.
///
/// # Example
///
/// ```ignore
/// use subarr_storage::MemoryBackend;
/// use subarr_repository::DomainStore;
///
/// let store = DomainStore::builder().backend(MemoryBackend::new()).build();
/// store.bootstrap().await?;
/// let account = store.accounts().create_account("alice", "pw", None, "admin").await?;
/// ```
pub struct DomainStore<S: StorageBackend> {
    accounts: AccountRepository<S>,
    tags: TagRepository<S>,
    permissions: PermissionRepository<S>,
    profiles: ProfileRepository<S>,
    sources: SourceRepository<S>,
}

#[bon::bon]
impl<S: StorageBackend + Clone> DomainStore<S> {
    /// Create a new store facade with the given backend.
    #[builder]
    pub fn new(backend: S) -> Self {
        Self {
            accounts: AccountRepository::new(backend.clone()),
            tags: TagRepository::new(backend.clone()),
            permissions: PermissionRepository::new(backend.clone()),
            profiles: ProfileRepository::new(backend.clone()),
            sources: SourceRepository::new(backend),
        }
    }
}

impl<S: StorageBackend> DomainStore<S> {
    /// Idempotent first-run initialization: seed the default permission
    /// grants (only into an empty permission set) and make sure a default
    /// language profile exists. Safe to call on every startup.
    pub async fn bootstrap(&self) -> RepositoryResult<()> {
        self.permissions.bootstrap_defaults().await?;
        self.profiles.ensure_default_profile().await?;
        Ok(())
    }

    /// Access the account/session/credential repository.
    #[inline]
    pub fn accounts(&self) -> &AccountRepository<S> {
        &self.accounts
    }

    /// Access the tag and association repository.
    #[inline]
    pub fn tags(&self) -> &TagRepository<S> {
        &self.tags
    }

    /// Access the permission repository.
    #[inline]
    pub fn permissions(&self) -> &PermissionRepository<S> {
        &self.permissions
    }

    /// Access the language profile repository.
    #[inline]
    pub fn profiles(&self) -> &ProfileRepository<S> {
        &self.profiles
    }

    /// Access the subtitle source repository.
    #[inline]
    pub fn sources(&self) -> &SourceRepository<S> {
        &self.sources
    }
}
