//! Repository for language profiles and media assignments.
//!
//! This module provides [`ProfileRepository`] which handles language
//! profile CRUD, the single-default invariant and per-media profile
//! assignments using a generic [`StorageBackend`].
//!
//! # Key Schema
//!
//! - `language_profile:{id}` → JSON-serialized `LanguageProfile`
//! - `media_profile:{media_id}` → JSON-serialized `MediaProfileAssignment`
//!
//! # Default resolution
//!
//! `get_default` resolves through a fallback chain: the profile with
//! `is_default` set, else the first profile in list order, else a
//! hardcoded English profile that is created *and persisted* on the spot.
//! That read-triggers-write behavior is part of the contract; callers who
//! prefer an explicit initialization step can run
//! [`ProfileRepository::ensure_default_profile`] at startup, which is the
//! same idempotent operation under its real name.

use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use subarr_storage::StorageBackend;
use subarr_types::{LanguageProfile, MediaProfileAssignment};

use crate::{
    error::{RepositoryError, RepositoryResult},
    keys,
    record::{read_record, to_json},
};

/// Repository for language profile and media assignment operations.
///
/// Default selection, lazy fallback creation and cascade deletion are
/// read-decide-write sequences; all of them serialize behind the family
/// write lock so there is always at most one default profile.
pub struct ProfileRepository<S: StorageBackend> {
    storage: S,
    write_lock: tokio::sync::Mutex<()>,
}

impl<S: StorageBackend> ProfileRepository<S> {
    /// Create a new profile repository with the given storage backend.
    pub fn new(storage: S) -> Self {
        Self { storage, write_lock: tokio::sync::Mutex::new(()) }
    }

    // =========================================================================
    // Profiles
    // =========================================================================

    /// Store a new profile.
    ///
    /// If the profile claims `is_default`, every other profile loses the
    /// flag in the same atomic batch.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if a profile with the same id exists.
    pub async fn create_profile(&self, profile: LanguageProfile) -> RepositoryResult<LanguageProfile> {
        let _guard = self.write_lock.lock().await;

        let key = keys::profile::by_id(profile.id);
        if self.storage.get(&key).await?.is_some() {
            return Err(RepositoryError::AlreadyExists(format!("profile {}", profile.id)));
        }

        let mut txn = self.storage.transaction().await?;
        if profile.is_default {
            self.clear_other_defaults(&mut txn, profile.id).await?;
        }
        txn.set(key, to_json(&profile)?);
        txn.commit().await?;

        Ok(profile)
    }

    /// Overwrite an existing profile.
    ///
    /// `updated_at` is stamped here. Claiming `is_default` clears the
    /// flag on every other profile in the same batch.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the profile does not exist.
    pub async fn update_profile(
        &self,
        mut profile: LanguageProfile,
    ) -> RepositoryResult<LanguageProfile> {
        let _guard = self.write_lock.lock().await;

        let key = keys::profile::by_id(profile.id);
        if self.storage.get(&key).await?.is_none() {
            return Err(RepositoryError::NotFound(format!("profile {}", profile.id)));
        }
        profile.updated_at = Utc::now();

        let mut txn = self.storage.transaction().await?;
        if profile.is_default {
            self.clear_other_defaults(&mut txn, profile.id).await?;
        }
        txn.set(key, to_json(&profile)?);
        txn.commit().await?;

        Ok(profile)
    }

    /// Get a profile by id. Returns `None` if it does not exist.
    pub async fn get_profile(&self, id: Uuid) -> RepositoryResult<Option<LanguageProfile>> {
        read_record(&self.storage, &keys::profile::by_id(id)).await
    }

    /// List all profiles: the default first, then by name.
    pub async fn list_profiles(&self) -> RepositoryResult<Vec<LanguageProfile>> {
        let mut profiles = self.load_all_profiles().await?;
        sort_default_first(&mut profiles);
        Ok(profiles)
    }

    /// Make `id` the one default profile, clearing the flag on every
    /// other profile in the same atomic batch.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the profile does not exist.
    pub async fn set_default(&self, id: Uuid) -> RepositoryResult<LanguageProfile> {
        let _guard = self.write_lock.lock().await;

        let mut target = self
            .get_profile(id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("profile {id}")))?;

        let mut txn = self.storage.transaction().await?;
        self.clear_other_defaults(&mut txn, id).await?;
        target.is_default = true;
        target.updated_at = Utc::now();
        txn.set(keys::profile::by_id(id), to_json(&target)?);
        txn.commit().await?;

        Ok(target)
    }

    /// Resolve the default profile: explicit default, else first profile
    /// in list order, else a persisted hardcoded English profile.
    ///
    /// On an empty profile set this *writes* the fallback before
    /// returning it, so a second call finds the same profile.
    pub async fn get_default(&self) -> RepositoryResult<LanguageProfile> {
        let _guard = self.write_lock.lock().await;
        self.resolve_default().await
    }

    /// Idempotent initialization: make sure some profile exists and is
    /// resolvable as the default. Same operation as [`Self::get_default`],
    /// exposed for callers that want the write to happen at startup
    /// rather than inside a read path.
    pub async fn ensure_default_profile(&self) -> RepositoryResult<LanguageProfile> {
        let _guard = self.write_lock.lock().await;
        self.resolve_default().await
    }

    /// Delete a profile, first removing every media assignment pointing
    /// at it, all in one atomic batch.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the profile does not exist.
    pub async fn delete_profile(&self, id: Uuid) -> RepositoryResult<()> {
        let _guard = self.write_lock.lock().await;

        let key = keys::profile::by_id(id);
        if self.storage.get(&key).await?.is_none() {
            return Err(RepositoryError::NotFound(format!("profile {id}")));
        }

        let mut txn = self.storage.transaction().await?;

        let (start, end) = keys::profile::media_scan_range();
        let mut unassigned = 0usize;
        for kv in self.storage.get_range(start..end).await? {
            let Ok(assignment) = serde_json::from_slice::<MediaProfileAssignment>(&kv.value) else {
                warn!(key = %String::from_utf8_lossy(&kv.key), "skipping malformed media assignment");
                continue;
            };
            if assignment.profile_id == id {
                txn.delete(kv.key);
                unassigned += 1;
            }
        }
        txn.delete(key);

        debug!(profile = %id, unassigned, "deleting profile cascade");
        txn.commit().await?;

        Ok(())
    }

    // =========================================================================
    // Media assignments
    // =========================================================================

    /// Assign a profile to a media item. One assignment per media id;
    /// assigning again overwrites.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the profile does not exist.
    pub async fn assign_media(
        &self,
        media_id: &str,
        profile_id: Uuid,
    ) -> RepositoryResult<MediaProfileAssignment> {
        if self.get_profile(profile_id).await?.is_none() {
            return Err(RepositoryError::NotFound(format!("profile {profile_id}")));
        }

        let assignment = MediaProfileAssignment::new(media_id, profile_id);
        let data = to_json(&assignment)?;
        self.storage.set(keys::profile::media(media_id), data).await?;

        Ok(assignment)
    }

    /// Remove a media item's assignment. Absent assignments are a no-op.
    pub async fn unassign_media(&self, media_id: &str) -> RepositoryResult<()> {
        self.storage.delete(&keys::profile::media(media_id)).await?;
        Ok(())
    }

    /// Get a media item's assignment record, if any.
    pub async fn get_media_assignment(
        &self,
        media_id: &str,
    ) -> RepositoryResult<Option<MediaProfileAssignment>> {
        read_record(&self.storage, &keys::profile::media(media_id)).await
    }

    /// Get the profile effective for a media item: its assigned profile
    /// if one exists, else the default-resolution chain (which creates
    /// the fallback on a completely empty profile set).
    pub async fn get_media_profile(&self, media_id: &str) -> RepositoryResult<LanguageProfile> {
        if let Some(assignment) = self.get_media_assignment(media_id).await?
            && let Some(profile) = self.get_profile(assignment.profile_id).await?
        {
            return Ok(profile);
        }

        let _guard = self.write_lock.lock().await;
        self.resolve_default().await
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Load every profile, surfacing corruption.
    async fn load_all_profiles(&self) -> RepositoryResult<Vec<LanguageProfile>> {
        let (start, end) = keys::profile::scan_range();
        let entries = self.storage.get_range(start..end).await?;

        let mut profiles = Vec::with_capacity(entries.len());
        for kv in entries {
            let profile: LanguageProfile =
                serde_json::from_slice(&kv.value).map_err(RepositoryError::serialization)?;
            profiles.push(profile);
        }
        Ok(profiles)
    }

    /// Stage `is_default = false` writes for every profile other than
    /// `winner` that currently holds the flag.
    async fn clear_other_defaults(
        &self,
        txn: &mut subarr_storage::Transaction<'_>,
        winner: Uuid,
    ) -> RepositoryResult<()> {
        for mut profile in self.load_all_profiles().await? {
            if profile.id != winner && profile.is_default {
                profile.is_default = false;
                profile.updated_at = Utc::now();
                txn.set(keys::profile::by_id(profile.id), to_json(&profile)?);
            }
        }
        Ok(())
    }

    /// The default-resolution chain. Caller must hold the write lock:
    /// the empty-set branch persists the fallback profile.
    async fn resolve_default(&self) -> RepositoryResult<LanguageProfile> {
        let mut profiles = self.load_all_profiles().await?;

        if let Some(profile) = profiles.iter().find(|p| p.is_default) {
            return Ok(profile.clone());
        }
        if !profiles.is_empty() {
            sort_default_first(&mut profiles);
            return Ok(profiles.remove(0));
        }

        let fallback = LanguageProfile::english_fallback();
        let data = to_json(&fallback)?;
        self.storage.set(keys::profile::by_id(fallback.id), data).await?;
        debug!(profile = %fallback.id, "persisted fallback default profile");

        Ok(fallback)
    }
}

fn sort_default_first(profiles: &mut [LanguageProfile]) {
    profiles.sort_by(|a, b| b.is_default.cmp(&a.is_default).then_with(|| a.name.cmp(&b.name)));
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use subarr_storage::MemoryBackend;
    use subarr_types::ProfileItem;

    use super::*;

    fn create_repo() -> ProfileRepository<MemoryBackend> {
        ProfileRepository::new(MemoryBackend::new())
    }

    fn test_profile(name: &str) -> LanguageProfile {
        LanguageProfile::new(
            name,
            vec![ProfileItem {
                language: "en".into(),
                priority: 1,
                forced: false,
                hearing_impaired: false,
            }],
            80,
        )
    }

    // =========================================================================
    // CRUD TESTS
    // =========================================================================

    #[tokio::test]
    async fn test_create_and_get() {
        let repo = create_repo();
        let profile = repo.create_profile(test_profile("Nordic")).await.unwrap();

        let reloaded = repo.get_profile(profile.id).await.unwrap().unwrap();
        assert_eq!(reloaded, profile);
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_id() {
        let repo = create_repo();
        let profile = repo.create_profile(test_profile("Nordic")).await.unwrap();

        let result = repo.create_profile(profile).await;
        assert!(matches!(result, Err(RepositoryError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_update_profile_stamps_updated_at() {
        let repo = create_repo();
        let profile = repo.create_profile(test_profile("Nordic")).await.unwrap();

        let mut changed = profile.clone();
        changed.cutoff_score = 95;
        let updated = repo.update_profile(changed).await.unwrap();

        assert_eq!(updated.cutoff_score, 95);
        assert!(updated.updated_at >= profile.updated_at);
        let reloaded = repo.get_profile(profile.id).await.unwrap().unwrap();
        assert_eq!(reloaded.cutoff_score, 95);
    }

    #[tokio::test]
    async fn test_update_missing_profile_fails() {
        let repo = create_repo();
        let result = repo.update_profile(test_profile("Ghost")).await;
        assert!(matches!(result, Err(RepositoryError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_orders_default_first_then_name() {
        let repo = create_repo();
        repo.create_profile(test_profile("Zeta")).await.unwrap();
        let mid = repo.create_profile(test_profile("Mid")).await.unwrap();
        repo.create_profile(test_profile("Alpha")).await.unwrap();
        repo.set_default(mid.id).await.unwrap();

        let names: Vec<_> =
            repo.list_profiles().await.unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, ["Mid", "Alpha", "Zeta"]);
    }

    // =========================================================================
    // DEFAULT RESOLUTION TESTS
    // =========================================================================

    #[tokio::test]
    async fn test_set_default_has_exactly_one_winner() {
        let repo = create_repo();
        let a = repo.create_profile(test_profile("A")).await.unwrap();
        let b = repo.create_profile(test_profile("B")).await.unwrap();

        repo.set_default(a.id).await.unwrap();
        repo.set_default(b.id).await.unwrap();

        let profiles = repo.list_profiles().await.unwrap();
        let defaults: Vec<_> = profiles.iter().filter(|p| p.is_default).collect();
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults[0].id, b.id);
    }

    #[tokio::test]
    async fn test_create_with_default_flag_clears_others() {
        let repo = create_repo();
        let a = repo.create_profile(test_profile("A")).await.unwrap();
        repo.set_default(a.id).await.unwrap();

        let mut b = test_profile("B");
        b.is_default = true;
        let b = repo.create_profile(b).await.unwrap();

        let profiles = repo.list_profiles().await.unwrap();
        let defaults: Vec<_> = profiles.iter().filter(|p| p.is_default).collect();
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults[0].id, b.id);
    }

    #[tokio::test]
    async fn test_get_default_prefers_explicit_flag() {
        let repo = create_repo();
        repo.create_profile(test_profile("A")).await.unwrap();
        let b = repo.create_profile(test_profile("B")).await.unwrap();
        repo.set_default(b.id).await.unwrap();

        assert_eq!(repo.get_default().await.unwrap().id, b.id);
    }

    #[tokio::test]
    async fn test_get_default_falls_back_to_first_profile() {
        let repo = create_repo();
        repo.create_profile(test_profile("Beta")).await.unwrap();
        let alpha = repo.create_profile(test_profile("Alpha")).await.unwrap();

        // No explicit default: first in list order wins.
        assert_eq!(repo.get_default().await.unwrap().id, alpha.id);
    }

    #[tokio::test]
    async fn test_get_default_creates_and_persists_fallback() {
        let repo = create_repo();

        let first = repo.get_default().await.unwrap();
        assert!(first.is_default);
        assert_eq!(first.name, "English");

        // The lazily created profile was persisted: same record again.
        let second = repo.get_default().await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(repo.list_profiles().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_ensure_default_profile_is_idempotent() {
        let repo = create_repo();

        let first = repo.ensure_default_profile().await.unwrap();
        let second = repo.ensure_default_profile().await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(repo.list_profiles().await.unwrap().len(), 1);
    }

    // =========================================================================
    // MEDIA ASSIGNMENT TESTS
    // =========================================================================

    #[tokio::test]
    async fn test_assign_media_upserts() {
        let repo = create_repo();
        let a = repo.create_profile(test_profile("A")).await.unwrap();
        let b = repo.create_profile(test_profile("B")).await.unwrap();

        repo.assign_media("movie-1", a.id).await.unwrap();
        repo.assign_media("movie-1", b.id).await.unwrap();

        let assignment = repo.get_media_assignment("movie-1").await.unwrap().unwrap();
        assert_eq!(assignment.profile_id, b.id);
    }

    #[tokio::test]
    async fn test_assign_media_requires_profile() {
        let repo = create_repo();
        let result = repo.assign_media("movie-1", Uuid::new_v4()).await;
        assert!(matches!(result, Err(RepositoryError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_get_media_profile_prefers_assignment() {
        let repo = create_repo();
        let assigned = repo.create_profile(test_profile("Assigned")).await.unwrap();
        let default = repo.create_profile(test_profile("Default")).await.unwrap();
        repo.set_default(default.id).await.unwrap();
        repo.assign_media("movie-1", assigned.id).await.unwrap();

        assert_eq!(repo.get_media_profile("movie-1").await.unwrap().id, assigned.id);
        assert_eq!(repo.get_media_profile("movie-2").await.unwrap().id, default.id);
    }

    #[tokio::test]
    async fn test_get_media_profile_empty_store_creates_fallback() {
        let repo = create_repo();

        let first = repo.get_media_profile("movie-1").await.unwrap();
        assert_eq!(first.name, "English");

        let second = repo.get_media_profile("movie-1").await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_unassign_media() {
        let repo = create_repo();
        let profile = repo.create_profile(test_profile("A")).await.unwrap();
        repo.assign_media("movie-1", profile.id).await.unwrap();

        repo.unassign_media("movie-1").await.unwrap();

        assert!(repo.get_media_assignment("movie-1").await.unwrap().is_none());
        // Absent assignment removal stays a no-op.
        repo.unassign_media("movie-1").await.unwrap();
    }

    // =========================================================================
    // CASCADE TESTS
    // =========================================================================

    #[tokio::test]
    async fn test_delete_profile_removes_its_assignments() {
        let repo = create_repo();
        let doomed = repo.create_profile(test_profile("Doomed")).await.unwrap();
        let spared = repo.create_profile(test_profile("Spared")).await.unwrap();

        repo.assign_media("movie-1", doomed.id).await.unwrap();
        repo.assign_media("movie-2", doomed.id).await.unwrap();
        repo.assign_media("movie-3", spared.id).await.unwrap();

        repo.delete_profile(doomed.id).await.unwrap();

        assert!(repo.get_profile(doomed.id).await.unwrap().is_none());
        assert!(repo.get_media_assignment("movie-1").await.unwrap().is_none());
        assert!(repo.get_media_assignment("movie-2").await.unwrap().is_none());
        assert_eq!(
            repo.get_media_assignment("movie-3").await.unwrap().unwrap().profile_id,
            spared.id
        );
    }

    #[tokio::test]
    async fn test_delete_missing_profile_fails() {
        let repo = create_repo();
        let result = repo.delete_profile(Uuid::new_v4()).await;
        assert!(matches!(result, Err(RepositoryError::NotFound(_))));
    }
}
