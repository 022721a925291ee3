//! Repository for subtitle source provenance records.
//!
//! This module provides [`SourceRepository`] which tracks where subtitles
//! came from and how they performed, keyed by content hash for
//! deduplication, using a generic [`StorageBackend`].
//!
//! # Key Schema
//!
//! - `subtitle_source:{content_hash}` → JSON-serialized `SubtitleSource`
//! - `subtitle_provider:{provider}:{content_hash}` → content hash bytes
//!
//! The provider index makes "everything we got from provider X" a bounded
//! range scan. A re-upsert that moves a hash to a different provider
//! relocates the index entry in the same atomic batch.

use chrono::{DateTime, Utc};
use tracing::warn;

use subarr_storage::StorageBackend;
use subarr_types::SubtitleSource;

use crate::{
    error::{RepositoryError, RepositoryResult},
    keys,
    record::{read_record, to_json},
};

/// Repository for subtitle source operations.
///
/// The stats update is a read-modify-write; it serializes behind the
/// family write lock so concurrent updaters cannot lose counts.
pub struct SourceRepository<S: StorageBackend> {
    storage: S,
    write_lock: tokio::sync::Mutex<()>,
}

impl<S: StorageBackend> SourceRepository<S> {
    /// Create a new source repository with the given storage backend.
    pub fn new(storage: S) -> Self {
        Self { storage, write_lock: tokio::sync::Mutex::new(()) }
    }

    /// Insert or overwrite a record, keyed by its content hash.
    ///
    /// Re-upserting an existing hash replaces the record in place; if the
    /// provider changed, the provider index entry moves in the same
    /// atomic batch.
    pub async fn upsert(&self, source: SubtitleSource) -> RepositoryResult<SubtitleSource> {
        let _guard = self.write_lock.lock().await;

        let existing =
            read_record::<_, SubtitleSource>(&self.storage, &keys::source::by_hash(&source.content_hash))
                .await?;

        let mut txn = self.storage.transaction().await?;
        if let Some(existing) = existing
            && existing.provider != source.provider
        {
            txn.delete(keys::source::provider_index(&existing.provider, &existing.content_hash));
        }
        txn.set(keys::source::by_hash(&source.content_hash), to_json(&source)?);
        txn.set(
            keys::source::provider_index(&source.provider, &source.content_hash),
            source.content_hash.clone().into_bytes(),
        );
        txn.commit().await?;

        Ok(source)
    }

    /// Get a record by content hash. Returns `None` if it does not exist.
    pub async fn get(&self, content_hash: &str) -> RepositoryResult<Option<SubtitleSource>> {
        read_record(&self.storage, &keys::source::by_hash(content_hash)).await
    }

    /// Fold new activity into a record's aggregate stats: bump the
    /// download and success counters, replace the rating when one is
    /// given, refresh `last_seen`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no record exists for the hash.
    pub async fn update_stats(
        &self,
        content_hash: &str,
        downloads: u64,
        successes: u64,
        rating: Option<f64>,
    ) -> RepositoryResult<SubtitleSource> {
        let _guard = self.write_lock.lock().await;

        let mut source = self
            .get(content_hash)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("subtitle source {content_hash}")))?;

        source.download_count += downloads;
        source.success_count += successes;
        if rating.is_some() {
            source.average_rating = rating;
        }
        source.last_seen = Utc::now();

        let data = to_json(&source)?;
        self.storage.set(keys::source::by_hash(content_hash), data).await?;

        Ok(source)
    }

    /// List records discovered at `provider`, in content-hash order, up
    /// to `limit` when one is given. A bounded scan of the provider's
    /// index range; dangling index entries are skipped with a warning.
    pub async fn list_by_provider(
        &self,
        provider: &str,
        limit: Option<usize>,
    ) -> RepositoryResult<Vec<SubtitleSource>> {
        let (start, end) = keys::source::provider_scan_range(provider);
        let entries = self.storage.get_range(start..end).await?;

        let mut sources = Vec::new();
        for kv in entries {
            let Ok(hash) = std::str::from_utf8(&kv.value) else {
                warn!(key = %String::from_utf8_lossy(&kv.key), "skipping malformed provider index entry");
                continue;
            };
            match self.get(hash).await? {
                Some(source) => {
                    sources.push(source);
                    if let Some(max) = limit
                        && sources.len() >= max
                    {
                        break;
                    }
                },
                None => {
                    warn!(hash, "skipping dangling provider index entry");
                },
            }
        }
        Ok(sources)
    }

    /// Remove a record and its provider index entry.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no record exists for the hash.
    pub async fn delete(&self, content_hash: &str) -> RepositoryResult<()> {
        let _guard = self.write_lock.lock().await;

        let source = self
            .get(content_hash)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("subtitle source {content_hash}")))?;

        let mut txn = self.storage.transaction().await?;
        txn.delete(keys::source::by_hash(content_hash));
        txn.delete(keys::source::provider_index(&source.provider, content_hash));
        txn.commit().await?;

        Ok(())
    }

    /// Last-seen timestamp for a record, if it exists. Convenience for
    /// re-check schedulers.
    pub async fn last_seen(&self, content_hash: &str) -> RepositoryResult<Option<DateTime<Utc>>> {
        Ok(self.get(content_hash).await?.map(|s| s.last_seen))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use subarr_storage::MemoryBackend;

    use super::*;

    fn create_repo() -> SourceRepository<MemoryBackend> {
        SourceRepository::new(MemoryBackend::new())
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let repo = create_repo();
        let source = SubtitleSource::new("hash-1", "opensubtitles");

        repo.upsert(source.clone()).await.unwrap();

        assert_eq!(repo.get("hash-1").await.unwrap().unwrap(), source);
        assert!(repo.get("hash-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_same_hash_overwrites() {
        let repo = create_repo();
        repo.upsert(SubtitleSource::new("hash-1", "opensubtitles")).await.unwrap();

        let mut replacement = SubtitleSource::new("hash-1", "opensubtitles");
        replacement.download_count = 7;
        repo.upsert(replacement).await.unwrap();

        let stored = repo.get("hash-1").await.unwrap().unwrap();
        assert_eq!(stored.download_count, 7);
        assert_eq!(repo.list_by_provider("opensubtitles", None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_relocates_provider_index() {
        let repo = create_repo();
        repo.upsert(SubtitleSource::new("hash-1", "opensubtitles")).await.unwrap();
        repo.upsert(SubtitleSource::new("hash-1", "subscene")).await.unwrap();

        assert!(repo.list_by_provider("opensubtitles", None).await.unwrap().is_empty());
        let moved = repo.list_by_provider("subscene", None).await.unwrap();
        assert_eq!(moved.len(), 1);
        assert_eq!(moved[0].content_hash, "hash-1");
    }

    #[tokio::test]
    async fn test_update_stats_accumulates() {
        let repo = create_repo();
        let original = repo.upsert(SubtitleSource::new("hash-1", "opensubtitles")).await.unwrap();

        repo.update_stats("hash-1", 3, 2, None).await.unwrap();
        let updated = repo.update_stats("hash-1", 1, 1, Some(4.5)).await.unwrap();

        assert_eq!(updated.download_count, 4);
        assert_eq!(updated.success_count, 3);
        assert_eq!(updated.average_rating, Some(4.5));
        assert!(updated.last_seen >= original.last_seen);

        let stored = repo.get("hash-1").await.unwrap().unwrap();
        assert_eq!(stored, updated);
    }

    #[tokio::test]
    async fn test_update_stats_keeps_rating_when_absent() {
        let repo = create_repo();
        repo.upsert(SubtitleSource::new("hash-1", "opensubtitles")).await.unwrap();

        repo.update_stats("hash-1", 0, 0, Some(3.0)).await.unwrap();
        let updated = repo.update_stats("hash-1", 1, 0, None).await.unwrap();

        assert_eq!(updated.average_rating, Some(3.0));
    }

    #[tokio::test]
    async fn test_update_stats_missing_hash_fails() {
        let repo = create_repo();
        let result = repo.update_stats("ghost", 1, 0, None).await;
        assert!(matches!(result, Err(RepositoryError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_by_provider_bounded_and_limited() {
        let repo = create_repo();
        for i in 0..5 {
            repo.upsert(SubtitleSource::new(format!("os-{i}"), "opensubtitles")).await.unwrap();
        }
        repo.upsert(SubtitleSource::new("other-1", "subscene")).await.unwrap();

        let all = repo.list_by_provider("opensubtitles", None).await.unwrap();
        assert_eq!(all.len(), 5);
        assert!(all.iter().all(|s| s.provider == "opensubtitles"));

        let limited = repo.list_by_provider("opensubtitles", Some(2)).await.unwrap();
        assert_eq!(limited.len(), 2);

        assert!(repo.list_by_provider("ghost", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_removes_record_and_index() {
        let repo = create_repo();
        repo.upsert(SubtitleSource::new("hash-1", "opensubtitles")).await.unwrap();

        repo.delete("hash-1").await.unwrap();

        assert!(repo.get("hash-1").await.unwrap().is_none());
        assert!(repo.list_by_provider("opensubtitles", None).await.unwrap().is_empty());
        assert!(matches!(repo.delete("hash-1").await, Err(RepositoryError::NotFound(_))));
    }
}
