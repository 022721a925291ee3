//! Repository for tags and their entity associations.
//!
//! This module provides [`TagRepository`] which handles tag CRUD, the
//! tag/entity association records and the legacy numeric-id shim using a
//! generic [`StorageBackend`].
//!
//! # Key Schema
//!
//! - `tag:{id}` → JSON-serialized `Tag`
//! - `tag_name:{name}` → tag id bytes
//! - `tag_legacy:{legacy_id:020}` → tag id bytes
//! - `tag_seq` → last allocated legacy id (u64 little-endian)
//! - `tag_assoc:{tag_id}:{entity_type}:{entity_id}` → JSON-serialized `TagAssociation`
//! - `tag_entity:{entity_type}:{entity_id}:{tag_id}` → tag id bytes
//!
//! Associations are written twice, once per scan direction: the
//! `tag_assoc:` side makes "everything this tag is attached to" a bounded
//! range scan (which is what the cascading delete walks), the
//! `tag_entity:` side makes "every tag on this entity" one. Both entries
//! are written and removed in the same atomic batch.
//!
//! # Legacy ids
//!
//! Callers that still address tags by small integers get a stable,
//! persisted `legacy_id` allocated from the `tag_seq` counter at creation
//! time. The number never changes for the lifetime of the tag, no matter
//! how tags are renamed, inserted or deleted around it.

use tracing::{debug, warn};
use uuid::Uuid;

use subarr_storage::StorageBackend;
use subarr_types::{Tag, TagAssociation};

use crate::{
    error::{RepositoryError, RepositoryResult},
    keys,
    record::{id_bytes, parse_id_bytes, read_id_index, read_record, to_json},
};

/// Repository for tag and tag-association operations.
///
/// Mutations that read before writing (creation with its uniqueness check
/// and counter bump, rename, delete-with-cascade) serialize behind a
/// per-family write lock.
pub struct TagRepository<S: StorageBackend> {
    storage: S,
    write_lock: tokio::sync::Mutex<()>,
}

impl<S: StorageBackend> TagRepository<S> {
    /// Create a new tag repository with the given storage backend.
    pub fn new(storage: S) -> Self {
        Self { storage, write_lock: tokio::sync::Mutex::new(()) }
    }

    // =========================================================================
    // Tags
    // =========================================================================

    /// Create a tag with a unique name. A fresh `legacy_id` is allocated
    /// from the persistent counter in the same atomic batch that writes
    /// the tag.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if the name is taken.
    pub async fn create_tag(
        &self,
        name: &str,
        kind: &str,
        entity_scope: &str,
        color: &str,
        description: &str,
    ) -> RepositoryResult<Tag> {
        let _guard = self.write_lock.lock().await;

        if self.storage.get(&keys::tag::by_name(name)).await?.is_some() {
            return Err(RepositoryError::AlreadyExists(format!("tag name {name:?}")));
        }

        let legacy_id = self.current_sequence().await? + 1;
        let tag = Tag {
            id: Uuid::new_v4(),
            legacy_id,
            name: name.to_string(),
            kind: kind.to_string(),
            entity_scope: entity_scope.to_string(),
            color: color.to_string(),
            description: description.to_string(),
            created_at: chrono::Utc::now(),
        };
        let data = to_json(&tag)?;

        let mut txn = self.storage.transaction().await?;
        txn.set(keys::tag::seq_counter(), legacy_id.to_le_bytes().to_vec());
        txn.set(keys::tag::by_id(tag.id), data);
        txn.set(keys::tag::by_name(name), id_bytes(tag.id));
        txn.set(keys::tag::by_legacy_id(legacy_id), id_bytes(tag.id));
        txn.commit().await?;

        Ok(tag)
    }

    /// Get a tag by id. Returns `None` if it does not exist.
    pub async fn get_tag(&self, id: Uuid) -> RepositoryResult<Option<Tag>> {
        read_record(&self.storage, &keys::tag::by_id(id)).await
    }

    /// Get a tag through the name index.
    pub async fn get_tag_by_name(&self, name: &str) -> RepositoryResult<Option<Tag>> {
        match read_id_index(&self.storage, &keys::tag::by_name(name)).await? {
            Some(id) => self.get_tag(id).await,
            None => Ok(None),
        }
    }

    /// Get a tag through the stable numeric id index.
    pub async fn get_tag_by_legacy_id(&self, legacy_id: u64) -> RepositoryResult<Option<Tag>> {
        match read_id_index(&self.storage, &keys::tag::by_legacy_id(legacy_id)).await? {
            Some(id) => self.get_tag(id).await,
            None => Ok(None),
        }
    }

    /// List all tags, sorted by name.
    ///
    /// Walks the name index, which the engine already keeps in name
    /// order; dangling index entries are skipped with a warning.
    pub async fn list_tags(&self) -> RepositoryResult<Vec<Tag>> {
        let (start, end) = keys::tag::name_scan_range();
        let entries = self.storage.get_range(start..end).await?;

        let mut tags = Vec::with_capacity(entries.len());
        for kv in entries {
            let Ok(id) = parse_id_bytes(&kv.value) else {
                warn!(key = %String::from_utf8_lossy(&kv.key), "skipping malformed tag name index entry");
                continue;
            };
            match self.get_tag(id).await? {
                Some(tag) => tags.push(tag),
                None => {
                    warn!(tag = %id, "skipping dangling tag name index entry");
                },
            }
        }

        Ok(tags)
    }

    /// Rename a tag, moving its name index entry atomically.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the tag does not exist and `AlreadyExists`
    /// if another tag holds the new name.
    pub async fn rename_tag(&self, id: Uuid, new_name: &str) -> RepositoryResult<Tag> {
        let _guard = self.write_lock.lock().await;

        let mut tag = self
            .get_tag(id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("tag {id}")))?;

        if tag.name == new_name {
            return Ok(tag);
        }
        if self.storage.get(&keys::tag::by_name(new_name)).await?.is_some() {
            return Err(RepositoryError::AlreadyExists(format!("tag name {new_name:?}")));
        }

        let old_name = std::mem::replace(&mut tag.name, new_name.to_string());
        let data = to_json(&tag)?;

        let mut txn = self.storage.transaction().await?;
        txn.delete(keys::tag::by_name(&old_name));
        txn.set(keys::tag::by_name(new_name), id_bytes(id));
        txn.set(keys::tag::by_id(id), data);
        txn.commit().await?;

        Ok(tag)
    }

    /// Update a tag's display fields.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the tag does not exist.
    pub async fn update_tag_details(
        &self,
        id: Uuid,
        color: &str,
        description: &str,
    ) -> RepositoryResult<Tag> {
        let _guard = self.write_lock.lock().await;

        let mut tag = self
            .get_tag(id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("tag {id}")))?;
        tag.color = color.to_string();
        tag.description = description.to_string();

        let data = to_json(&tag)?;
        self.storage.set(keys::tag::by_id(id), data).await?;

        Ok(tag)
    }

    /// Delete a tag and every association referencing it, as a single
    /// atomic batch. No orphaned association survives.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the tag does not exist.
    pub async fn delete_tag(&self, id: Uuid) -> RepositoryResult<()> {
        let _guard = self.write_lock.lock().await;

        let tag = self
            .get_tag(id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("tag {id}")))?;

        let mut txn = self.storage.transaction().await?;
        txn.delete(keys::tag::by_id(id));
        txn.delete(keys::tag::by_name(&tag.name));
        txn.delete(keys::tag::by_legacy_id(tag.legacy_id));

        let (start, end) = keys::tag::assoc_scan_range(id);
        let assoc_prefix_len = start.len();
        let mut cascaded = 0usize;
        for kv in self.storage.get_range(start..end).await? {
            // The entity mirror key is derived from the association key
            // itself, so a corrupt value cannot orphan the mirror.
            match entity_from_assoc_key(&kv.key, assoc_prefix_len) {
                Some((entity_type, entity_id)) => {
                    txn.delete(keys::tag::entity_index(entity_type, entity_id, id));
                },
                None => {
                    warn!(key = %String::from_utf8_lossy(&kv.key), "association key has no entity part");
                },
            }
            txn.delete(kv.key);
            cascaded += 1;
        }

        debug!(tag = %id, cascaded, "deleting tag cascade");
        txn.commit().await?;

        Ok(())
    }

    /// Rename a tag addressed by its stable numeric id.
    pub async fn rename_tag_by_legacy_id(
        &self,
        legacy_id: u64,
        new_name: &str,
    ) -> RepositoryResult<Tag> {
        let id = self
            .resolve_legacy_id(legacy_id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("tag legacy id {legacy_id}")))?;
        self.rename_tag(id, new_name).await
    }

    /// Delete a tag addressed by its stable numeric id.
    pub async fn delete_tag_by_legacy_id(&self, legacy_id: u64) -> RepositoryResult<()> {
        let id = self
            .resolve_legacy_id(legacy_id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("tag legacy id {legacy_id}")))?;
        self.delete_tag(id).await
    }

    /// Resolve a stable numeric id to the tag's primary id.
    pub async fn resolve_legacy_id(&self, legacy_id: u64) -> RepositoryResult<Option<Uuid>> {
        read_id_index(&self.storage, &keys::tag::by_legacy_id(legacy_id)).await
    }

    // =========================================================================
    // Associations
    // =========================================================================

    /// Attach a tag to an entity. Attaching twice overwrites the existing
    /// association.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the tag does not exist.
    pub async fn assign_tag(
        &self,
        tag_id: Uuid,
        entity_type: &str,
        entity_id: &str,
    ) -> RepositoryResult<TagAssociation> {
        if self.get_tag(tag_id).await?.is_none() {
            return Err(RepositoryError::NotFound(format!("tag {tag_id}")));
        }

        let assoc = TagAssociation::new(tag_id, entity_type, entity_id);
        let data = to_json(&assoc)?;

        let mut txn = self.storage.transaction().await?;
        txn.set(keys::tag::assoc(tag_id, entity_type, entity_id), data);
        txn.set(keys::tag::entity_index(entity_type, entity_id, tag_id), id_bytes(tag_id));
        txn.commit().await?;

        Ok(assoc)
    }

    /// Detach a tag from an entity. Absent associations are a no-op.
    pub async fn unassign_tag(
        &self,
        tag_id: Uuid,
        entity_type: &str,
        entity_id: &str,
    ) -> RepositoryResult<()> {
        let mut txn = self.storage.transaction().await?;
        txn.delete(keys::tag::assoc(tag_id, entity_type, entity_id));
        txn.delete(keys::tag::entity_index(entity_type, entity_id, tag_id));
        txn.commit().await?;
        Ok(())
    }

    /// List the tags attached to an entity, sorted by name.
    ///
    /// Best-effort: malformed or dangling index entries are skipped with
    /// a warning so one bad record cannot hide the rest.
    pub async fn list_tags_for_entity(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> RepositoryResult<Vec<Tag>> {
        let (start, end) = keys::tag::entity_scan_range(entity_type, entity_id);
        let entries = self.storage.get_range(start..end).await?;

        let mut tags = Vec::with_capacity(entries.len());
        for kv in entries {
            let Ok(id) = parse_id_bytes(&kv.value) else {
                warn!(key = %String::from_utf8_lossy(&kv.key), "skipping malformed tag entity index entry");
                continue;
            };
            match self.storage.get(&keys::tag::by_id(id)).await? {
                Some(data) => match serde_json::from_slice::<Tag>(&data) {
                    Ok(tag) => tags.push(tag),
                    Err(_) => {
                        warn!(tag = %id, "skipping malformed tag record");
                    },
                },
                None => {
                    warn!(tag = %id, "skipping dangling tag entity index entry");
                },
            }
        }
        tags.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(tags)
    }

    /// List every association held by a tag.
    pub async fn list_associations_for_tag(
        &self,
        tag_id: Uuid,
    ) -> RepositoryResult<Vec<TagAssociation>> {
        let (start, end) = keys::tag::assoc_scan_range(tag_id);
        let entries = self.storage.get_range(start..end).await?;

        let mut associations = Vec::with_capacity(entries.len());
        for kv in entries {
            match serde_json::from_slice::<TagAssociation>(&kv.value) {
                Ok(assoc) => associations.push(assoc),
                Err(_) => {
                    warn!(key = %String::from_utf8_lossy(&kv.key), "skipping malformed association record");
                },
            }
        }
        Ok(associations)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Read the last allocated legacy id, or zero if none was ever
    /// allocated.
    async fn current_sequence(&self) -> RepositoryResult<u64> {
        match self.storage.get(&keys::tag::seq_counter()).await? {
            Some(bytes) => {
                let Ok(arr): Result<[u8; 8], _> = bytes[..].try_into() else {
                    return Err(RepositoryError::Serialization(
                        "tag sequence counter is not 8 bytes".to_string(),
                    ));
                };
                Ok(u64::from_le_bytes(arr))
            },
            None => Ok(0),
        }
    }
}

/// Split the `{entity_type}:{entity_id}` remainder of an association key.
fn entity_from_assoc_key(key: &[u8], prefix_len: usize) -> Option<(&str, &str)> {
    let remainder = std::str::from_utf8(key.get(prefix_len..)?).ok()?;
    remainder.split_once(':')
}
