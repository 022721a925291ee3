//! Tag types
//!
//! Tags label arbitrary entities (media items, providers, ...) and are
//! linked to them through association records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named label that can be attached to entities.
///
/// The name is unique across the store and resolves to the tag id through
/// a secondary index. Besides the random id, every tag carries a stable
/// `legacy_id` (a small monotonically increasing integer allocated at
/// creation) for callers that still address tags by number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Unique identifier for this tag.
    pub id: Uuid,

    /// Stable numeric identifier for legacy callers.
    pub legacy_id: u64,

    /// Unique display name.
    pub name: String,

    /// Free-form tag kind (e.g. "user", "system").
    pub kind: String,

    /// Entity type this tag is meant for, empty for unscoped tags.
    pub entity_scope: String,

    /// Display color, as the frontend understands it.
    pub color: String,

    /// Optional human description.
    pub description: String,

    /// When this tag was created.
    pub created_at: DateTime<Utc>,
}

/// A link between a tag and an entity.
///
/// The composite (tag_id, entity_type, entity_id) is the identity; there
/// is no independent association id. Deleting a tag removes every
/// association referencing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagAssociation {
    /// The tag being attached.
    pub tag_id: Uuid,

    /// Kind of entity being tagged (e.g. "media", "provider").
    pub entity_type: String,

    /// Identifier of the tagged entity within its type.
    pub entity_id: String,

    /// When this association was created.
    pub created_at: DateTime<Utc>,
}

impl TagAssociation {
    /// Create an association stamped with the current time.
    pub fn new(tag_id: Uuid, entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            tag_id,
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    fn test_tag(name: &str) -> Tag {
        Tag {
            id: Uuid::new_v4(),
            legacy_id: 1,
            name: name.to_string(),
            kind: "user".to_string(),
            entity_scope: String::new(),
            color: "#ff0000".to_string(),
            description: String::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_tag_serialization() {
        let tag = test_tag("anime");
        let json = serde_json::to_string(&tag).unwrap();
        let deserialized: Tag = serde_json::from_str(&json).unwrap();
        assert_eq!(tag, deserialized);
    }

    #[test]
    fn test_association_identity_fields() {
        let tag = test_tag("anime");
        let assoc = TagAssociation::new(tag.id, "media", "series-42");
        assert_eq!(assoc.tag_id, tag.id);
        assert_eq!(assoc.entity_type, "media");
        assert_eq!(assoc.entity_id, "series-42");
    }
}
