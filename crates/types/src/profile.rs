//! Language profile types
//!
//! A language profile describes which subtitle languages a media item
//! wants, in priority order, and when a download is considered good
//! enough. Media items pick up a profile through an assignment record or
//! fall back to the store-wide default.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One language entry inside a profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileItem {
    /// BCP-47-ish language code (e.g. "en", "pt-BR").
    pub language: String,

    /// Priority within the profile; lower wins.
    pub priority: u32,

    /// Only accept forced subtitles.
    pub forced: bool,

    /// Only accept hearing-impaired subtitles.
    pub hearing_impaired: bool,
}

/// An ordered set of wanted languages with a score cutoff.
///
/// At most one profile holds `is_default = true` at any time; switching
/// the default clears the flag on every other profile in the same atomic
/// operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageProfile {
    /// Unique identifier for this profile.
    pub id: Uuid,

    /// Display name.
    pub name: String,

    /// Wanted languages, kept in the order they were configured.
    pub items: Vec<ProfileItem>,

    /// Minimum match score for a subtitle to be accepted.
    pub cutoff_score: u32,

    /// Whether this is the store-wide default profile.
    pub is_default: bool,

    /// When this profile was created.
    pub created_at: DateTime<Utc>,

    /// When this profile was last updated.
    pub updated_at: DateTime<Utc>,
}

impl LanguageProfile {
    /// Create a new profile with a fresh random id.
    pub fn new(name: impl Into<String>, items: Vec<ProfileItem>, cutoff_score: u32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            items,
            cutoff_score,
            is_default: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// The profile persisted when the store has no profiles at all:
    /// plain English, cutoff 75, marked default.
    pub fn english_fallback() -> Self {
        let mut profile = Self::new(
            "English",
            vec![ProfileItem {
                language: "en".to_string(),
                priority: 1,
                forced: false,
                hearing_impaired: false,
            }],
            75,
        );
        profile.is_default = true;
        profile
    }
}

/// Links a media item to the profile it should use.
///
/// One assignment per media id; re-assigning overwrites.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaProfileAssignment {
    /// The media item being assigned.
    pub media_id: String,

    /// The profile the media item uses.
    pub profile_id: Uuid,

    /// When this assignment was created.
    pub created_at: DateTime<Utc>,
}

impl MediaProfileAssignment {
    /// Create an assignment stamped with the current time.
    pub fn new(media_id: impl Into<String>, profile_id: Uuid) -> Self {
        Self { media_id: media_id.into(), profile_id, created_at: Utc::now() }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_new_is_not_default() {
        let profile = LanguageProfile::new("Nordic", vec![], 80);
        assert!(!profile.is_default);
        assert_eq!(profile.created_at, profile.updated_at);
    }

    #[test]
    fn test_english_fallback_shape() {
        let fallback = LanguageProfile::english_fallback();
        assert!(fallback.is_default);
        assert_eq!(fallback.name, "English");
        assert_eq!(fallback.cutoff_score, 75);
        assert_eq!(fallback.items.len(), 1);
        assert_eq!(fallback.items[0].language, "en");
        assert!(!fallback.items[0].forced);
    }

    #[test]
    fn test_profile_serialization() {
        let profile = LanguageProfile::new(
            "Dual",
            vec![
                ProfileItem {
                    language: "en".into(),
                    priority: 1,
                    forced: false,
                    hearing_impaired: false,
                },
                ProfileItem {
                    language: "ja".into(),
                    priority: 2,
                    forced: true,
                    hearing_impaired: false,
                },
            ],
            90,
        );
        let json = serde_json::to_string(&profile).unwrap();
        let deserialized: LanguageProfile = serde_json::from_str(&json).unwrap();
        assert_eq!(profile, deserialized);
    }

    #[test]
    fn test_assignment_serialization() {
        let assignment = MediaProfileAssignment::new("movie-7", Uuid::new_v4());
        let json = serde_json::to_string(&assignment).unwrap();
        let deserialized: MediaProfileAssignment = serde_json::from_str(&json).unwrap();
        assert_eq!(assignment, deserialized);
    }
}
