//! Subtitle source provenance
//!
//! Tracks where a subtitle came from and how well it performed, keyed by
//! the content hash of the subtitle file so re-discoveries deduplicate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Provenance and aggregate quality stats for one subtitle file.
///
/// Keyed by content hash: inserting the same hash again overwrites the
/// record in place rather than creating a duplicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleSource {
    /// Content hash of the subtitle file; the record's identity.
    pub content_hash: String,

    /// Provider the subtitle was downloaded from.
    pub provider: String,

    /// How many times this subtitle has been downloaded.
    pub download_count: u64,

    /// How many of those downloads were reported successful.
    pub success_count: u64,

    /// Average user rating, if anyone rated it.
    pub average_rating: Option<f64>,

    /// Last time this subtitle was seen at the provider.
    pub last_seen: DateTime<Utc>,
}

impl SubtitleSource {
    /// Create a fresh record with zeroed stats.
    pub fn new(content_hash: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            content_hash: content_hash.into(),
            provider: provider.into(),
            download_count: 0,
            success_count: 0,
            average_rating: None,
            last_seen: Utc::now(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_source_new_zeroes_stats() {
        let source = SubtitleSource::new("abc123", "opensubtitles");
        assert_eq!(source.download_count, 0);
        assert_eq!(source.success_count, 0);
        assert!(source.average_rating.is_none());
    }

    #[test]
    fn test_source_serialization() {
        let mut source = SubtitleSource::new("abc123", "opensubtitles");
        source.download_count = 10;
        source.average_rating = Some(4.5);
        let json = serde_json::to_string(&source).unwrap();
        let deserialized: SubtitleSource = serde_json::from_str(&json).unwrap();
        assert_eq!(source, deserialized);
    }
}
