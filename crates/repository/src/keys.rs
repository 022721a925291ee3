//! Key encoding for the subarr domain store.
//!
//! This module provides pure functions for encoding storage keys
//! following a consistent flat key schema, one namespace per logical
//! table:
//!
//! - `user:{id}` - Account by id
//! - `user_username:{name}` - Username index
//! - `user_email:{email}` - Email index
//! - `session:{id}` - Session by id
//! - `session_token:{token}` - Session token index
//! - `session_user:{account_id}:{session_id}` - Sessions-by-account index
//! - `api_key:{id}` - API key record
//! - `api_key_value:{key}` - API key value index (points at the account)
//! - `login_token:{id}` - One-time token by id
//! - `login_token_value:{token}` - One-time token value index
//! - `permission:{id}` - Role permission grant
//! - `dashboard:{account_id}` - Dashboard preference
//! - `tag:{id}` - Tag by id
//! - `tag_name:{name}` - Tag name index
//! - `tag_legacy:{legacy_id:020}` - Stable numeric tag id index
//! - `tag_seq` - Legacy id allocation counter
//! - `tag_assoc:{tag_id}:{entity_type}:{entity_id}` - Association record
//! - `tag_entity:{entity_type}:{entity_id}:{tag_id}` - Tags-for-entity index
//! - `language_profile:{id}` - Language profile by id
//! - `media_profile:{media_id}` - Media profile assignment
//! - `subtitle_source:{content_hash}` - Subtitle source by hash
//! - `subtitle_provider:{provider}:{content_hash}` - Sources-by-provider index
//!
//! Every list operation scans one namespace as a bounded range
//! `[prefix, end)`, where `end` is the prefix with its final byte
//! incremented. Because the prefixes end in `:` (0x3A) and the end bound
//! is therefore `;` (0x3B), a scan of `user:` can never observe
//! `user_username:` or `user_email:` keys (`_` is 0x5F), and the same
//! holds for every `foo:` / `foo_bar:` namespace pair.

use uuid::Uuid;

/// Compute the exclusive upper bound for scanning every key that starts
/// with `prefix`: the prefix with its final byte incremented.
fn scan_end(prefix: &[u8]) -> Vec<u8> {
    let mut end = prefix.to_vec();
    if let Some(last) = end.last_mut() {
        *last += 1;
    }
    end
}

/// Key builders for Account records and their unique indexes.
pub mod account {
    use super::{Uuid, scan_end};

    /// Schema: `user:{id}`
    #[inline]
    pub fn by_id(id: Uuid) -> Vec<u8> {
        format!("user:{id}").into_bytes()
    }

    /// Schema: `user_username:{name}`
    #[inline]
    pub fn by_username(username: &str) -> Vec<u8> {
        format!("user_username:{username}").into_bytes()
    }

    /// Schema: `user_email:{email}`
    #[inline]
    pub fn by_email(email: &str) -> Vec<u8> {
        format!("user_email:{email}").into_bytes()
    }

    /// Bounded range covering every account record.
    #[inline]
    pub fn scan_range() -> (Vec<u8>, Vec<u8>) {
        let prefix = b"user:".to_vec();
        let end = scan_end(&prefix);
        (prefix, end)
    }
}

/// Key builders for Session records and their indexes.
pub mod session {
    use super::{Uuid, scan_end};

    /// Schema: `session:{id}`
    #[inline]
    pub fn by_id(id: Uuid) -> Vec<u8> {
        format!("session:{id}").into_bytes()
    }

    /// Schema: `session_token:{token}`
    #[inline]
    pub fn by_token(token: &str) -> Vec<u8> {
        format!("session_token:{token}").into_bytes()
    }

    /// Schema: `session_user:{account_id}:{session_id}`
    #[inline]
    pub fn user_index(account_id: Uuid, session_id: Uuid) -> Vec<u8> {
        format!("session_user:{account_id}:{session_id}").into_bytes()
    }

    /// Bounded range covering one account's session index entries.
    #[inline]
    pub fn user_scan_range(account_id: Uuid) -> (Vec<u8>, Vec<u8>) {
        let prefix = format!("session_user:{account_id}:").into_bytes();
        let end = scan_end(&prefix);
        (prefix, end)
    }

    /// Bounded range covering every session record.
    #[inline]
    pub fn scan_range() -> (Vec<u8>, Vec<u8>) {
        let prefix = b"session:".to_vec();
        let end = scan_end(&prefix);
        (prefix, end)
    }
}

/// Key builders for API key records and the value index.
pub mod api_key {
    use super::{Uuid, scan_end};

    /// Schema: `api_key:{id}`
    #[inline]
    pub fn by_id(id: Uuid) -> Vec<u8> {
        format!("api_key:{id}").into_bytes()
    }

    /// Schema: `api_key_value:{key}`
    ///
    /// The stored value is the owning account id, so key validation is a
    /// single point read.
    #[inline]
    pub fn by_value(key: &str) -> Vec<u8> {
        format!("api_key_value:{key}").into_bytes()
    }

    /// Bounded range covering every API key record.
    #[inline]
    pub fn scan_range() -> (Vec<u8>, Vec<u8>) {
        let prefix = b"api_key:".to_vec();
        let end = scan_end(&prefix);
        (prefix, end)
    }
}

/// Key builders for one-time login tokens.
pub mod login_token {
    use super::{Uuid, scan_end};

    /// Schema: `login_token:{id}`
    #[inline]
    pub fn by_id(id: Uuid) -> Vec<u8> {
        format!("login_token:{id}").into_bytes()
    }

    /// Schema: `login_token_value:{token}`
    #[inline]
    pub fn by_value(token: &str) -> Vec<u8> {
        format!("login_token_value:{token}").into_bytes()
    }

    /// Bounded range covering every one-time token record.
    #[inline]
    pub fn scan_range() -> (Vec<u8>, Vec<u8>) {
        let prefix = b"login_token:".to_vec();
        let end = scan_end(&prefix);
        (prefix, end)
    }
}

/// Key builders for permission grants.
pub mod permission {
    use super::{Uuid, scan_end};

    /// Schema: `permission:{id}`
    #[inline]
    pub fn by_id(id: Uuid) -> Vec<u8> {
        format!("permission:{id}").into_bytes()
    }

    /// Bounded range covering every permission grant.
    #[inline]
    pub fn scan_range() -> (Vec<u8>, Vec<u8>) {
        let prefix = b"permission:".to_vec();
        let end = scan_end(&prefix);
        (prefix, end)
    }
}

/// Key builder for dashboard preferences.
pub mod dashboard {
    use super::Uuid;

    /// Schema: `dashboard:{account_id}`
    #[inline]
    pub fn by_account(account_id: Uuid) -> Vec<u8> {
        format!("dashboard:{account_id}").into_bytes()
    }
}

/// Key builders for Tag records, indexes and associations.
pub mod tag {
    use super::{Uuid, scan_end};

    /// Schema: `tag:{id}`
    #[inline]
    pub fn by_id(id: Uuid) -> Vec<u8> {
        format!("tag:{id}").into_bytes()
    }

    /// Schema: `tag_name:{name}`
    #[inline]
    pub fn by_name(name: &str) -> Vec<u8> {
        format!("tag_name:{name}").into_bytes()
    }

    /// Schema: `tag_legacy:{legacy_id:020}`
    ///
    /// Zero-padded so lexicographic key order matches numeric order.
    #[inline]
    pub fn by_legacy_id(legacy_id: u64) -> Vec<u8> {
        format!("tag_legacy:{legacy_id:020}").into_bytes()
    }

    /// Schema: `tag_seq` - the legacy id allocation counter.
    #[inline]
    pub fn seq_counter() -> Vec<u8> {
        b"tag_seq".to_vec()
    }

    /// Schema: `tag_assoc:{tag_id}:{entity_type}:{entity_id}`
    #[inline]
    pub fn assoc(tag_id: Uuid, entity_type: &str, entity_id: &str) -> Vec<u8> {
        format!("tag_assoc:{tag_id}:{entity_type}:{entity_id}").into_bytes()
    }

    /// Schema: `tag_entity:{entity_type}:{entity_id}:{tag_id}`
    #[inline]
    pub fn entity_index(entity_type: &str, entity_id: &str, tag_id: Uuid) -> Vec<u8> {
        format!("tag_entity:{entity_type}:{entity_id}:{tag_id}").into_bytes()
    }

    /// Bounded range covering one tag's association records.
    #[inline]
    pub fn assoc_scan_range(tag_id: Uuid) -> (Vec<u8>, Vec<u8>) {
        let prefix = format!("tag_assoc:{tag_id}:").into_bytes();
        let end = scan_end(&prefix);
        (prefix, end)
    }

    /// Bounded range covering one entity's tag index entries.
    #[inline]
    pub fn entity_scan_range(entity_type: &str, entity_id: &str) -> (Vec<u8>, Vec<u8>) {
        let prefix = format!("tag_entity:{entity_type}:{entity_id}:").into_bytes();
        let end = scan_end(&prefix);
        (prefix, end)
    }

    /// Bounded range covering the tag name index, which iterates tags in
    /// name order.
    #[inline]
    pub fn name_scan_range() -> (Vec<u8>, Vec<u8>) {
        let prefix = b"tag_name:".to_vec();
        let end = scan_end(&prefix);
        (prefix, end)
    }

    /// Bounded range covering every tag record.
    #[inline]
    pub fn scan_range() -> (Vec<u8>, Vec<u8>) {
        let prefix = b"tag:".to_vec();
        let end = scan_end(&prefix);
        (prefix, end)
    }
}

/// Key builders for language profiles and media assignments.
pub mod profile {
    use super::{Uuid, scan_end};

    /// Schema: `language_profile:{id}`
    #[inline]
    pub fn by_id(id: Uuid) -> Vec<u8> {
        format!("language_profile:{id}").into_bytes()
    }

    /// Schema: `media_profile:{media_id}`
    #[inline]
    pub fn media(media_id: &str) -> Vec<u8> {
        format!("media_profile:{media_id}").into_bytes()
    }

    /// Bounded range covering every language profile record.
    #[inline]
    pub fn scan_range() -> (Vec<u8>, Vec<u8>) {
        let prefix = b"language_profile:".to_vec();
        let end = scan_end(&prefix);
        (prefix, end)
    }

    /// Bounded range covering every media profile assignment.
    #[inline]
    pub fn media_scan_range() -> (Vec<u8>, Vec<u8>) {
        let prefix = b"media_profile:".to_vec();
        let end = scan_end(&prefix);
        (prefix, end)
    }
}

/// Key builders for subtitle source records and the provider index.
pub mod source {
    use super::scan_end;

    /// Schema: `subtitle_source:{content_hash}`
    #[inline]
    pub fn by_hash(content_hash: &str) -> Vec<u8> {
        format!("subtitle_source:{content_hash}").into_bytes()
    }

    /// Schema: `subtitle_provider:{provider}:{content_hash}`
    #[inline]
    pub fn provider_index(provider: &str, content_hash: &str) -> Vec<u8> {
        format!("subtitle_provider:{provider}:{content_hash}").into_bytes()
    }

    /// Bounded range covering one provider's index entries.
    #[inline]
    pub fn provider_scan_range(provider: &str) -> (Vec<u8>, Vec<u8>) {
        let prefix = format!("subtitle_provider:{provider}:").into_bytes();
        let end = scan_end(&prefix);
        (prefix, end)
    }

    /// Bounded range covering every subtitle source record.
    #[inline]
    pub fn scan_range() -> (Vec<u8>, Vec<u8>) {
        let prefix = b"subtitle_source:".to_vec();
        let end = scan_end(&prefix);
        (prefix, end)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    fn fixed_id() -> Uuid {
        Uuid::parse_str("6ba7b810-9dad-11d1-80b4-00c04fd430c8").unwrap()
    }

    #[test]
    fn test_account_keys() {
        let id = fixed_id();
        assert_eq!(account::by_id(id), format!("user:{id}").as_bytes());
        assert_eq!(account::by_username("alice"), b"user_username:alice");
        assert_eq!(account::by_email("alice@x.com"), b"user_email:alice@x.com");
        assert_eq!(account::scan_range(), (b"user:".to_vec(), b"user;".to_vec()));
    }

    #[test]
    fn test_session_keys() {
        let account = fixed_id();
        let session = Uuid::parse_str("6ba7b811-9dad-11d1-80b4-00c04fd430c8").unwrap();
        assert_eq!(session::by_token("tok1"), b"session_token:tok1");
        assert_eq!(
            session::user_index(account, session),
            format!("session_user:{account}:{session}").as_bytes()
        );
        let (start, end) = session::user_scan_range(account);
        assert_eq!(start, format!("session_user:{account}:").as_bytes());
        assert_eq!(end, format!("session_user:{account};").as_bytes());
    }

    #[test]
    fn test_tag_keys() {
        let id = fixed_id();
        assert_eq!(tag::by_name("anime"), b"tag_name:anime");
        assert_eq!(tag::by_legacy_id(42), b"tag_legacy:00000000000000000042");
        assert_eq!(tag::seq_counter(), b"tag_seq");
        assert_eq!(
            tag::assoc(id, "media", "series-1"),
            format!("tag_assoc:{id}:media:series-1").as_bytes()
        );
        assert_eq!(
            tag::entity_index("media", "series-1", id),
            format!("tag_entity:media:series-1:{id}").as_bytes()
        );
    }

    #[test]
    fn test_legacy_ids_sort_numerically() {
        let k1 = tag::by_legacy_id(1);
        let k10 = tag::by_legacy_id(10);
        let k100 = tag::by_legacy_id(100);
        assert!(k1 < k10);
        assert!(k10 < k100);
    }

    #[test]
    fn test_source_keys() {
        assert_eq!(source::by_hash("abc123"), b"subtitle_source:abc123");
        assert_eq!(
            source::provider_index("opensubtitles", "abc123"),
            b"subtitle_provider:opensubtitles:abc123"
        );
        let (start, end) = source::provider_scan_range("opensubtitles");
        assert_eq!(start, b"subtitle_provider:opensubtitles:");
        assert_eq!(end, b"subtitle_provider:opensubtitles;");
    }

    /// A primary-record scan must never observe sibling namespaces whose
    /// prefix extends the primary one (`user:` vs `user_username:`).
    #[test]
    fn test_namespace_scans_are_isolated() {
        let cases: &[((Vec<u8>, Vec<u8>), Vec<u8>)] = &[
            (account::scan_range(), account::by_username("zz")),
            (account::scan_range(), account::by_email("zz@x.com")),
            (session::scan_range(), session::by_token("zz")),
            (session::scan_range(), session::user_index(fixed_id(), fixed_id())),
            (api_key::scan_range(), api_key::by_value("zz")),
            (login_token::scan_range(), login_token::by_value("zz")),
            (tag::scan_range(), tag::by_name("zz")),
            (tag::scan_range(), tag::by_legacy_id(1)),
            (tag::scan_range(), tag::seq_counter()),
            (tag::scan_range(), tag::assoc(fixed_id(), "media", "x")),
            (tag::scan_range(), tag::entity_index("media", "x", fixed_id())),
            (source::scan_range(), source::provider_index("p", "h")),
        ];

        for ((start, end), foreign) in cases {
            let inside = foreign >= start && foreign < end;
            assert!(
                !inside,
                "key {:?} must not fall inside scan range [{:?}, {:?})",
                String::from_utf8_lossy(foreign),
                String::from_utf8_lossy(start),
                String::from_utf8_lossy(end),
            );
        }
    }

    /// Values sort within their own namespace regardless of content,
    /// because the bound is computed from the prefix bytes alone.
    #[test]
    fn test_scan_bound_holds_for_high_value_bytes() {
        let (start, end) = tag::name_scan_range();
        let weird = tag::by_name("~~~weird~~~");
        assert!(weird >= start && weird < end);
    }
}
