//! Shared record and index helpers used by every repository.
//!
//! Primary records are stored as self-describing JSON documents; secondary
//! index entries store the referenced id as its string bytes. Point reads
//! through these helpers always surface corruption; best-effort bulk
//! scans that prefer to skip malformed entries handle errors at the call
//! site instead.

use uuid::Uuid;

use subarr_storage::StorageBackend;

use crate::error::{RepositoryError, RepositoryResult};

/// Serialize a record for storage.
pub(crate) fn to_json<T: serde::Serialize>(value: &T) -> RepositoryResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(RepositoryError::serialization)
}

/// Encode an id for use as a secondary index value.
pub(crate) fn id_bytes(id: Uuid) -> Vec<u8> {
    id.to_string().into_bytes()
}

/// Decode a secondary index value back into an id.
pub(crate) fn parse_id_bytes(data: &[u8]) -> RepositoryResult<Uuid> {
    let text = std::str::from_utf8(data)
        .map_err(|e| RepositoryError::Serialization(format!("index value is not utf-8: {e}")))?;
    Uuid::parse_str(text)
        .map_err(|e| RepositoryError::Serialization(format!("index value is not a uuid: {e}")))
}

/// Read and deserialize a primary record. `None` if the key is absent.
pub(crate) async fn read_record<S, T>(storage: &S, key: &[u8]) -> RepositoryResult<Option<T>>
where
    S: StorageBackend,
    T: serde::de::DeserializeOwned,
{
    match storage.get(key).await? {
        Some(data) => {
            let record = serde_json::from_slice(&data).map_err(RepositoryError::serialization)?;
            Ok(Some(record))
        },
        None => Ok(None),
    }
}

/// Read a secondary index entry. `None` if the key is absent.
pub(crate) async fn read_id_index<S: StorageBackend>(
    storage: &S,
    key: &[u8],
) -> RepositoryResult<Option<Uuid>> {
    match storage.get(key).await? {
        Some(data) => parse_id_bytes(&data).map(Some),
        None => Ok(None),
    }
}
