//! In-memory storage backend for testing and development.

use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{KeyValue, StorageBackend, StorageResult, WriteOp};

/// In-memory ordered store backed by a `BTreeMap`.
///
/// Cloning is cheap and clones share the same underlying map, which lets
/// each repository in a store facade hold its own handle. Range reads take
/// the read lock for their whole duration, so they observe a consistent
/// snapshot; batches apply under the write lock, so they are atomic with
/// respect to every other operation.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    data: Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored. Test helper.
    pub async fn len(&self) -> usize {
        self.data.read().await.len()
    }

    /// True if no keys are stored. Test helper.
    pub async fn is_empty(&self) -> bool {
        self.data.read().await.is_empty()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.data.read().await.get(key).cloned())
    }

    async fn set(&self, key: Vec<u8>, value: Vec<u8>) -> StorageResult<()> {
        self.data.write().await.insert(key, value);
        Ok(())
    }

    async fn delete(&self, key: &[u8]) -> StorageResult<()> {
        self.data.write().await.remove(key);
        Ok(())
    }

    async fn get_range(&self, range: Range<Vec<u8>>) -> StorageResult<Vec<KeyValue>> {
        let data = self.data.read().await;
        Ok(data
            .range(range)
            .map(|(key, value)| KeyValue { key: key.clone(), value: value.clone() })
            .collect())
    }

    async fn apply(&self, ops: Vec<WriteOp>) -> StorageResult<()> {
        let mut data = self.data.write().await;
        for op in ops {
            match op {
                WriteOp::Put { key, value } => {
                    data.insert(key, value);
                },
                WriteOp::Delete { key } => {
                    data.remove(&key);
                },
            }
        }
        Ok(())
    }
}
