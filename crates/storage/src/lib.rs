//! # Subarr Storage - Ordered Key-Value Abstraction
//!
//! Provides the [`StorageBackend`] trait the repository layer is built
//! on: point reads and writes, bounded range reads over the sorted key
//! space, and atomic batched writes through [`Transaction`].
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │               Repository Layer                   │
//! │        (subarr-repository crates)                │
//! ├──────────────────────────────────────────────────┤
//! │              StorageBackend trait                │
//! │   (get, set, delete, get_range, transaction)     │
//! ├──────────────────┬───────────────────────────────┤
//! │  MemoryBackend   │          RedbBackend          │
//! │  (tests, dev)    │     (durable persistence)     │
//! └──────────────────┴───────────────────────────────┘
//! ```
//!
//! Implementations must keep keys byte-sorted so that range reads observe
//! keys in lexicographic order, and must apply a committed [`Transaction`]
//! all-or-nothing.

#![deny(unsafe_code)]

use std::ops::Range;

use async_trait::async_trait;

pub mod factory;
pub mod memory;
pub mod redb;

pub use crate::redb::RedbBackend;
pub use factory::{BackendType, SharedBackend, StorageConfig, StorageFactory};
pub use memory::MemoryBackend;

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors produced by a storage backend.
///
/// "Key not present" is not an error: point reads return `Ok(None)` and
/// range reads simply omit the key. These variants cover genuine engine
/// faults only.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The underlying engine failed a read, write, iterate or commit.
    #[error("storage backend error: {0}")]
    Backend(String),

    /// An I/O error reached the backend.
    #[error("storage i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// One key-value pair returned by a range read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    /// The full key, including its namespace prefix.
    pub key: Vec<u8>,

    /// The stored value bytes.
    pub value: Vec<u8>,
}

/// A single staged write inside a [`Transaction`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    /// Insert or overwrite `key` with `value`.
    Put {
        /// Key to write.
        key: Vec<u8>,
        /// Value bytes to store.
        value: Vec<u8>,
    },
    /// Remove `key` if present; absent keys are a no-op.
    Delete {
        /// Key to remove.
        key: Vec<u8>,
    },
}

/// The abstract ordered key-value store interface.
///
/// All operations are durable on return for persistent backends; there is
/// no deferred or asynchronous commit mode. Point operations and committed
/// transactions are safe under concurrent callers.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Read the value stored at `key`.
    ///
    /// Returns `None` if the key has no entry.
    async fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>>;

    /// Insert or overwrite a single key.
    async fn set(&self, key: Vec<u8>, value: Vec<u8>) -> StorageResult<()>;

    /// Remove a single key. Removing an absent key is a no-op.
    async fn delete(&self, key: &[u8]) -> StorageResult<()>;

    /// Read all entries with `range.start <= key < range.end`, in key
    /// order.
    async fn get_range(&self, range: Range<Vec<u8>>) -> StorageResult<Vec<KeyValue>>;

    /// Apply a batch of writes atomically: either every op is durably
    /// applied or none is.
    async fn apply(&self, ops: Vec<WriteOp>) -> StorageResult<()>;

    /// Start a write transaction.
    ///
    /// Staged ops are buffered in memory and handed to [`Self::apply`] on
    /// commit; dropping the transaction without committing discards it.
    async fn transaction(&self) -> StorageResult<Transaction<'_>>
    where
        Self: Sized,
    {
        Ok(Transaction::new(self))
    }
}

/// A buffered atomic write batch.
///
/// Created by [`StorageBackend::transaction`]. `set`/`delete` stage
/// operations without touching the engine; `commit` applies them
/// all-or-nothing.
pub struct Transaction<'a> {
    backend: &'a dyn StorageBackend,
    ops: Vec<WriteOp>,
}

impl<'a> Transaction<'a> {
    fn new(backend: &'a dyn StorageBackend) -> Self {
        Self { backend, ops: Vec::new() }
    }

    /// Stage an insert-or-overwrite.
    pub fn set(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.ops.push(WriteOp::Put { key, value });
    }

    /// Stage a removal.
    pub fn delete(&mut self, key: Vec<u8>) {
        self.ops.push(WriteOp::Delete { key });
    }

    /// Number of staged operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// True if nothing has been staged.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Apply every staged operation atomically.
    pub async fn commit(self) -> StorageResult<()> {
        if self.ops.is_empty() {
            return Ok(());
        }
        self.backend.apply(self.ops).await
    }
}

#[async_trait]
impl<T: StorageBackend + ?Sized> StorageBackend for std::sync::Arc<T> {
    async fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        (**self).get(key).await
    }

    async fn set(&self, key: Vec<u8>, value: Vec<u8>) -> StorageResult<()> {
        (**self).set(key, value).await
    }

    async fn delete(&self, key: &[u8]) -> StorageResult<()> {
        (**self).delete(key).await
    }

    async fn get_range(&self, range: Range<Vec<u8>>) -> StorageResult<Vec<KeyValue>> {
        (**self).get_range(range).await
    }

    async fn apply(&self, ops: Vec<WriteOp>) -> StorageResult<()> {
        (**self).apply(ops).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_transaction_stages_without_writing() {
        let backend = MemoryBackend::new();

        let mut txn = backend.transaction().await.unwrap();
        txn.set(b"a".to_vec(), b"1".to_vec());
        assert_eq!(txn.len(), 1);

        // Nothing visible until commit
        assert!(backend.get(b"a").await.unwrap().is_none());

        txn.commit().await.unwrap();
        assert_eq!(backend.get(b"a").await.unwrap(), Some(b"1".to_vec()));
    }

    #[tokio::test]
    async fn test_dropped_transaction_is_discarded() {
        let backend = MemoryBackend::new();

        {
            let mut txn = backend.transaction().await.unwrap();
            txn.set(b"a".to_vec(), b"1".to_vec());
        }

        assert!(backend.get(b"a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_transaction_commit_is_noop() {
        let backend = MemoryBackend::new();
        let txn = backend.transaction().await.unwrap();
        assert!(txn.is_empty());
        txn.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_arc_backend_delegates() {
        let backend = std::sync::Arc::new(MemoryBackend::new());
        backend.set(b"k".to_vec(), b"v".to_vec()).await.unwrap();
        assert_eq!(backend.get(b"k").await.unwrap(), Some(b"v".to_vec()));
    }
}
