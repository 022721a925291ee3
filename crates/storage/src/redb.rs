//! Durable storage backend on top of the redb embedded engine.

use std::ops::Range;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use redb::{Database, ReadableTable, TableDefinition};

use crate::{KeyValue, StorageBackend, StorageError, StorageResult, WriteOp};

/// All records live in one byte-keyed table; namespacing happens in the
/// key codec, not in separate tables.
const TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("subarr");

/// Persistent ordered store backed by a redb database file.
///
/// redb gives sorted byte keys, consistent read snapshots and atomic,
/// fsync-durable write transactions, which is exactly the contract
/// [`StorageBackend`] asks for. All engine calls run on the blocking
/// thread pool so the async runtime never stalls on file I/O.
///
/// Cloning is cheap; clones share the same database handle.
#[derive(Clone)]
pub struct RedbBackend {
    db: Arc<Database>,
}

impl RedbBackend {
    /// Open (or create) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path).map_err(backend_err)?;

        // Create the table up front so read transactions never race a
        // first write.
        let txn = db.begin_write().map_err(backend_err)?;
        txn.open_table(TABLE).map_err(backend_err)?;
        txn.commit().map_err(backend_err)?;

        Ok(Self { db: Arc::new(db) })
    }

    async fn run_blocking<T, F>(&self, op: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> StorageResult<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || op(&db))
            .await
            .map_err(|e| StorageError::Backend(format!("storage task panicked: {e}")))?
    }
}

fn backend_err(err: impl std::fmt::Display) -> StorageError {
    StorageError::Backend(err.to_string())
}

#[async_trait]
impl StorageBackend for RedbBackend {
    async fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        let key = key.to_vec();
        self.run_blocking(move |db| {
            let txn = db.begin_read().map_err(backend_err)?;
            let table = txn.open_table(TABLE).map_err(backend_err)?;
            let value = table.get(key.as_slice()).map_err(backend_err)?;
            Ok(value.map(|guard| guard.value().to_vec()))
        })
        .await
    }

    async fn set(&self, key: Vec<u8>, value: Vec<u8>) -> StorageResult<()> {
        self.apply(vec![WriteOp::Put { key, value }]).await
    }

    async fn delete(&self, key: &[u8]) -> StorageResult<()> {
        self.apply(vec![WriteOp::Delete { key: key.to_vec() }]).await
    }

    async fn get_range(&self, range: Range<Vec<u8>>) -> StorageResult<Vec<KeyValue>> {
        self.run_blocking(move |db| {
            let txn = db.begin_read().map_err(backend_err)?;
            let table = txn.open_table(TABLE).map_err(backend_err)?;

            let mut entries = Vec::new();
            let iter =
                table.range(range.start.as_slice()..range.end.as_slice()).map_err(backend_err)?;
            for item in iter {
                let (key, value) = item.map_err(backend_err)?;
                entries.push(KeyValue { key: key.value().to_vec(), value: value.value().to_vec() });
            }
            Ok(entries)
        })
        .await
    }

    async fn apply(&self, ops: Vec<WriteOp>) -> StorageResult<()> {
        self.run_blocking(move |db| {
            let txn = db.begin_write().map_err(backend_err)?;
            {
                let mut table = txn.open_table(TABLE).map_err(backend_err)?;
                for op in &ops {
                    match op {
                        WriteOp::Put { key, value } => {
                            table
                                .insert(key.as_slice(), value.as_slice())
                                .map_err(backend_err)?;
                        },
                        WriteOp::Delete { key } => {
                            table.remove(key.as_slice()).map_err(backend_err)?;
                        },
                    }
                }
            }
            txn.commit().map_err(backend_err)
        })
        .await
    }
}
