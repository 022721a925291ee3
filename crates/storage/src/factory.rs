//! Storage factory for creating backend instances.
//!
//! Lets the embedding application pick a backend from configuration
//! without naming concrete types.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use crate::{MemoryBackend, RedbBackend, StorageBackend, StorageError, StorageResult};

/// A backend behind a shared handle, usable wherever a concrete backend
/// type is (it implements [`StorageBackend`] and `Clone`).
pub type SharedBackend = Arc<dyn StorageBackend>;

/// Storage backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    /// In-memory storage (for testing and development).
    Memory,
    /// redb file-backed storage (for production).
    Redb,
}

impl FromStr for BackendType {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(BackendType::Memory),
            "redb" => Ok(BackendType::Redb),
            _ => Err(StorageError::Backend(format!("unknown backend type: {s}"))),
        }
    }
}

impl BackendType {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendType::Memory => "memory",
            BackendType::Redb => "redb",
        }
    }
}

/// Configuration for the storage backend.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Backend type to use.
    pub backend: BackendType,
    /// Database file path, required for file-backed backends.
    pub path: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { backend: BackendType::Memory, path: None }
    }
}

impl StorageConfig {
    /// Create config for the memory backend.
    pub fn memory() -> Self {
        Self { backend: BackendType::Memory, path: None }
    }

    /// Create config for the redb backend at `path`.
    pub fn redb(path: impl Into<PathBuf>) -> Self {
        Self { backend: BackendType::Redb, path: Some(path.into()) }
    }
}

/// Storage factory for creating backend instances.
pub struct StorageFactory;

impl StorageFactory {
    /// Create a storage backend from configuration.
    pub fn create(config: StorageConfig) -> StorageResult<SharedBackend> {
        match config.backend {
            BackendType::Memory => Ok(Arc::new(MemoryBackend::new())),
            BackendType::Redb => {
                let path = config.path.ok_or_else(|| {
                    StorageError::Backend("redb backend requires a database path".to_string())
                })?;
                Ok(Arc::new(RedbBackend::open(path)?))
            },
        }
    }

    /// Create a storage backend from a backend-name string.
    pub fn from_str(backend_str: &str, path: Option<PathBuf>) -> StorageResult<SharedBackend> {
        let backend = BackendType::from_str(backend_str)?;
        Self::create(StorageConfig { backend, path })
    }
}
