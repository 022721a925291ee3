//! Repository layer for the subarr domain store.
//!
//! This crate provides domain-specific repositories that sit on top of
//! the generic [`StorageBackend`](subarr_storage::StorageBackend)
//! abstraction. Each repository encapsulates the key encoding,
//! serialization and batch logic for its entity family.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     Service Layer                        │
//! │          (HTTP/gRPC handlers, schedulers)                │
//! ├──────────────────────────────────────────────────────────┤
//! │                    Repository Layer                      │
//! │  AccountRepository │ TagRepository │ PermissionRepository│
//! │  ProfileRepository │ SourceRepository                    │
//! │      (Domain logic, serialization, indexing)             │
//! ├──────────────────────────────────────────────────────────┤
//! │                     subarr-storage                       │
//! │                  StorageBackend trait                    │
//! │      (get, set, delete, get_range, transaction)          │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Consistency model
//!
//! A primary record and every secondary index pointing at it are written
//! and removed in one atomic batch, so an index never references a
//! missing record and a record is always reachable through its canonical
//! indexes. Multi-step read-decide-write sequences serialize behind a
//! per-entity-family write lock inside each repository; the storage
//! engine only has to provide atomic batch commits and consistent reads.
//!
//! # Key Encoding
//!
//! All repositories share the flat namespace schema in the [`keys`]
//! module. Filtered listings scan one namespace as a bounded key range,
//! never the whole key space.
//!
//! # Error Handling
//!
//! All operations return [`RepositoryResult<T>`]. Absent records on
//! lookups are `Ok(None)`, not errors; see [`error`] for the taxonomy.
//!
//! # Example
//!
//! ```ignore
//! use subarr_storage::MemoryBackend;
//! use subarr_repository::DomainStore;
//!
//! let store = DomainStore::builder().backend(MemoryBackend::new()).build();
//! store.bootstrap().await?;
//! ```

#![deny(unsafe_code)]

pub mod account;
pub mod error;
pub mod keys;
pub mod permission;
pub mod profile;
mod record;
pub mod source;
pub mod store;
pub mod tag;

// Re-export main types for convenience
pub use account::AccountRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use permission::PermissionRepository;
pub use profile::ProfileRepository;
pub use source::SourceRepository;
pub use store::DomainStore;
pub use tag::TagRepository;
