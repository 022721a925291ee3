//! # Subarr Types
//!
//! Shared type definitions for the subarr domain store.
//!
//! This crate provides the persisted record types used across the store,
//! ensuring a single source of truth and preventing circular dependencies.
//! Every record serializes to a self-describing JSON document; the key
//! layout that addresses these records lives in `subarr-repository`.

#![deny(unsafe_code)]

// ============================================================================
// Accounts & Credentials
// ============================================================================

pub mod account;
pub mod credentials;

pub use account::Account;
pub use credentials::{ApiKey, DashboardPref, OneTimeToken, Session};

// ============================================================================
// Tags
// ============================================================================

pub mod tag;

pub use tag::{Tag, TagAssociation};

// ============================================================================
// Permissions
// ============================================================================

pub mod permission;

pub use permission::Permission;

// ============================================================================
// Language Profiles
// ============================================================================

pub mod profile;

pub use profile::{LanguageProfile, MediaProfileAssignment, ProfileItem};

// ============================================================================
// Subtitle Sources
// ============================================================================

pub mod source;

pub use source::SubtitleSource;
