//! Permission type
//!
//! A plain role → permission multimap entry. There is no secondary index;
//! role lookups filter a bounded scan of the permission namespace.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One (role, permission) grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    /// Unique identifier for this grant.
    pub id: Uuid,

    /// Role the permission is granted to.
    pub role: String,

    /// Permission string as the application interprets it.
    pub permission: String,
}

impl Permission {
    /// Create a new grant with a fresh random id.
    pub fn new(role: impl Into<String>, permission: impl Into<String>) -> Self {
        Self { id: Uuid::new_v4(), role: role.into(), permission: permission.into() }
    }
}
