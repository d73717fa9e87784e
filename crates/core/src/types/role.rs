//! Actor roles for the multi-role marketplace.
//!
//! Each authenticated actor belongs to exactly one role, and each role keeps
//! its own local-storage namespace so a partner's cart never shadows a
//! customer's on a shared device.

use serde::{Deserialize, Serialize};

/// Role of an authenticated marketplace actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Customer,
    Partner,
    Agent,
    Admin,
}

impl ActorRole {
    /// Local-storage namespace for this role.
    ///
    /// Used to derive the key under which the durable cart blob is kept.
    #[must_use]
    pub const fn storage_namespace(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Partner => "partner",
            Self::Agent => "agent",
            Self::Admin => "admin",
        }
    }
}

impl std::fmt::Display for ActorRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.storage_namespace())
    }
}
