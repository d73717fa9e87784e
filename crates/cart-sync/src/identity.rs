//! Identity resolution seam.
//!
//! Token issuance and storage live outside this engine; the engine only
//! needs to know who the current actor is, whether they are authenticated,
//! and which local-storage namespace applies. Hosting dashboards implement
//! [`IdentityKeyResolver`] over their own session handling.

use secrecy::SecretString;

use reloved_core::ActorRole;

/// The current authenticated actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Opaque actor id as issued by the auth service.
    pub id: String,
    pub role: ActorRole,
}

/// Resolves the credential and storage namespace for the current actor.
pub trait IdentityKeyResolver: Send + Sync {
    /// The current actor, or `None` for a guest.
    fn identity(&self) -> Option<Identity>;

    /// The current bearer token, or `None` when no credential is held.
    fn auth_token(&self) -> Option<SecretString>;

    /// Authenticated means a non-null identity AND a non-null token.
    fn is_authenticated(&self) -> bool {
        self.identity().is_some() && self.auth_token().is_some()
    }

    /// Local-storage namespace for the current actor; `guest` when
    /// anonymous.
    fn storage_namespace(&self) -> String {
        self.identity().map_or_else(
            || "guest".to_string(),
            |identity| identity.role.storage_namespace().to_string(),
        )
    }
}

impl<T: IdentityKeyResolver + ?Sized> IdentityKeyResolver for std::sync::Arc<T> {
    fn identity(&self) -> Option<Identity> {
        (**self).identity()
    }

    fn auth_token(&self) -> Option<SecretString> {
        (**self).auth_token()
    }

    fn is_authenticated(&self) -> bool {
        (**self).is_authenticated()
    }

    fn storage_namespace(&self) -> String {
        (**self).storage_namespace()
    }
}

/// Resolver for the pre-login state: no identity, no token.
#[derive(Debug, Clone, Copy, Default)]
pub struct Guest;

impl IdentityKeyResolver for Guest {
    fn identity(&self) -> Option<Identity> {
        None
    }

    fn auth_token(&self) -> Option<SecretString> {
        None
    }
}
