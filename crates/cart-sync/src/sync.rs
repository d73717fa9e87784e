//! Local/remote cart reconciliation on the login transition.
//!
//! Reconciliation runs exactly once per authenticated session. The policy is
//! "last reconciliation wins, server authoritative when non-empty": a
//! non-empty server cart replaces the guest cart outright; only when the
//! server cart is empty are guest lines pushed up, best effort, and the
//! post-push server cart adopted. This is a deliberate policy decision, not
//! a merge.

use tracing::{debug, instrument, warn};

use crate::cart::Cart;
use crate::error::CartError;
use crate::gateway::RemoteCartGateway;
use crate::identity::IdentityKeyResolver;
use crate::machine::CartStateMachine;
use crate::store::CartStore;

/// Reconciliation lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    /// Guest, or authenticated but not yet reconciled.
    #[default]
    Unsynced,
    /// Reconciliation in flight.
    Syncing,
    /// Remote is authoritative; the local store is a write-through cache.
    Synced,
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unsynced => write!(f, "unsynced"),
            Self::Syncing => write!(f, "syncing"),
            Self::Synced => write!(f, "synced"),
        }
    }
}

/// Session-scoped reconciliation guard.
///
/// An explicit field rather than ambient state: owned by the coordinator,
/// set when a reconciliation completes, cleared on logout so the next login
/// re-triggers exactly once.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionContext {
    reconciled: bool,
}

impl SessionContext {
    /// Whether this session has already reconciled.
    #[must_use]
    pub const fn is_reconciled(&self) -> bool {
        self.reconciled
    }
}

/// Orchestrates the one-time local/remote reconciliation on the
/// authentication transition and exposes the state machine for subsequent
/// write-through mutations.
pub struct SyncCoordinator<G, S, I> {
    machine: CartStateMachine<G, S, I>,
    state: SyncState,
    session: SessionContext,
}

impl<G, S, I> SyncCoordinator<G, S, I>
where
    G: RemoteCartGateway,
    S: CartStore,
    I: IdentityKeyResolver,
{
    #[must_use]
    pub const fn new(machine: CartStateMachine<G, S, I>) -> Self {
        Self {
            machine,
            state: SyncState::Unsynced,
            session: SessionContext { reconciled: false },
        }
    }

    /// The underlying state machine (mutations go through here).
    #[must_use]
    pub const fn machine(&self) -> &CartStateMachine<G, S, I> {
        &self.machine
    }

    #[must_use]
    pub const fn state(&self) -> SyncState {
        self.state
    }

    #[must_use]
    pub const fn session(&self) -> &SessionContext {
        &self.session
    }

    /// Handle the guest -> authenticated transition.
    ///
    /// No-op when the resolver does not report an authenticated actor, and
    /// when this session already reconciled (re-triggering is a no-op,
    /// verified by gateway call counts). A failed reconciliation leaves the
    /// guard unset so the next login trigger retries.
    ///
    /// # Errors
    ///
    /// `Remote` when the initial fetch or the post-push re-fetch fails; the
    /// coordinator returns to `Unsynced`.
    #[instrument(skip(self))]
    pub async fn handle_login(&mut self) -> Result<(), CartError> {
        if !self.machine.identity().is_authenticated() {
            debug!("login signal without authenticated identity; ignoring");
            return Ok(());
        }
        if self.session.reconciled {
            debug!("session already reconciled; skipping");
            return Ok(());
        }

        self.state = SyncState::Syncing;
        match self.reconcile().await {
            Ok(()) => {
                self.state = SyncState::Synced;
                self.session.reconciled = true;
                Ok(())
            }
            Err(error) => {
                self.state = SyncState::Unsynced;
                Err(error)
            }
        }
    }

    /// Reset the session guard so the next login re-evaluates.
    pub fn handle_logout(&mut self) {
        self.session.reconciled = false;
        self.state = SyncState::Unsynced;
        debug!("sync guard reset on logout");
    }

    async fn reconcile(&self) -> Result<(), CartError> {
        let remote = self.machine.gateway().fetch().await?;

        if !remote.is_empty() {
            // Server wins: the authoritative cart replaces whatever the
            // guest accumulated.
            debug!(lines = remote.len(), "adopting non-empty server cart");
            self.machine.adopt(remote);
            return Ok(());
        }

        let local = self.machine.cart();
        if local.is_empty() {
            self.machine.adopt(Cart::default());
            return Ok(());
        }

        // Push guest lines oldest-first so server recency mirrors local
        // recency. A line that fails to push is skipped, not fatal: the only
        // thing at risk is that one guest line, never server state.
        debug!(lines = local.len(), "pushing guest cart to empty server cart");
        for line in local.lines().iter().rev() {
            if let Err(error) = self
                .machine
                .gateway()
                .add_item(&line.product_id, line.quantity, line.condition.as_ref())
                .await
            {
                warn!(
                    product_id = %line.product_id,
                    %error,
                    "skipping cart line that failed to push"
                );
            }
        }

        let merged = self.machine.gateway().fetch().await?;
        self.machine.adopt(merged);
        Ok(())
    }
}
