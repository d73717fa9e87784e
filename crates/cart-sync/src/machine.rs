//! Optimistic cart mutations with generation-guarded rollback.
//!
//! Every mutation applies locally first (and persists synchronously), then
//! writes through to the remote gateway when the actor is authenticated. On
//! remote failure the exact pre-mutation snapshot is restored - for add,
//! update, and remove alike - and the error is surfaced to the caller.
//!
//! # Concurrency
//!
//! Execution is event-driven on one logical thread; the only suspension
//! points are remote calls. The internal mutex is held only between
//! suspension points, never across an `.await`, so a second mutation may be
//! issued while a prior round-trip is in flight. Each mutation records a
//! monotonic generation for its line key at invocation; a resolving remote
//! response applies its rollback (or canonical cart adoption) only while its
//! generation is still current, so a stale response cannot clobber newer
//! optimistic state. Callers that need exact consistency should still avoid
//! overlapping mutations against the same line.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use tracing::{debug, instrument, warn};

use reloved_core::{Condition, ProductId};

use crate::cart::{Cart, CartLine, KeyLookup, LineDraft, LineKey};
use crate::error::CartError;
use crate::gateway::RemoteCartGateway;
use crate::identity::IdentityKeyResolver;
use crate::store::CartStore;

#[derive(Default)]
struct MachineState {
    cart: Cart,
    /// Monotonic clock; each mutation takes the next tick.
    clock: u64,
    /// Last generation that touched each line key.
    line_generations: HashMap<LineKey, u64>,
    /// Last generation that touched the cart at all.
    cart_generation: u64,
}

impl MachineState {
    /// Record a mutation against `key` and return its generation.
    fn stamp(&mut self, key: LineKey) -> u64 {
        self.clock += 1;
        self.line_generations.insert(key, self.clock);
        self.cart_generation = self.clock;
        self.clock
    }

    fn line_generation(&self, key: &LineKey) -> Option<u64> {
        self.line_generations.get(key).copied()
    }

    /// Wholesale replacement: all outstanding generations are obsolete.
    fn replace(&mut self, cart: Cart) {
        self.clock += 1;
        self.cart_generation = self.clock;
        self.line_generations.clear();
        self.cart = cart;
    }
}

/// Applies add/update/remove mutations to the in-memory cart,
/// optimistic-apply with rollback on remote failure.
pub struct CartStateMachine<G, S, I> {
    gateway: G,
    store: S,
    identity: I,
    state: Mutex<MachineState>,
}

impl<G, S, I> CartStateMachine<G, S, I>
where
    G: RemoteCartGateway,
    S: CartStore,
    I: IdentityKeyResolver,
{
    /// Create a state machine seeded from the local store.
    pub fn new(gateway: G, store: S, identity: I) -> Self {
        let cart = store.load();
        let state = MachineState {
            cart,
            ..MachineState::default()
        };
        Self {
            gateway,
            store,
            identity,
            state: Mutex::new(state),
        }
    }

    /// Snapshot of the current cart.
    pub fn cart(&self) -> Cart {
        self.lock().cart.clone()
    }

    /// The identity resolver this machine consults.
    pub const fn identity(&self) -> &I {
        &self.identity
    }

    pub(crate) const fn gateway(&self) -> &G {
        &self.gateway
    }

    fn lock(&self) -> MutexGuard<'_, MachineState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Add a line (or merge into an existing `(product, condition)` line).
    ///
    /// The merged line moves to index 0 with a refreshed timestamp. When
    /// authenticated, the incremental delta is written through; on remote
    /// failure the pre-add snapshot is restored and the error surfaced.
    ///
    /// # Errors
    ///
    /// `Validation` for a zero quantity; `Remote` when the write-through
    /// fails (the local cart has been rolled back).
    #[instrument(skip(self, draft), fields(product_id = %draft.product_id))]
    pub async fn add_line(&self, draft: LineDraft) -> Result<(), CartError> {
        if draft.quantity == 0 {
            return Err(CartError::Validation(
                "quantity must be at least 1".to_string(),
            ));
        }

        let delta = draft.quantity;
        let product_id = draft.product_id.clone();
        let condition = draft.condition.clone();
        let key = draft.key();

        let (prior, my_gen) = {
            let mut state = self.lock();
            let prior = state.cart.clone();
            state.cart.merge_or_prepend(draft, Utc::now());
            let my_gen = state.stamp(key.clone());
            self.store.save(&state.cart);
            (prior, my_gen)
        };

        if !self.identity.is_authenticated() {
            return Ok(());
        }

        match self
            .gateway
            .add_item(&product_id, delta, condition.as_ref())
            .await
        {
            Ok(canonical) => {
                let mut state = self.lock();
                if state.cart_generation == my_gen {
                    state.cart = canonical;
                    self.store.save(&state.cart);
                } else {
                    debug!("discarding stale canonical cart from add response");
                }
                Ok(())
            }
            Err(error) => {
                self.rollback(&key, my_gen, prior);
                Err(error.into())
            }
        }
    }

    /// Set a line's quantity. A quantity of zero or less removes the line.
    ///
    /// # Errors
    ///
    /// `Validation` when the line is missing or the bare product id is
    /// ambiguous across condition variants; `Remote` when the write-through
    /// fails (the local cart has been rolled back).
    #[instrument(skip(self, condition), fields(product_id = %product_id))]
    pub async fn update_quantity(
        &self,
        product_id: &ProductId,
        quantity: i64,
        condition: Option<&Condition>,
    ) -> Result<(), CartError> {
        if quantity <= 0 {
            return self.remove_line(product_id, condition).await;
        }
        let quantity = u32::try_from(quantity)
            .map_err(|_| CartError::Validation("quantity out of range".to_string()))?;

        let (key, prior, my_gen) = {
            let mut state = self.lock();
            let key = resolve_target(&state.cart, product_id, condition)?;
            let prior = state.cart.clone();
            state.cart.set_quantity(&key, quantity, Utc::now());
            let my_gen = state.stamp(key.clone());
            self.store.save(&state.cart);
            (key, prior, my_gen)
        };

        if !self.identity.is_authenticated() {
            return Ok(());
        }

        match self.gateway.update_quantity(product_id, quantity).await {
            Ok(()) => Ok(()),
            Err(error) => {
                self.rollback(&key, my_gen, prior);
                Err(error.into())
            }
        }
    }

    /// Remove a line.
    ///
    /// With `condition` omitted the bare product id must identify a single
    /// line; several condition variants of the same product are rejected
    /// rather than guessed at.
    ///
    /// # Errors
    ///
    /// `Validation` when the line is missing or ambiguous; `Remote` when the
    /// write-through fails (the local cart has been rolled back).
    #[instrument(skip(self, condition), fields(product_id = %product_id))]
    pub async fn remove_line(
        &self,
        product_id: &ProductId,
        condition: Option<&Condition>,
    ) -> Result<(), CartError> {
        let (key, prior, my_gen) = {
            let mut state = self.lock();
            let key = resolve_target(&state.cart, product_id, condition)?;
            let prior = state.cart.clone();
            state.cart.remove(&key);
            let my_gen = state.stamp(key.clone());
            self.store.save(&state.cart);
            (key, prior, my_gen)
        };

        if !self.identity.is_authenticated() {
            return Ok(());
        }

        match self.gateway.remove_item(product_id).await {
            Ok(()) => Ok(()),
            Err(error) => {
                self.rollback(&key, my_gen, prior);
                Err(error.into())
            }
        }
    }

    /// Empty the cart. Returns the number of removed lines (for user
    /// feedback).
    ///
    /// When authenticated, each previously-present line is removed from the
    /// server individually (no bulk endpoint exists); an individual failure
    /// is logged and skipped, and the line is NOT restored locally - an
    /// accepted inconsistency until the next reconciliation.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> usize {
        let removed: Vec<CartLine> = {
            let mut state = self.lock();
            let removed = state.cart.drain_lines();
            state.clock += 1;
            state.cart_generation = state.clock;
            // Stamp every removed key so stale in-flight responses for
            // those lines cannot resurrect them.
            for line in &removed {
                let clock = state.clock;
                state.line_generations.insert(line.key(), clock);
            }
            self.store.save(&state.cart);
            removed
        };

        let count = removed.len();
        if count == 0 || !self.identity.is_authenticated() {
            return count;
        }

        for line in removed {
            if let Err(error) = self.gateway.remove_item(&line.product_id).await {
                warn!(
                    product_id = %line.product_id,
                    %error,
                    "failed to clear line on server; continuing"
                );
            }
        }
        count
    }

    /// Wholesale replacement used by reconciliation: the given cart becomes
    /// the new baseline, reordered by recency, and is persisted.
    pub(crate) fn adopt(&self, mut cart: Cart) {
        cart.normalize_order();
        let mut state = self.lock();
        state.replace(cart);
        self.store.save(&state.cart);
    }

    /// Restore `prior` unless a newer mutation already touched the key.
    fn rollback(&self, key: &LineKey, my_gen: u64, prior: Cart) {
        let mut state = self.lock();
        if state.line_generation(key) == Some(my_gen) {
            state.cart = prior;
            self.store.save(&state.cart);
        } else {
            debug!("skipping rollback for superseded mutation");
        }
    }
}

fn resolve_target(
    cart: &Cart,
    product_id: &ProductId,
    condition: Option<&Condition>,
) -> Result<LineKey, CartError> {
    match cart.lookup_key(product_id, condition) {
        KeyLookup::Found(key) => Ok(key),
        KeyLookup::Missing => Err(CartError::Validation(format!(
            "{product_id} is not in the cart"
        ))),
        KeyLookup::Ambiguous => Err(CartError::Validation(format!(
            "{product_id} has multiple condition variants in the cart; specify one"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::GatewayError;
    use crate::store::MemoryCartStore;
    use rust_decimal::Decimal;
    use std::sync::Arc;

    /// Gateway that panics on contact - guest flows must never reach it.
    struct NoRemote;

    impl RemoteCartGateway for NoRemote {
        async fn fetch(&self) -> Result<Cart, GatewayError> {
            panic!("guest flow touched the gateway");
        }

        async fn add_item(
            &self,
            _product_id: &ProductId,
            _quantity: u32,
            _condition: Option<&Condition>,
        ) -> Result<Cart, GatewayError> {
            panic!("guest flow touched the gateway");
        }

        async fn update_quantity(
            &self,
            _product_id: &ProductId,
            _quantity: u32,
        ) -> Result<(), GatewayError> {
            panic!("guest flow touched the gateway");
        }

        async fn remove_item(&self, _product_id: &ProductId) -> Result<(), GatewayError> {
            panic!("guest flow touched the gateway");
        }
    }

    fn draft(product: &str, qty: u32) -> LineDraft {
        LineDraft {
            product_id: ProductId::new(product),
            inventory_id: reloved_core::InventoryId::new(product),
            quantity: qty,
            unit_price: Decimal::new(999, 2),
            condition: None,
            display: crate::cart::LineDisplay::default(),
        }
    }

    #[tokio::test]
    async fn test_guest_mutations_persist_without_gateway_calls() {
        let store = Arc::new(MemoryCartStore::new());
        let machine = CartStateMachine::new(NoRemote, Arc::clone(&store), crate::identity::Guest);

        machine.add_line(draft("p1", 2)).await.expect("add");
        machine
            .update_quantity(&ProductId::new("p1"), 5, None)
            .await
            .expect("update");

        assert_eq!(machine.cart().total_quantity(), 5);
        // The durable store tracks every accepted mutation.
        assert_eq!(store.load(), machine.cart());

        machine
            .remove_line(&ProductId::new("p1"), None)
            .await
            .expect("remove");
        assert!(machine.cart().is_empty());
        assert!(store.load().is_empty());
    }

    #[tokio::test]
    async fn test_quantity_floor_delegates_to_remove() {
        let store = MemoryCartStore::new();
        let machine = CartStateMachine::new(NoRemote, store, crate::identity::Guest);

        machine.add_line(draft("p1", 2)).await.expect("add");
        machine
            .update_quantity(&ProductId::new("p1"), 0, None)
            .await
            .expect("update to zero");
        assert!(machine.cart().is_empty());

        machine.add_line(draft("p1", 2)).await.expect("add");
        machine
            .update_quantity(&ProductId::new("p1"), -3, None)
            .await
            .expect("negative update");
        assert!(machine.cart().is_empty());
    }

    #[tokio::test]
    async fn test_mutating_missing_line_fails_fast() {
        let store = MemoryCartStore::new();
        let machine = CartStateMachine::new(NoRemote, store, crate::identity::Guest);

        let err = machine
            .remove_line(&ProductId::new("ghost"), None)
            .await
            .expect_err("missing line");
        assert!(matches!(err, CartError::Validation(_)));

        let err = machine.add_line(draft("p1", 0)).await.expect_err("zero add");
        assert!(matches!(err, CartError::Validation(_)));
    }
}
