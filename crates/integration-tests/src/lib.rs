//! Integration tests for the Reloved cart sync engine.
//!
//! This crate provides shared test doubles for the engine's external
//! collaborators:
//!
//! - [`MockGateway`] - an in-process stand-in for the marketplace cart API.
//!   It simulates server-side cart state (adds merge, updates set, removes
//!   delete), records every call for assertions, and fails on request via
//!   [`FailRule`]s.
//! - [`ScriptedIdentity`] - an identity resolver whose login state the test
//!   flips at will.
//!
//! Scenario suites live under `tests/`:
//!
//! - `cart_mutations` - optimistic mutations, rollback, invariants
//! - `reconciliation` - the one-shot login reconciliation and its guard

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use secrecy::SecretString;

use reloved_cart_sync::{
    Cart, CartLine, GatewayError, Identity, IdentityKeyResolver, LineDisplay, LineDraft,
    RemoteCartGateway,
};
use reloved_core::{ActorRole, Condition, InventoryId, ProductId};

/// Install a test subscriber so `RUST_LOG=debug cargo test` shows engine
/// traces. Safe to call from every test; only the first call installs.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// =============================================================================
// Builders
// =============================================================================

/// A deterministic base instant for test timestamps.
#[must_use]
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0)
        .single()
        .expect("valid base time")
}

/// Build a cart line directly (for seeding stores and mock server state).
#[must_use]
pub fn line(product: &str, condition: Option<&str>, quantity: u32, added_secs: i64) -> CartLine {
    let unit_price = Decimal::new(1000, 2);
    let mut line = CartLine {
        product_id: ProductId::new(product),
        inventory_id: InventoryId::new(product),
        quantity,
        unit_price,
        subtotal: unit_price * Decimal::from(quantity),
        condition: condition.map(Condition::label),
        added_at: base_time() + Duration::seconds(added_secs),
        is_available: true,
        display: LineDisplay::default(),
    };
    line.display.name = format!("Test product {product}");
    line
}

/// Build a draft the way a product page would.
#[must_use]
pub fn draft(product: &str, condition: Option<&str>, quantity: u32) -> LineDraft {
    LineDraft {
        product_id: ProductId::new(product),
        inventory_id: InventoryId::new(product),
        quantity,
        unit_price: Decimal::new(1000, 2),
        condition: condition.map(Condition::label),
        display: LineDisplay {
            name: format!("Test product {product}"),
            ..LineDisplay::default()
        },
    }
}

// =============================================================================
// ScriptedIdentity
// =============================================================================

#[derive(Debug, Default)]
struct ScriptState {
    identity: Option<Identity>,
    token: Option<String>,
}

/// Identity resolver whose authentication state tests flip at will.
#[derive(Debug, Clone, Default)]
pub struct ScriptedIdentity {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedIdentity {
    /// Start as a guest.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ScriptState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Become an authenticated actor of the given role.
    pub fn log_in(&self, role: ActorRole) {
        let mut state = self.lock();
        state.identity = Some(Identity {
            id: "actor-1".to_string(),
            role,
        });
        state.token = Some("test-bearer-token".to_string());
    }

    /// Back to guest.
    pub fn log_out(&self) {
        let mut state = self.lock();
        state.identity = None;
        state.token = None;
    }
}

impl IdentityKeyResolver for ScriptedIdentity {
    fn identity(&self) -> Option<Identity> {
        self.lock().identity.clone()
    }

    fn auth_token(&self) -> Option<SecretString> {
        self.lock().token.as_deref().map(SecretString::from)
    }
}

// =============================================================================
// MockGateway
// =============================================================================

/// When a scripted gateway operation should fail.
#[derive(Debug, Clone, Default)]
pub enum FailRule {
    #[default]
    Never,
    Always,
    ForProduct(ProductId),
}

impl FailRule {
    fn applies(&self, product_id: &ProductId) -> bool {
        match self {
            Self::Never => false,
            Self::Always => true,
            Self::ForProduct(target) => target == product_id,
        }
    }
}

/// One recorded `add_item` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedAdd {
    pub product_id: ProductId,
    pub quantity: u32,
    pub condition: Option<Condition>,
}

#[derive(Debug, Default)]
struct MockState {
    remote: Cart,
    fetch_calls: usize,
    add_calls: Vec<RecordedAdd>,
    update_calls: Vec<(ProductId, u32)>,
    remove_calls: Vec<ProductId>,
    fail_fetch: bool,
    fail_update: bool,
    fail_adds: FailRule,
    fail_removes: FailRule,
    clock_secs: i64,
}

/// In-process stand-in for the marketplace cart API.
///
/// Simulates an authoritative server cart: adds increment by the given
/// delta (creating the line on first add), updates set absolute quantities,
/// removes delete every line of the product. All calls are recorded.
#[derive(Debug, Clone, Default)]
pub struct MockGateway {
    state: Arc<Mutex<MockState>>,
}

impl MockGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Replace the simulated server cart.
    pub fn set_remote(&self, cart: Cart) {
        self.lock().remote = cart;
    }

    /// The simulated server cart as it stands.
    #[must_use]
    pub fn remote_cart(&self) -> Cart {
        self.lock().remote.clone()
    }

    pub fn fail_fetch(&self, fail: bool) {
        self.lock().fail_fetch = fail;
    }

    pub fn fail_update(&self, fail: bool) {
        self.lock().fail_update = fail;
    }

    pub fn set_add_failures(&self, rule: FailRule) {
        self.lock().fail_adds = rule;
    }

    pub fn set_remove_failures(&self, rule: FailRule) {
        self.lock().fail_removes = rule;
    }

    #[must_use]
    pub fn fetch_calls(&self) -> usize {
        self.lock().fetch_calls
    }

    #[must_use]
    pub fn add_calls(&self) -> Vec<RecordedAdd> {
        self.lock().add_calls.clone()
    }

    #[must_use]
    pub fn update_calls(&self) -> Vec<(ProductId, u32)> {
        self.lock().update_calls.clone()
    }

    #[must_use]
    pub fn remove_calls(&self) -> Vec<ProductId> {
        self.lock().remove_calls.clone()
    }

    /// Total calls of any kind (for "no network traffic" assertions).
    #[must_use]
    pub fn total_calls(&self) -> usize {
        let state = self.lock();
        state.fetch_calls
            + state.add_calls.len()
            + state.update_calls.len()
            + state.remove_calls.len()
    }
}

impl RemoteCartGateway for MockGateway {
    async fn fetch(&self) -> Result<Cart, GatewayError> {
        let mut state = self.lock();
        state.fetch_calls += 1;
        if state.fail_fetch {
            return Err(GatewayError::Server("scripted fetch failure".to_string()));
        }
        Ok(state.remote.clone())
    }

    async fn add_item(
        &self,
        product_id: &ProductId,
        quantity: u32,
        condition: Option<&Condition>,
    ) -> Result<Cart, GatewayError> {
        let mut state = self.lock();
        state.add_calls.push(RecordedAdd {
            product_id: product_id.clone(),
            quantity,
            condition: condition.cloned(),
        });
        if state.fail_adds.applies(product_id) {
            return Err(GatewayError::Validation(
                "scripted add rejection".to_string(),
            ));
        }
        state.clock_secs += 1;
        let now = base_time() + Duration::seconds(1_000 + state.clock_secs);
        state.remote.merge_or_prepend(
            LineDraft {
                product_id: product_id.clone(),
                inventory_id: InventoryId::new(product_id.as_str()),
                quantity,
                unit_price: Decimal::new(1000, 2),
                condition: condition.cloned(),
                display: LineDisplay::default(),
            },
            now,
        );
        Ok(state.remote.clone())
    }

    async fn update_quantity(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<(), GatewayError> {
        let mut state = self.lock();
        state.update_calls.push((product_id.clone(), quantity));
        if state.fail_update {
            return Err(GatewayError::Server("scripted update failure".to_string()));
        }
        state.clock_secs += 1;
        let now = base_time() + Duration::seconds(1_000 + state.clock_secs);
        let keys: Vec<_> = state
            .remote
            .lines()
            .iter()
            .filter(|l| &l.product_id == product_id)
            .map(CartLine::key)
            .collect();
        for key in keys {
            state.remote.set_quantity(&key, quantity, now);
        }
        Ok(())
    }

    async fn remove_item(&self, product_id: &ProductId) -> Result<(), GatewayError> {
        let mut state = self.lock();
        state.remove_calls.push(product_id.clone());
        if state.fail_removes.applies(product_id) {
            return Err(GatewayError::Server("scripted remove failure".to_string()));
        }
        let keys: Vec<_> = state
            .remote
            .lines()
            .iter()
            .filter(|l| &l.product_id == product_id)
            .map(CartLine::key)
            .collect();
        for key in keys {
            state.remote.remove(&key);
        }
        Ok(())
    }
}
