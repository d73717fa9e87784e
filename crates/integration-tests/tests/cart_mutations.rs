//! Integration tests for optimistic cart mutations.
//!
//! These tests drive the state machine against the mock gateway and verify
//! the merge/ordering/uniqueness invariants, exact-snapshot rollback, and
//! the guest/authenticated write-through split.

use std::sync::Arc;

use reloved_cart_sync::{CartError, CartStateMachine, CartStore, MemoryCartStore};
use reloved_core::{ActorRole, Condition, ProductId};

use reloved_integration_tests::{FailRule, MockGateway, ScriptedIdentity, draft, init_tracing};

fn logged_in_machine() -> (
    CartStateMachine<MockGateway, Arc<MemoryCartStore>, ScriptedIdentity>,
    MockGateway,
    Arc<MemoryCartStore>,
) {
    init_tracing();
    let gateway = MockGateway::new();
    let store = Arc::new(MemoryCartStore::new());
    let identity = ScriptedIdentity::new();
    identity.log_in(ActorRole::Customer);
    let machine = CartStateMachine::new(gateway.clone(), Arc::clone(&store), identity);
    (machine, gateway, store)
}

// =============================================================================
// Merge / Ordering / Uniqueness
// =============================================================================

#[tokio::test]
async fn test_adding_same_variant_twice_merges_into_one_line() {
    let (machine, gateway, _store) = logged_in_machine();

    machine
        .add_line(draft("a", Some("Good"), 1))
        .await
        .expect("first add");
    machine
        .add_line(draft("a", Some("Good"), 1))
        .await
        .expect("second add");

    let cart = machine.cart();
    assert_eq!(cart.len(), 1);
    let line = cart.lines().first().expect("one line");
    assert_eq!(line.quantity, 2);

    // The server saw two incremental deltas of 1, never a doubled total.
    let adds = gateway.add_calls();
    assert_eq!(adds.len(), 2);
    assert!(adds.iter().all(|a| a.quantity == 1));
    assert_eq!(gateway.remote_cart().total_quantity(), 2);
}

#[tokio::test]
async fn test_no_two_lines_share_product_and_condition() {
    let (machine, _gateway, _store) = logged_in_machine();

    machine
        .add_line(draft("a", Some("Good"), 1))
        .await
        .expect("add");
    machine
        .add_line(draft("a", Some("Fair"), 1))
        .await
        .expect("add");
    machine
        .add_line(draft("a", Some("Good"), 2))
        .await
        .expect("add");

    let cart = machine.cart();
    assert_eq!(cart.len(), 2);
    for (i, a) in cart.lines().iter().enumerate() {
        for b in cart.lines().iter().skip(i + 1) {
            assert_ne!(a.key(), b.key(), "duplicate (product, condition) key");
        }
    }
}

#[tokio::test]
async fn test_mutated_line_is_at_index_zero() {
    let (machine, _gateway, _store) = logged_in_machine();

    machine.add_line(draft("a", None, 1)).await.expect("add a");
    machine.add_line(draft("b", None, 1)).await.expect("add b");
    assert_eq!(
        machine.cart().lines().first().expect("line").product_id,
        ProductId::new("b")
    );

    machine
        .update_quantity(&ProductId::new("a"), 4, None)
        .await
        .expect("update a");
    let cart = machine.cart();
    let first = cart.lines().first().expect("line");
    assert_eq!(first.product_id, ProductId::new("a"));
    assert_eq!(first.quantity, 4);
}

// =============================================================================
// Rollback
// =============================================================================

#[tokio::test]
async fn test_failed_update_restores_exact_prior_snapshot() {
    let (machine, gateway, store) = logged_in_machine();

    machine
        .add_line(draft("x", Some("Good"), 2))
        .await
        .expect("add");
    machine.add_line(draft("y", None, 1)).await.expect("add");
    let before = machine.cart();

    gateway.fail_update(true);
    let err = machine
        .update_quantity(&ProductId::new("x"), 5, Some(&Condition::label("Good")))
        .await
        .expect_err("update should fail");
    assert!(matches!(err, CartError::Remote(_)));

    assert_eq!(machine.cart(), before, "cart must equal the prior snapshot");
    // The rolled-back state is also what was persisted.
    assert_eq!(store.load(), before);
}

#[tokio::test]
async fn test_failed_remove_restores_exact_prior_snapshot() {
    let (machine, gateway, _store) = logged_in_machine();

    machine
        .add_line(draft("x", Some("Good"), 2))
        .await
        .expect("add");
    let before = machine.cart();

    gateway.set_remove_failures(FailRule::Always);
    machine
        .remove_line(&ProductId::new("x"), Some(&Condition::label("Good")))
        .await
        .expect_err("remove should fail");

    assert_eq!(machine.cart(), before);
}

#[tokio::test]
async fn test_failed_add_is_rolled_back_uniformly() {
    let (machine, gateway, store) = logged_in_machine();

    machine.add_line(draft("a", None, 1)).await.expect("add");
    let before = machine.cart();

    gateway.set_add_failures(FailRule::Always);
    let err = machine
        .add_line(draft("b", None, 3))
        .await
        .expect_err("add should fail");
    assert!(matches!(err, CartError::Remote(_)));

    // No speculative local-only line survives the failure.
    assert_eq!(machine.cart(), before);
    assert_eq!(store.load(), before);
}

// =============================================================================
// Quantity floor / targeting
// =============================================================================

#[tokio::test]
async fn test_zero_and_negative_quantities_remove_the_line() {
    let (machine, gateway, _store) = logged_in_machine();

    machine.add_line(draft("x", None, 2)).await.expect("add");
    machine
        .update_quantity(&ProductId::new("x"), 0, None)
        .await
        .expect("update to zero");
    assert!(machine.cart().is_empty());

    machine.add_line(draft("x", None, 2)).await.expect("add");
    machine
        .update_quantity(&ProductId::new("x"), -3, None)
        .await
        .expect("negative update");
    assert!(machine.cart().is_empty());

    // Both went through the remove endpoint, not the update endpoint.
    assert_eq!(gateway.remove_calls().len(), 2);
    assert!(gateway.update_calls().is_empty());
    assert!(gateway.remote_cart().is_empty());
}

#[tokio::test]
async fn test_condition_less_removal_with_multiple_variants_is_rejected() {
    let (machine, gateway, _store) = logged_in_machine();

    machine
        .add_line(draft("a", Some("Good"), 1))
        .await
        .expect("add");
    machine
        .add_line(draft("a", Some("Fair"), 1))
        .await
        .expect("add");
    let before = machine.cart();
    let calls_before = gateway.total_calls();

    let err = machine
        .remove_line(&ProductId::new("a"), None)
        .await
        .expect_err("ambiguous removal");
    assert!(matches!(err, CartError::Validation(_)));

    // Fails fast: cart untouched, no network call issued.
    assert_eq!(machine.cart(), before);
    assert_eq!(gateway.total_calls(), calls_before);
}

#[tokio::test]
async fn test_removing_missing_line_fails_fast() {
    let (machine, gateway, _store) = logged_in_machine();
    let calls_before = gateway.total_calls();

    let err = machine
        .remove_line(&ProductId::new("ghost"), None)
        .await
        .expect_err("missing line");
    assert!(matches!(err, CartError::Validation(_)));
    assert_eq!(gateway.total_calls(), calls_before);
}

// =============================================================================
// Clear
// =============================================================================

#[tokio::test]
async fn test_clear_is_best_effort_per_line() {
    let (machine, gateway, store) = logged_in_machine();

    machine.add_line(draft("a", None, 1)).await.expect("add");
    machine.add_line(draft("b", None, 1)).await.expect("add");
    machine.add_line(draft("c", None, 1)).await.expect("add");

    // One line refuses to die on the server.
    gateway.set_remove_failures(FailRule::ForProduct(ProductId::new("b")));

    let count = machine.clear().await;
    assert_eq!(count, 3);

    // Local cart (and its durable blob) are empty regardless.
    assert!(machine.cart().is_empty());
    assert!(store.load().is_empty());

    // All three removes were attempted; the failure did not stop the rest.
    assert_eq!(gateway.remove_calls().len(), 3);

    // The failed line lingers server-side - accepted until the next
    // reconciliation.
    let remote = gateway.remote_cart();
    assert_eq!(remote.len(), 1);
    assert_eq!(
        remote.lines().first().expect("line").product_id,
        ProductId::new("b")
    );
}

// =============================================================================
// Guest mode
// =============================================================================

#[tokio::test]
async fn test_guest_mutations_issue_no_gateway_calls() {
    let gateway = MockGateway::new();
    let store = Arc::new(MemoryCartStore::new());
    let identity = ScriptedIdentity::new();
    let machine = CartStateMachine::new(gateway.clone(), Arc::clone(&store), identity);

    machine.add_line(draft("a", None, 2)).await.expect("add");
    machine
        .update_quantity(&ProductId::new("a"), 4, None)
        .await
        .expect("update");

    // The durable blob is a plain line array, updated on every mutation.
    let blob = store.raw_blob().expect("blob written");
    let parsed: serde_json::Value = serde_json::from_str(&blob).expect("valid JSON");
    assert!(parsed.is_array());
    assert_eq!(parsed.as_array().map(Vec::len), Some(1));

    machine.clear().await;

    assert_eq!(gateway.total_calls(), 0);
    assert!(store.load().is_empty());
}
