//! Integration tests for the sign-in / sign-out cart lifecycle.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;
use std::time::Duration;

use cartwright::{AuthTransition, CartController, CartSnapshot, SessionIdentity, SyncOutcome};
use cartwright_core::{CartLine, ProductKey};
use cartwright_integration_tests::{Call, Failure, MockCartService, product};
use tokio::sync::watch;

fn seeded_service() -> MockCartService {
    MockCartService::new().with_lines(vec![
        CartLine::new(product("p1", 10), 2),
        CartLine::new(product("p2", 5), 1),
    ])
}

/// Wait for a snapshot matching `predicate`, releasing the borrow right away.
async fn wait_until(
    receiver: &mut watch::Receiver<CartSnapshot>,
    predicate: impl FnMut(&CartSnapshot) -> bool,
) -> CartSnapshot {
    tokio::time::timeout(Duration::from_secs(5), receiver.wait_for(predicate))
        .await
        .expect("timed out waiting for cart snapshot")
        .expect("controller dropped")
        .clone()
}

// =============================================================================
// Single transitions
// =============================================================================

#[tokio::test]
async fn test_sign_in_edge_loads_cart() {
    let service = seeded_service();
    let controller = CartController::new(service.clone(), SessionIdentity::new(true));

    let transition = controller.apply_auth_transition(false, true).await;

    assert_eq!(transition, AuthTransition::SignedIn(SyncOutcome::Applied));
    assert_eq!(controller.snapshot().item_count, 3);
    assert_eq!(service.calls(), vec![Call::Get]);
}

#[tokio::test]
async fn test_sign_out_edge_clears_locally_only() {
    let service = seeded_service();
    let controller = CartController::new(service.clone(), SessionIdentity::new(true));
    controller.load_cart().await;

    let transition = controller.apply_auth_transition(true, false).await;

    assert_eq!(transition, AuthTransition::SignedOut);
    assert_eq!(controller.snapshot(), CartSnapshot::default());
    assert_eq!(service.calls(), vec![Call::Get]);
    assert_eq!(service.server_lines().len(), 2);
}

#[tokio::test]
async fn test_equal_values_are_not_an_edge() {
    let service = seeded_service();
    let controller = CartController::new(service.clone(), SessionIdentity::new(true));

    assert_eq!(
        controller.apply_auth_transition(true, true).await,
        AuthTransition::Unchanged
    );
    assert_eq!(
        controller.apply_auth_transition(false, false).await,
        AuthTransition::Unchanged
    );
    assert!(service.calls().is_empty());
}

#[tokio::test]
async fn test_logout_cleanup_is_unconditional() {
    let service = seeded_service();
    let controller = CartController::new(service.clone(), SessionIdentity::new(true));
    controller.load_cart().await;

    service.fail_with(Failure::Transport);
    controller.logout_cleanup();
    controller.logout_cleanup();

    assert!(controller.snapshot().is_empty());
    assert!(!controller.is_in_cart(&ProductKey::new("p1")));
    assert_eq!(service.calls(), vec![Call::Get]);
}

// =============================================================================
// Calls straddling a sign-out
// =============================================================================

#[tokio::test]
async fn test_add_finishing_after_sign_out_is_not_applied() {
    let service = MockCartService::new();
    let identity = SessionIdentity::new(true);
    let controller = Arc::new(CartController::new(service.clone(), identity.clone()));
    let mut updates = controller.subscribe();
    let gate = service.hold(Call::Add(ProductKey::new("p1"), 1));

    let pending = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move {
            let p1 = product("p1", 10);
            controller.add_item(&p1).await
        }
    });
    wait_until(&mut updates, |s| s.is_syncing).await;

    identity.sign_out();
    assert_eq!(
        controller.apply_auth_transition(true, false).await,
        AuthTransition::SignedOut
    );
    gate.notify_one();

    assert_eq!(pending.await.unwrap(), Ok(SyncOutcome::Skipped));
    assert_eq!(controller.snapshot(), CartSnapshot::default());
    // The service applied it; the account keeps the line for next sign-in.
    assert_eq!(service.server_lines().len(), 1);
}

#[tokio::test]
async fn test_load_finishing_after_sign_out_is_discarded() {
    let service = seeded_service();
    let identity = SessionIdentity::new(true);
    let controller = Arc::new(CartController::new(service.clone(), identity.clone()));
    let mut updates = controller.subscribe();
    let gate = service.hold(Call::Get);

    let pending = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.load_cart().await }
    });
    wait_until(&mut updates, |s| s.is_syncing).await;

    identity.sign_out();
    controller.logout_cleanup();
    gate.notify_one();

    assert_eq!(pending.await.unwrap(), SyncOutcome::Skipped);
    assert_eq!(controller.snapshot(), CartSnapshot::default());
}

#[tokio::test]
async fn test_failure_after_sign_out_leaves_no_error() {
    let service = MockCartService::new();
    let identity = SessionIdentity::new(true);
    let controller = Arc::new(CartController::new(service.clone(), identity.clone()));
    let mut updates = controller.subscribe();
    let gate = service.hold(Call::Clear);

    let pending = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.clear_cart().await }
    });
    wait_until(&mut updates, |s| s.is_syncing).await;

    controller.logout_cleanup();
    service.fail_with(Failure::Transport);
    gate.notify_one();

    assert!(matches!(pending.await.unwrap(), Ok(SyncOutcome::Failed(_))));
    assert_eq!(controller.snapshot(), CartSnapshot::default());
}

// =============================================================================
// Lifecycle task
// =============================================================================

#[tokio::test]
async fn test_lifecycle_follows_identity() {
    let service = seeded_service();
    let identity = SessionIdentity::signed_out();
    let controller = Arc::new(CartController::new(service.clone(), identity.clone()));
    let mut updates = controller.subscribe();

    let task = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.run_auth_lifecycle().await }
    });

    identity.sign_in();
    let loaded = wait_until(&mut updates, |s| s.item_count == 3 && !s.is_syncing).await;
    assert_eq!(loaded.lines.len(), 2);

    // Repeating the same value fires nothing.
    identity.sign_in();
    tokio::task::yield_now().await;

    identity.sign_out();
    let cleared = wait_until(&mut updates, CartSnapshot::is_empty).await;
    assert_eq!(cleared, CartSnapshot::default());

    // The server-side cart survives the session and comes back on sign-in.
    identity.sign_in();
    let reloaded = wait_until(&mut updates, |s| s.item_count == 3 && !s.is_syncing).await;
    assert_eq!(reloaded.lines, loaded.lines);

    assert_eq!(service.calls(), vec![Call::Get, Call::Get]);
    task.abort();
}

#[tokio::test]
async fn test_lifecycle_loads_when_already_signed_in() {
    let service = seeded_service();
    let identity = SessionIdentity::new(true);
    let controller = Arc::new(CartController::new(service.clone(), identity.clone()));
    let mut updates = controller.subscribe();

    let task = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.run_auth_lifecycle().await }
    });

    let loaded = wait_until(&mut updates, |s| s.item_count == 3).await;
    assert_eq!(loaded.total, rust_decimal::Decimal::new(25, 0));
    assert_eq!(service.calls(), vec![Call::Get]);
    task.abort();
}
