//! Integration tests for the cart controller's write-through behavior.
//!
//! These run the controller against the in-memory Cart Service and check
//! that the local snapshot only ever reflects confirmed server state.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;
use std::time::Duration;

use cartwright::{
    CartController, CartError, CartSnapshot, NoticeLevel, SessionIdentity, SyncOutcome,
};
use cartwright_core::{CartLine, ProductKey, ProductRef};
use cartwright_integration_tests::{
    Call, Failure, MockCartService, PayloadShape, RecordingNotifier, product,
};
use rust_decimal::Decimal;

type Controller = CartController<MockCartService, SessionIdentity>;

fn signed_in(service: &MockCartService) -> (Controller, RecordingNotifier) {
    let notifier = RecordingNotifier::new();
    let controller = CartController::new(service.clone(), SessionIdentity::new(true))
        .with_notifier(Arc::new(notifier.clone()));
    (controller, notifier)
}

fn key(id: &str) -> ProductKey {
    ProductKey::new(id)
}

// =============================================================================
// Authentication gate
// =============================================================================

#[tokio::test]
async fn test_add_while_signed_out_makes_no_call() {
    let service = MockCartService::new();
    let controller = CartController::new(service.clone(), SessionIdentity::signed_out());

    let result = controller.add_item(&product("p1", 10)).await;

    assert_eq!(result, Err(CartError::Unauthenticated));
    assert!(result.unwrap_err().requires_login());
    assert!(service.calls().is_empty());
    assert_eq!(controller.snapshot(), CartSnapshot::default());
}

#[tokio::test]
async fn test_every_mutation_requires_a_session() {
    let service = MockCartService::new();
    let controller = CartController::new(service.clone(), SessionIdentity::signed_out());

    assert_eq!(
        controller.remove_item(&key("p1")).await,
        Err(CartError::Unauthenticated)
    );
    assert_eq!(
        controller.update_quantity(&key("p1"), 2).await,
        Err(CartError::Unauthenticated)
    );
    assert_eq!(
        controller.clear_cart().await,
        Err(CartError::Unauthenticated)
    );
    assert_eq!(controller.load_cart().await, SyncOutcome::Skipped);
    assert!(service.calls().is_empty());
}

// =============================================================================
// Write-through mutations
// =============================================================================

#[tokio::test]
async fn test_add_item_applies_after_ack() {
    let service = MockCartService::new();
    let (controller, notifier) = signed_in(&service);

    for _ in 0..3 {
        let outcome = controller.add_item(&product("p1", 10)).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Applied);
    }

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.lines.len(), 1);
    assert_eq!(snapshot.lines[0].quantity, 3);
    assert_eq!(snapshot.total, Decimal::new(30, 0));
    assert_eq!(snapshot.item_count, 3);
    assert!(!snapshot.is_syncing);
    assert_eq!(service.calls(), vec![Call::Add(key("p1"), 1); 3]);

    let notices = notifier.notices();
    assert_eq!(notices.len(), 3);
    assert!(notices.iter().all(|n| n.level == NoticeLevel::Success));
    assert_eq!(notices[0].message, "Product p1 added to cart");
}

#[tokio::test]
async fn test_failed_add_leaves_cart_unchanged() {
    let service = MockCartService::new();
    let (controller, notifier) = signed_in(&service);
    controller.add_item(&product("p1", 10)).await.unwrap();
    let before = controller.snapshot();

    service.fail_with(Failure::Transport);
    let outcome = controller.add_item(&product("p2", 5)).await.unwrap();

    let after = controller.snapshot();
    assert!(matches!(outcome, SyncOutcome::Failed(_)));
    assert_eq!(after.lines, before.lines);
    assert_eq!(after.total, before.total);
    assert_eq!(after.item_count, before.item_count);
    assert!(!after.is_syncing);
    assert_eq!(
        after.last_error.as_deref(),
        Some("Could not reach the cart service")
    );
    assert!(!controller.is_in_cart(&key("p2")));
    assert_eq!(notifier.notices().last().unwrap().level, NoticeLevel::Error);
}

#[tokio::test]
async fn test_rejected_ack_is_a_failure() {
    let service = MockCartService::new();
    let (controller, _notifier) = signed_in(&service);

    service.fail_with(Failure::Rejected("Product is out of stock".to_string()));
    let outcome = controller.add_item(&product("p1", 10)).await.unwrap();

    assert_eq!(
        outcome,
        SyncOutcome::Failed("Product is out of stock".to_string())
    );
    assert!(controller.snapshot().is_empty());
    assert_eq!(
        controller.snapshot().last_error.as_deref(),
        Some("Product is out of stock")
    );
}

#[tokio::test]
async fn test_add_product_without_identifier() {
    let service = MockCartService::new();
    let (controller, notifier) = signed_in(&service);
    let anonymous = ProductRef {
        price: Some(Decimal::ONE),
        ..ProductRef::default()
    };

    let result = controller.add_item(&anonymous).await;

    assert!(matches!(result, Err(CartError::InvalidProduct(_))));
    assert!(service.calls().is_empty());
    assert!(controller.snapshot().is_empty());
    assert_eq!(notifier.notices()[0].level, NoticeLevel::Error);
}

#[tokio::test]
async fn test_empty_key_is_refused_with_notice() {
    let service = MockCartService::new();
    let (controller, notifier) = signed_in(&service);

    assert!(matches!(
        controller.remove_item(&key("")).await,
        Err(CartError::InvalidProduct(_))
    ));
    assert!(matches!(
        controller.update_quantity(&key(""), 2).await,
        Err(CartError::InvalidProduct(_))
    ));

    assert!(service.calls().is_empty());
    let notices = notifier.notices();
    assert_eq!(notices.len(), 2);
    assert!(notices.iter().all(|n| n.level == NoticeLevel::Error));
}

#[tokio::test]
async fn test_remove_and_update() {
    let service = MockCartService::new().with_lines(vec![
        CartLine::new(product("p1", 10), 2),
        CartLine::new(product("p2", 5), 1),
    ]);
    let (controller, _notifier) = signed_in(&service);
    controller.load_cart().await;

    controller.remove_item(&key("p1")).await.unwrap();
    let snapshot = controller.snapshot();
    assert_eq!(snapshot.lines.len(), 1);
    assert_eq!(snapshot.total, Decimal::new(5, 0));
    assert_eq!(snapshot.item_count, 1);

    controller.update_quantity(&key("p2"), 4).await.unwrap();
    assert_eq!(controller.item_quantity(&key("p2")), 4);
    assert_eq!(controller.snapshot().total, Decimal::new(20, 0));

    assert_eq!(
        service.calls(),
        vec![Call::Get, Call::Remove(key("p1")), Call::Update(key("p2"), 4)]
    );
}

#[tokio::test]
async fn test_update_quantity_rejects_non_positive() {
    let service = MockCartService::new().with_lines(vec![CartLine::new(product("p1", 10), 2)]);
    let (controller, _notifier) = signed_in(&service);
    controller.load_cart().await;

    assert_eq!(
        controller.update_quantity(&key("p1"), 0).await,
        Err(CartError::InvalidQuantity(0))
    );
    assert_eq!(
        controller.update_quantity(&key("p1"), -3).await,
        Err(CartError::InvalidQuantity(-3))
    );
    assert_eq!(service.calls(), vec![Call::Get]);
    assert_eq!(controller.item_quantity(&key("p1")), 2);
}

#[tokio::test]
async fn test_failed_remove_keeps_line() {
    let service = MockCartService::new().with_lines(vec![CartLine::new(product("p1", 10), 2)]);
    let (controller, _notifier) = signed_in(&service);
    controller.load_cart().await;

    service.fail_with(Failure::Transport);
    let outcome = controller.remove_item(&key("p1")).await.unwrap();

    assert!(!outcome.is_applied());
    assert!(controller.is_in_cart(&key("p1")));
    assert_eq!(controller.item_quantity(&key("p1")), 2);
}

#[tokio::test]
async fn test_clear_cart() {
    let service = MockCartService::new().with_lines(vec![CartLine::new(product("p1", 10), 2)]);
    let (controller, _notifier) = signed_in(&service);
    controller.load_cart().await;

    service.fail_with(Failure::Transport);
    controller.clear_cart().await.unwrap();
    assert!(controller.is_in_cart(&key("p1")));

    service.recover();
    let outcome = controller.clear_cart().await.unwrap();
    assert_eq!(outcome, SyncOutcome::Applied);
    assert_eq!(controller.snapshot(), CartSnapshot::default());
    assert!(service.server_lines().is_empty());
}

// =============================================================================
// Loading
// =============================================================================

#[tokio::test]
async fn test_load_cart_accepts_both_shapes() {
    let lines = vec![
        CartLine::new(ProductRef::with_server_id("p1", Decimal::TEN), 2),
        CartLine::new(product("p2", 5), 1),
    ];
    let bare = MockCartService::new().with_lines(lines.clone());
    let wrapped = MockCartService::new()
        .with_lines(lines)
        .with_shape(PayloadShape::Wrapped);

    let (bare_controller, _) = signed_in(&bare);
    let (wrapped_controller, _) = signed_in(&wrapped);
    bare_controller.load_cart().await;
    wrapped_controller.load_cart().await;

    assert_eq!(bare_controller.snapshot(), wrapped_controller.snapshot());
    assert_eq!(bare_controller.snapshot().total, Decimal::new(25, 0));
    // Server-issued ids are copied into the catalog field on load.
    let snapshot = bare_controller.snapshot();
    assert_eq!(snapshot.lines[0].product.id.as_deref(), Some("p1"));
}

#[tokio::test]
async fn test_failed_load_keeps_previous_lines() {
    let service = MockCartService::new().with_lines(vec![CartLine::new(product("p1", 10), 2)]);
    let (controller, notifier) = signed_in(&service);
    controller.load_cart().await;

    service.fail_with(Failure::Transport);
    let outcome = controller.refresh_cart().await;

    assert!(matches!(outcome, SyncOutcome::Failed(_)));
    assert_eq!(controller.item_quantity(&key("p1")), 2);
    assert!(controller.snapshot().last_error.is_some());
    assert!(notifier.notices().is_empty());

    service.recover();
    controller.refresh_cart().await;
    assert!(controller.snapshot().last_error.is_none());
}

// =============================================================================
// Timeouts and concurrency
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_hung_call_times_out_and_clears_sync_flag() {
    let service = MockCartService::new();
    let (controller, _notifier) = signed_in(&service);
    let controller = controller.with_request_timeout(Duration::from_secs(5));

    service.fail_with(Failure::Hang);
    let outcome = controller.add_item(&product("p1", 10)).await.unwrap();

    assert_eq!(
        outcome,
        SyncOutcome::Failed("The cart service is not responding".to_string())
    );
    let snapshot = controller.snapshot();
    assert!(!snapshot.is_syncing);
    assert!(snapshot.is_empty());
}

#[tokio::test]
async fn test_subscribers_see_settled_snapshot() {
    let service = MockCartService::new();
    let (controller, _notifier) = signed_in(&service);
    let mut updates = controller.subscribe();

    controller.add_item(&product("p1", 10)).await.unwrap();

    // The receiver sees only the latest value, which is settled.
    assert!(updates.has_changed().unwrap());
    let latest = updates.borrow_and_update().clone();
    assert!(!latest.is_syncing);
    assert_eq!(latest.item_count, 1);
}

#[tokio::test]
async fn test_concurrent_adds_for_different_products() {
    let service = MockCartService::new();
    let (controller, _notifier) = signed_in(&service);

    let (p1, p2) = (product("p1", 10), product("p2", 5));

    let (a, b, c) = tokio::join!(
        controller.add_item(&p1),
        controller.add_item(&p2),
        controller.add_item(&p1),
    );
    assert!(a.unwrap().is_applied());
    assert!(b.unwrap().is_applied());
    assert!(c.unwrap().is_applied());

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.lines.len(), 2);
    assert_eq!(controller.item_quantity(&key("p1")), 2);
    assert_eq!(controller.item_quantity(&key("p2")), 1);
    assert_eq!(snapshot.total, Decimal::new(25, 0));
    assert!(!snapshot.is_syncing);
}

#[tokio::test]
async fn test_is_syncing_until_last_call_settles() {
    let service = MockCartService::new();
    let (controller, _notifier) = signed_in(&service);
    let controller = Arc::new(controller);
    let mut updates = controller.subscribe();
    let _gate = service.hold(Call::Add(key("p1"), 1));

    let slow = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move {
            let p1 = product("p1", 10);
            controller.add_item(&p1).await
        }
    });
    assert!(updates.wait_for(|s| s.is_syncing).await.unwrap().is_syncing);

    // A faster overlapping call finishes first; the held one is still out.
    let p2 = product("p2", 5);
    assert!(controller.add_item(&p2).await.unwrap().is_applied());
    let snapshot = controller.snapshot();
    assert!(snapshot.is_syncing);
    assert_eq!(controller.item_quantity(&key("p2")), 1);

    // Dropping the held call mid-flight still lowers the flag.
    slow.abort();
    assert!(slow.await.unwrap_err().is_cancelled());
    let snapshot = controller.snapshot();
    assert!(!snapshot.is_syncing);
    assert!(!controller.is_in_cart(&key("p1")));
    assert_eq!(
        service.calls(),
        vec![Call::Add(key("p1"), 1), Call::Add(key("p2"), 1)]
    );
}
