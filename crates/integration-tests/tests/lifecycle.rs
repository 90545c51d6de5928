//! Admin status changes on stored orders.

#![allow(clippy::unwrap_used)]

use greenbasket_core::order::Order;
use greenbasket_core::types::{OrderId, OrderStatus};
use greenbasket_integration_tests::{
    HOME, Harness, SHOPPER, captured, home_delivery, item, line, online, pickup, signed_proof,
};
use greenbasket_storefront::services::OrderError;

async fn cod_home_order(h: &Harness) -> Order {
    h.catalog.insert_item(item(1, 100, 10, true));
    h.services
        .finalizer
        .place_cod_order(SHOPPER, &home_delivery(HOME, vec![line(1, 2)]))
        .await
        .unwrap()
}

async fn walk(h: &Harness, id: OrderId, path: &[OrderStatus]) -> Order {
    let mut last = None;
    for &status in path {
        last = Some(h.services.order_status.update_status(id, status).await.unwrap());
    }
    last.unwrap()
}

#[tokio::test]
async fn test_cod_delivery_marks_paid_and_delivered() {
    let h = Harness::new();
    let order = cod_home_order(&h).await;

    let delivered = walk(
        &h,
        order.id,
        &[
            OrderStatus::Confirmed,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::OutForDelivery,
            OrderStatus::Delivered,
        ],
    )
    .await;

    assert_eq!(delivered.status, OrderStatus::Delivered);
    assert!(delivered.is_delivered);
    assert!(delivered.delivered_at.is_some());
    assert!(delivered.is_paid);
    let snapshot = delivered.payment_result.as_ref().unwrap();
    assert_eq!(snapshot.id, format!("COD-{}", order.id));
    assert_eq!(snapshot.status, "COMPLETED");

    let stored = h.orders.get(order.id).unwrap();
    assert_eq!(stored, delivered);
}

#[tokio::test]
async fn test_repeating_a_status_changes_nothing() {
    let h = Harness::new();
    let order = cod_home_order(&h).await;
    let delivered = walk(
        &h,
        order.id,
        &[
            OrderStatus::Confirmed,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::OutForDelivery,
            OrderStatus::Delivered,
        ],
    )
    .await;

    let again = h
        .services
        .order_status
        .update_status(order.id, OrderStatus::Delivered)
        .await
        .unwrap();

    assert_eq!(again.delivered_at, delivered.delivered_at);
    assert_eq!(again.paid_at, delivered.paid_at);
}

#[tokio::test]
async fn test_terminal_orders_reject_changes() {
    let h = Harness::new();
    let order = cod_home_order(&h).await;
    walk(&h, order.id, &[OrderStatus::Cancelled]).await;

    let err = h
        .services
        .order_status
        .update_status(order.id, OrderStatus::Processing)
        .await
        .unwrap_err();

    assert!(matches!(err, OrderError::InvalidInput(_)));
    assert_eq!(h.orders.get(order.id).unwrap().status, OrderStatus::Cancelled);
}

#[tokio::test]
async fn test_cancelled_cod_order_is_not_marked_paid() {
    let h = Harness::new();
    let order = cod_home_order(&h).await;
    let cancelled = walk(&h, order.id, &[OrderStatus::Cancelled]).await;

    assert!(!cancelled.is_paid);
    assert!(!cancelled.is_delivered);
    assert!(cancelled.payment_result.is_none());
}

#[tokio::test]
async fn test_pickup_orders_follow_pickup_branch() {
    let h = Harness::new();
    h.catalog.insert_item(item(1, 100, 10, true));
    let order = h
        .services
        .finalizer
        .place_cod_order(SHOPPER, &pickup(vec![line(1, 1)]))
        .await
        .unwrap();
    walk(&h, order.id, &[OrderStatus::Confirmed, OrderStatus::Processing]).await;

    let err = h
        .services
        .order_status
        .update_status(order.id, OrderStatus::Shipped)
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::InvalidInput(_)));

    let picked_up = walk(
        &h,
        order.id,
        &[OrderStatus::ReadyForPickup, OrderStatus::PickedUp],
    )
    .await;
    assert!(picked_up.is_delivered);
    assert!(picked_up.is_paid);
}

#[tokio::test]
async fn test_online_order_keeps_provider_snapshot_on_delivery() {
    let h = Harness::new();
    h.catalog.insert_item(item(1, 100, 10, true));
    h.provider.script_payment(captured("pay_L1", "order_L1", 28_600));
    let order = h
        .services
        .finalizer
        .place_online_order(
            SHOPPER,
            &online(
                home_delivery(HOME, vec![line(1, 2)]),
                signed_proof("order_L1", "pay_L1"),
            ),
        )
        .await
        .unwrap();

    let delivered = walk(
        &h,
        order.id,
        &[
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::OutForDelivery,
            OrderStatus::Delivered,
        ],
    )
    .await;

    assert_eq!(delivered.paid_at, order.paid_at);
    assert_eq!(delivered.payment_result.unwrap().id, "pay_L1");
}

#[tokio::test]
async fn test_status_changed_by_another_update_is_not_overwritten() {
    let h = Harness::new();
    let order = cod_home_order(&h).await;
    h.orders.race_next_find(OrderStatus::Cancelled);

    let err = h
        .services
        .order_status
        .update_status(order.id, OrderStatus::Confirmed)
        .await
        .unwrap_err();

    assert!(matches!(err, OrderError::InvalidInput(_)));
    assert_eq!(h.orders.get(order.id).unwrap().status, OrderStatus::Cancelled);
}

#[tokio::test]
async fn test_unknown_order_is_not_found() {
    let h = Harness::new();
    let err = h
        .services
        .order_status
        .update_status(OrderId::new(404), OrderStatus::Confirmed)
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::NotFound(_)));
}
