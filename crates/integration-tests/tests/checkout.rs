//! Cash and online order placement end to end.

#![allow(clippy::unwrap_used)]

use rust_decimal::Decimal;

use greenbasket_core::coupon::DiscountType;
use greenbasket_core::types::{AddressId, DeliveryOption, ItemId, OrderStatus, PaymentMethod};
use greenbasket_integration_tests::{
    HOME, Harness, NO_PIN, OTHER_SHOPPER, OUT_OF_TOWN, SHOPPER, address, captured, coupon,
    home_delivery, item, line, online, pickup, settings, signed_proof, store_address,
};
use greenbasket_storefront::services::{CriticalCause, OrderError, PaymentProof};

#[tokio::test]
async fn test_cod_order_is_stored_and_bookkeeping_runs() {
    let h = Harness::new();
    h.catalog.insert_item(item(1, 100, 10, true));
    h.carts.set(SHOPPER, vec![line(1, 2)]);

    let order = h
        .services
        .finalizer
        .place_cod_order(SHOPPER, &home_delivery(HOME, vec![line(1, 2)]))
        .await
        .unwrap();

    assert_eq!(order.payment_method, PaymentMethod::Cod);
    assert_eq!(order.status, OrderStatus::Pending);
    assert!(order.payment_result.is_none());
    assert_eq!(order.shipping_address.city, "Pune");
    assert_eq!(order.lines[0].name, "Produce 1");
    assert_eq!(h.orders.get(order.id).unwrap(), order);
    assert_eq!(h.catalog.item(ItemId::new(1)).unwrap().stock, 8);
    assert!(h.carts.lines(SHOPPER).is_empty());
}

#[tokio::test]
async fn test_missing_items_fall_back_to_cart() {
    let h = Harness::new();
    h.catalog.insert_item(item(1, 100, 10, true));
    h.catalog.insert_item(item(2, 60, 10, true));
    h.carts.set(SHOPPER, vec![line(1, 1), line(2, 3)]);

    let mut request = home_delivery(HOME, Vec::new());
    request.items = None;
    let order = h
        .services
        .finalizer
        .place_cod_order(SHOPPER, &request)
        .await
        .unwrap();

    assert_eq!(order.lines.len(), 2);
    assert_eq!(order.prices.items_price, Decimal::from(280));
    assert!(h.carts.lines(SHOPPER).is_empty());
}

#[tokio::test]
async fn test_empty_cart_is_rejected() {
    let h = Harness::new();
    let err = h
        .services
        .finalizer
        .place_cod_order(SHOPPER, &home_delivery(HOME, Vec::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::InvalidInput(_)));
}

#[tokio::test]
async fn test_frozen_snapshots_survive_catalog_and_address_edits() {
    let h = Harness::new();
    h.catalog.insert_item(item(1, 100, 10, true));

    let order = h
        .services
        .finalizer
        .place_cod_order(SHOPPER, &home_delivery(HOME, vec![line(1, 1)]))
        .await
        .unwrap();

    let mut repriced = item(1, 999, 10, true);
    repriced.name = "Renamed".to_string();
    h.catalog.insert_item(repriced);
    h.addresses.relocate(HOME, None, None);

    let stored = h.orders.get(order.id).unwrap();
    assert_eq!(stored.lines[0].price, Decimal::from(100));
    assert_eq!(stored.lines[0].name, "Produce 1");
    assert_eq!(stored.shipping_address.latitude, Some(18.5204));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_orders_never_drive_stock_negative() {
    let h = Harness::new();
    h.catalog.insert_item(item(1, 100, 3, true));

    let request = home_delivery(HOME, vec![line(1, 2)]);
    let tasks: Vec<_> = (0..2)
        .map(|_| {
            let finalizer = h.services.finalizer.clone();
            let request = request.clone();
            tokio::spawn(async move { finalizer.place_cod_order(SHOPPER, &request).await })
        })
        .collect();

    let mut placed = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => placed += 1,
            Err(err) => assert!(matches!(err, OrderError::InsufficientStock { .. })),
        }
    }

    let stock = h.catalog.item(ItemId::new(1)).unwrap().stock;
    assert!(stock >= 0);
    assert_eq!(h.orders.all().len(), placed);
    match placed {
        1 => assert_eq!(stock, 1),
        2 => assert_eq!(stock, 0),
        other => panic!("unexpected number of orders: {other}"),
    }
}

#[tokio::test]
async fn test_stock_failure_does_not_undo_order() {
    let h = Harness::new();
    h.catalog.insert_item(item(1, 100, 10, true));
    h.catalog.fail_decrements();

    let order = h
        .services
        .finalizer
        .place_cod_order(SHOPPER, &home_delivery(HOME, vec![line(1, 2)]))
        .await
        .unwrap();

    assert!(h.orders.get(order.id).is_some());
    assert_eq!(h.catalog.item(ItemId::new(1)).unwrap().stock, 10);
}

#[tokio::test]
async fn test_cod_persistence_failure_is_internal() {
    let h = Harness::new();
    h.catalog.insert_item(item(1, 100, 10, true));
    h.orders.fail_creates();

    let err = h
        .services
        .finalizer
        .place_cod_order(SHOPPER, &home_delivery(HOME, vec![line(1, 1)]))
        .await
        .unwrap_err();

    assert!(matches!(err, OrderError::Internal(_)));
    assert_eq!(h.catalog.item(ItemId::new(1)).unwrap().stock, 10);
}

// ============================================================================
// Delivery eligibility
// ============================================================================

#[tokio::test]
async fn test_address_outside_zone_is_rejected() {
    let h = Harness::new();
    h.catalog.insert_item(item(1, 100, 10, true));

    let err = h
        .services
        .finalizer
        .place_cod_order(SHOPPER, &home_delivery(OUT_OF_TOWN, vec![line(1, 1)]))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::OutOfZone));

    let err = h
        .services
        .finalizer
        .place_cod_order(SHOPPER, &home_delivery(NO_PIN, vec![line(1, 1)]))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::MissingCoordinates));
    assert!(h.orders.all().is_empty());
}

#[tokio::test]
async fn test_address_of_another_user_is_not_found() {
    let h = Harness::new();
    h.catalog.insert_item(item(1, 100, 10, true));
    h.addresses.insert(address(AddressId::new(20), OTHER_SHOPPER, Some((18.52, 73.85))));

    let err = h
        .services
        .finalizer
        .place_cod_order(SHOPPER, &home_delivery(AddressId::new(20), vec![line(1, 1)]))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::NotFound(_)));

    let mut request = home_delivery(HOME, vec![line(1, 1)]);
    request.shipping_address_id = Some("not-a-number".to_string());
    let err = h
        .services
        .finalizer
        .place_cod_order(SHOPPER, &request)
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::InvalidInput(_)));
}

#[tokio::test]
async fn test_without_zone_every_address_is_served() {
    let mut config = settings();
    config.delivery_zone = None;
    let h = Harness::with_settings(&config);
    h.catalog.insert_item(item(1, 100, 10, true));

    for address_id in [OUT_OF_TOWN, NO_PIN] {
        h.services
            .finalizer
            .place_cod_order(SHOPPER, &home_delivery(address_id, vec![line(1, 1)]))
            .await
            .unwrap();
    }
    assert_eq!(h.orders.all().len(), 2);
}

#[tokio::test]
async fn test_pickup_ships_to_store_address() {
    let h = Harness::new();
    h.catalog.insert_item(item(1, 100, 10, true));

    let order = h
        .services
        .finalizer
        .place_cod_order(SHOPPER, &pickup(vec![line(1, 1)]))
        .await
        .unwrap();

    assert_eq!(order.delivery_option, DeliveryOption::SelfPickup);
    assert_eq!(order.shipping_address, store_address());
    assert_eq!(
        order.delivery_preference.time_slot.as_deref(),
        Some("10:00-12:00")
    );
}

#[tokio::test]
async fn test_pickup_without_store_address_is_misconfigured() {
    let mut config = settings();
    config.store_address = None;
    let h = Harness::with_settings(&config);
    h.catalog.insert_item(item(1, 100, 10, true));

    let err = h
        .services
        .finalizer
        .place_cod_order(SHOPPER, &pickup(vec![line(1, 1)]))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::ServerMisconfigured(_)));
    assert!(err.is_server_side());
}

#[tokio::test]
async fn test_preference_must_match_option() {
    let h = Harness::new();
    h.catalog.insert_item(item(1, 100, 10, true));

    let mut request = pickup(vec![line(1, 1)]);
    request.delivery_preference.date = None;
    let err = h
        .services
        .finalizer
        .place_cod_order(SHOPPER, &request)
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::InvalidInput(_)));

    let mut request = home_delivery(HOME, vec![line(1, 1)]);
    request.delivery_preference = pickup(Vec::new()).delivery_preference;
    let err = h
        .services
        .finalizer
        .place_cod_order(SHOPPER, &request)
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::InvalidInput(_)));
}

// ============================================================================
// Online payments
// ============================================================================

#[tokio::test]
async fn test_online_checkout_then_completion() {
    let h = Harness::new();
    h.catalog.insert_item(item(1, 100, 10, true));
    h.carts.set(SHOPPER, vec![line(1, 2)]);
    let request = home_delivery(HOME, vec![line(1, 2)]);

    let intent = h
        .services
        .finalizer
        .begin_online_checkout(SHOPPER, &request)
        .await
        .unwrap();
    assert_eq!(intent.amount, 28_600);
    assert_eq!(intent.currency, "INR");
    assert_eq!(intent.key_id, "rzp_test_greenbasket");
    assert!(h.orders.all().is_empty());

    let sent = h.provider.created_orders();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].receipt.len() <= 40);
    assert_eq!(sent[0].notes["user_id"], "1");

    h.provider
        .script_payment(captured("pay_Q1", &intent.provider_order_id, 28_600));
    let order = h
        .services
        .finalizer
        .place_online_order(
            SHOPPER,
            &online(request, signed_proof(&intent.provider_order_id, "pay_Q1")),
        )
        .await
        .unwrap();

    assert_eq!(order.payment_method, PaymentMethod::Online);
    assert_eq!(order.status, OrderStatus::Confirmed);
    assert!(order.is_paid);
    assert!(order.paid_at.is_some());
    let snapshot = order.payment_result.unwrap();
    assert_eq!(snapshot.id, "pay_Q1");
    assert_eq!(snapshot.status, "captured");
    assert_eq!(
        snapshot.provider_order_id.as_deref(),
        Some(intent.provider_order_id.as_str())
    );
    assert_eq!(h.provider.fetch_calls(), 1);
    assert_eq!(h.catalog.item(ItemId::new(1)).unwrap().stock, 8);
    assert!(h.carts.lines(SHOPPER).is_empty());
}

#[tokio::test]
async fn test_swapped_ids_fail_signature_without_provider_call() {
    let h = Harness::new();
    h.catalog.insert_item(item(1, 100, 10, true));
    h.provider.script_payment(captured("pay_Q1", "order_Q1", 28_600));

    let genuine = signed_proof("order_Q1", "pay_Q1");
    let swapped = PaymentProof {
        provider_order_id: genuine.provider_payment_id.clone(),
        provider_payment_id: genuine.provider_order_id.clone(),
        signature: genuine.signature.clone(),
    };

    let err = h
        .services
        .finalizer
        .place_online_order(
            SHOPPER,
            &online(home_delivery(HOME, vec![line(1, 2)]), swapped),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, OrderError::SignatureInvalid));
    assert_eq!(h.provider.fetch_calls(), 0);
    assert!(h.orders.all().is_empty());
}

#[tokio::test]
async fn test_malformed_payment_reference_is_invalid_input() {
    let h = Harness::new();
    h.catalog.insert_item(item(1, 100, 10, true));

    let err = h
        .services
        .finalizer
        .place_online_order(
            SHOPPER,
            &online(
                home_delivery(HOME, vec![line(1, 2)]),
                signed_proof("order_Q1", ""),
            ),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, OrderError::InvalidInput(_)));
    assert_eq!(h.provider.fetch_calls(), 0);
}

#[tokio::test]
async fn test_uncaptured_payment_is_rejected() {
    let h = Harness::new();
    h.catalog.insert_item(item(1, 100, 10, true));
    let mut authorized = captured("pay_Q1", "order_Q1", 28_600);
    authorized.status = "authorized".to_string();
    h.provider.script_payment(authorized);

    let err = h
        .services
        .finalizer
        .place_online_order(
            SHOPPER,
            &online(
                home_delivery(HOME, vec![line(1, 2)]),
                signed_proof("order_Q1", "pay_Q1"),
            ),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, OrderError::PaymentNotCaptured { ref status } if status == "authorized"));
    assert!(h.orders.all().is_empty());
}

#[tokio::test]
async fn test_payment_for_another_provider_order_is_rejected() {
    let h = Harness::new();
    h.catalog.insert_item(item(1, 100, 10, true));
    h.provider.script_payment(captured("pay_Q1", "order_OTHER", 28_600));

    let err = h
        .services
        .finalizer
        .place_online_order(
            SHOPPER,
            &online(
                home_delivery(HOME, vec![line(1, 2)]),
                signed_proof("order_Q1", "pay_Q1"),
            ),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, OrderError::PaymentNotCaptured { .. }));
}

#[tokio::test]
async fn test_one_paisa_difference_is_tolerated() {
    let h = Harness::new();
    h.catalog.insert_item(item(1, 100, 10, true));
    h.provider.script_payment(captured("pay_Q1", "order_Q1", 28_601));

    let order = h
        .services
        .finalizer
        .place_online_order(
            SHOPPER,
            &online(
                home_delivery(HOME, vec![line(1, 2)]),
                signed_proof("order_Q1", "pay_Q1"),
            ),
        )
        .await
        .unwrap();

    assert!(order.is_paid);
    assert_eq!(order.prices.total_price, Decimal::from(286));
}

#[tokio::test]
async fn test_amount_mismatch_is_critical_and_stores_nothing() {
    let h = Harness::new();
    h.catalog.insert_item(item(1, 100, 10, true));
    h.provider.script_payment(captured("pay_Q1", "order_Q1", 20_000));

    let err = h
        .services
        .finalizer
        .place_online_order(
            SHOPPER,
            &online(
                home_delivery(HOME, vec![line(1, 2)]),
                signed_proof("order_Q1", "pay_Q1"),
            ),
        )
        .await
        .unwrap_err();

    let OrderError::Critical(failure) = &err else {
        panic!("expected a critical failure, got {err:?}");
    };
    assert!(matches!(
        failure.cause,
        CriticalCause::AmountMismatch {
            expected_minor: 28_600,
            captured_minor: 20_000
        }
    ));
    assert_eq!(failure.provider_order_id, "order_Q1");
    assert_eq!(failure.provider_payment_id, "pay_Q1");
    assert_eq!(err.kind(), "amount_mismatch");
    assert!(h.orders.all().is_empty());
    assert_eq!(h.catalog.item(ItemId::new(1)).unwrap().stock, 10);
}

#[tokio::test]
async fn test_address_moved_during_payment_is_critical() {
    let h = Harness::new();
    h.catalog.insert_item(item(1, 100, 10, true));
    h.provider.script_payment(captured("pay_Q1", "order_Q1", 28_600));
    let addresses = std::sync::Arc::clone(&h.addresses);
    h.provider
        .on_fetch(move || addresses.relocate(HOME, Some(19.0760), Some(72.8777)));

    let err = h
        .services
        .finalizer
        .place_online_order(
            SHOPPER,
            &online(
                home_delivery(HOME, vec![line(1, 2)]),
                signed_proof("order_Q1", "pay_Q1"),
            ),
        )
        .await
        .unwrap_err();

    let OrderError::Critical(failure) = &err else {
        panic!("expected a critical failure, got {err:?}");
    };
    assert!(matches!(failure.cause, CriticalCause::Ineligible(_)));
    assert_eq!(failure.provider_order_id, "order_Q1");
    assert_eq!(err.kind(), "post_capture_ineligible");
    assert!(h.orders.all().is_empty());
}

#[tokio::test]
async fn test_address_edited_before_verify_is_critical() {
    let h = Harness::new();
    h.catalog.insert_item(item(1, 100, 10, true));
    let request = home_delivery(HOME, vec![line(1, 2)]);

    let intent = h
        .services
        .finalizer
        .begin_online_checkout(SHOPPER, &request)
        .await
        .unwrap();

    // The shopper moves the address out of the zone while paying.
    h.addresses.relocate(HOME, Some(19.0760), Some(72.8777));
    h.provider
        .script_payment(captured("pay_E1", &intent.provider_order_id, 28_600));

    let err = h
        .services
        .finalizer
        .place_online_order(
            SHOPPER,
            &online(request, signed_proof(&intent.provider_order_id, "pay_E1")),
        )
        .await
        .unwrap_err();

    let OrderError::Critical(failure) = &err else {
        panic!("expected a critical failure, got {err:?}");
    };
    assert!(matches!(failure.cause, CriticalCause::Ineligible(_)));
    assert_eq!(failure.provider_order_id, intent.provider_order_id);
    assert_eq!(failure.provider_payment_id, "pay_E1");
    assert_eq!(err.kind(), "post_capture_ineligible");
    assert_eq!(h.provider.fetch_calls(), 1);
    assert!(h.orders.all().is_empty());
    assert_eq!(h.catalog.item(ItemId::new(1)).unwrap().stock, 10);
}

#[tokio::test]
async fn test_persistence_failure_after_capture_is_critical() {
    let h = Harness::new();
    h.catalog.insert_item(item(1, 100, 10, true));
    h.provider.script_payment(captured("pay_Q1", "order_Q1", 28_600));
    h.orders.fail_creates();

    let err = h
        .services
        .finalizer
        .place_online_order(
            SHOPPER,
            &online(
                home_delivery(HOME, vec![line(1, 2)]),
                signed_proof("order_Q1", "pay_Q1"),
            ),
        )
        .await
        .unwrap_err();

    let OrderError::Critical(failure) = &err else {
        panic!("expected a critical failure, got {err:?}");
    };
    assert!(matches!(failure.cause, CriticalCause::PersistenceFailed(_)));
    assert_eq!(failure.provider_payment_id, "pay_Q1");
    assert!(err.is_server_side());
    assert_eq!(h.catalog.item(ItemId::new(1)).unwrap().stock, 10);
}

#[tokio::test]
async fn test_provider_outage_before_capture_is_not_critical() {
    let h = Harness::new();
    h.catalog.insert_item(item(1, 100, 10, true));
    h.provider.go_offline();

    let err = h
        .services
        .finalizer
        .begin_online_checkout(SHOPPER, &home_delivery(HOME, vec![line(1, 2)]))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::ProviderUnreachable(_)));

    let err = h
        .services
        .finalizer
        .place_online_order(
            SHOPPER,
            &online(
                home_delivery(HOME, vec![line(1, 2)]),
                signed_proof("order_Q1", "pay_Q1"),
            ),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::ProviderUnreachable(_)));
    assert!(h.orders.all().is_empty());
}

#[tokio::test]
async fn test_zero_total_cannot_be_paid_online() {
    let h = Harness::new();
    h.catalog.insert_item(item(1, 100, 10, true));
    h.coupons
        .insert(coupon(1, "FREEBIE", DiscountType::Percentage, 100));

    let mut request = pickup(vec![line(1, 1)]);
    request.coupon_code = Some("FREEBIE".to_string());
    let err = h
        .services
        .finalizer
        .begin_online_checkout(SHOPPER, &request)
        .await
        .unwrap_err();

    assert!(matches!(err, OrderError::InvalidInput(_)));
    assert_eq!(h.provider.create_calls(), 0);
}

#[tokio::test]
async fn test_online_coupon_usage_is_recorded_once() {
    let h = Harness::new();
    h.catalog.insert_item(item(1, 100, 10, true));
    h.coupons
        .insert(coupon(1, "GREEN20", DiscountType::FixedAmount, 20));
    let mut request = home_delivery(HOME, vec![line(1, 2)]);
    request.coupon_code = Some("GREEN20".to_string());

    let intent = h
        .services
        .finalizer
        .begin_online_checkout(SHOPPER, &request)
        .await
        .unwrap();
    assert_eq!(h.coupons.increments(), 0);

    h.provider
        .script_payment(captured("pay_Q9", &intent.provider_order_id, intent.amount));
    let order = h
        .services
        .finalizer
        .place_online_order(
            SHOPPER,
            &online(request, signed_proof(&intent.provider_order_id, "pay_Q9")),
        )
        .await
        .unwrap();

    assert_eq!(order.coupon.unwrap().code, "GREEN20");
    assert_eq!(h.coupons.increments(), 1);
}
