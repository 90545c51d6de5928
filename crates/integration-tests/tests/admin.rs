//! Back-office operations: category deletes, coupon definitions, ledger.

#![allow(clippy::unwrap_used)]

use chrono::{Duration, Utc};
use rust_decimal::Decimal;

use greenbasket_core::coupon::{CouponDefinitionError, DiscountType, NewCoupon};
use greenbasket_core::ledger::{Direction, EntryRequest, LedgerError, LedgerKind};
use greenbasket_core::types::{CategoryId, ItemId, UserId};
use greenbasket_integration_tests::{Harness, SHOPPER, item};
use greenbasket_storefront::db::{LedgerWriteError, RepositoryError};
use greenbasket_storefront::services::{CatalogAdminError, CouponAdminError};

const GREENS: CategoryId = CategoryId::new(3);

fn with_image(id: i32, image: &str) -> greenbasket_core::catalog::Item {
    let mut produce = item(id, 40, 10, true);
    produce.image = Some(image.to_string());
    produce
}

// ============================================================================
// Catalog
// ============================================================================

#[tokio::test]
async fn test_category_delete_removes_items_and_images() {
    let h = Harness::new();
    h.stock_in(GREENS, with_image(1, "/media/items/spinach.jpg"));
    h.stock_in(GREENS, with_image(2, "/media/items/kale.jpg"));
    h.catalog.insert_item(item(9, 100, 10, true));

    let deletion = h.services.catalog.delete_category(GREENS).await.unwrap();

    assert_eq!(deletion.category_id, GREENS);
    assert_eq!(deletion.deleted_items, vec![ItemId::new(1), ItemId::new(2)]);
    assert!(!h.catalog.has_category(GREENS));
    assert!(h.catalog.item(ItemId::new(1)).is_none());
    assert!(h.catalog.item(ItemId::new(9)).is_some());
    assert_eq!(
        h.media.removed(),
        vec!["/media/items/spinach.jpg", "/media/items/kale.jpg"]
    );
}

#[tokio::test]
async fn test_empty_category_is_deleted() {
    let h = Harness::new();
    h.catalog.insert_category(GREENS);

    let deletion = h.services.catalog.delete_category(GREENS).await.unwrap();
    assert!(deletion.deleted_items.is_empty());
    assert!(!h.catalog.has_category(GREENS));
}

#[tokio::test]
async fn test_failed_item_delete_keeps_category() {
    let h = Harness::new();
    h.stock_in(GREENS, with_image(1, "/media/items/spinach.jpg"));
    h.stock_in(GREENS, with_image(2, "/media/items/kale.jpg"));
    h.catalog.fail_delete_of(ItemId::new(2));

    let err = h.services.catalog.delete_category(GREENS).await.unwrap_err();

    match err {
        CatalogAdminError::Partial {
            category_id,
            deleted,
            ..
        } => {
            assert_eq!(category_id, GREENS);
            assert_eq!(deleted, 1);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(h.catalog.has_category(GREENS));
    assert!(h.catalog.item(ItemId::new(1)).is_none());
    assert!(h.catalog.item(ItemId::new(2)).is_some());
}

#[tokio::test]
async fn test_unknown_category_and_item_are_not_found() {
    let h = Harness::new();

    let err = h
        .services
        .catalog
        .delete_category(CategoryId::new(99))
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogAdminError::NotFound("category")));

    let err = h
        .services
        .catalog
        .delete_item(ItemId::new(99))
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogAdminError::NotFound("item")));
}

#[tokio::test]
async fn test_item_without_image_touches_no_media() {
    let h = Harness::new();
    h.catalog.insert_item(item(5, 30, 10, true));

    let deleted = h.services.catalog.delete_item(ItemId::new(5)).await.unwrap();
    assert_eq!(deleted.id, ItemId::new(5));
    assert!(h.media.removed().is_empty());
}

// ============================================================================
// Coupons
// ============================================================================

fn new_coupon(code: &str, discount_type: DiscountType, amount: i64) -> NewCoupon {
    let now = Utc::now();
    NewCoupon {
        code: code.to_string(),
        discount_type,
        discount_amount: Decimal::from(amount),
        min_purchase: Decimal::ZERO,
        max_discount: Decimal::from(30),
        start_date: now,
        expire_date: now + Duration::days(30),
        max_total_uses: 100,
        limit_for_same_user: 1,
    }
}

#[tokio::test]
async fn test_fixed_amount_coupon_drops_cap() {
    let h = Harness::new();

    let created = h
        .services
        .coupons
        .create(new_coupon(" flat50 ", DiscountType::FixedAmount, 50))
        .await
        .unwrap();

    assert_eq!(created.code, "FLAT50");
    assert_eq!(created.max_discount, Decimal::ZERO);
    assert_eq!(created.total_used, 0);
    assert!(created.is_active);
    assert_eq!(h.coupons.get(created.id).unwrap(), created);
}

#[tokio::test]
async fn test_percentage_over_hundred_is_rejected() {
    let h = Harness::new();

    let err = h
        .services
        .coupons
        .create(new_coupon("TOOMUCH", DiscountType::Percentage, 150))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CouponAdminError::Definition(CouponDefinitionError::PercentageTooLarge(_))
    ));
}

#[tokio::test]
async fn test_inverted_window_and_duplicate_code_are_rejected() {
    let h = Harness::new();

    let mut inverted = new_coupon("BACKWARDS", DiscountType::Percentage, 10);
    inverted.expire_date = inverted.start_date - Duration::days(1);
    let err = h.services.coupons.create(inverted).await.unwrap_err();
    assert!(matches!(
        err,
        CouponAdminError::Definition(CouponDefinitionError::ExpiresBeforeStart)
    ));

    h.services
        .coupons
        .create(new_coupon("SUMMER", DiscountType::Percentage, 10))
        .await
        .unwrap();
    let err = h
        .services
        .coupons
        .create(new_coupon("summer", DiscountType::Percentage, 5))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CouponAdminError::Repository(RepositoryError::Conflict(_))
    ));
}

// ============================================================================
// Ledger
// ============================================================================

fn entry(direction: Direction, amount: &str, reason: &str) -> EntryRequest {
    EntryRequest {
        direction,
        amount: amount.parse().unwrap(),
        reason: reason.to_string(),
    }
}

#[tokio::test]
async fn test_wallet_credit_then_overdraft() {
    let h = Harness::new();
    h.ledger.add_user(SHOPPER);

    let credited = h
        .services
        .ledger
        .add_wallet_transaction(SHOPPER, entry(Direction::Credit, "100.004", " refund #12 "))
        .await
        .unwrap();
    assert_eq!(credited.amount, "100.00".parse::<Decimal>().unwrap());
    assert_eq!(credited.balance_after, Decimal::from(100));
    assert_eq!(credited.reason, "refund #12");

    let err = h
        .services
        .ledger
        .add_wallet_transaction(SHOPPER, entry(Direction::Debit, "150", "order 13"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerWriteError::Rejected(LedgerError::InsufficientBalance { .. })
    ));
    assert_eq!(h.ledger.balance(SHOPPER, LedgerKind::Wallet), Decimal::from(100));
    assert_eq!(h.ledger.entries().len(), 1);
}

#[tokio::test]
async fn test_loyalty_points_are_whole_and_separate_from_wallet() {
    let h = Harness::new();
    h.ledger.add_user(SHOPPER);

    let err = h
        .services
        .ledger
        .add_loyalty_transaction(SHOPPER, entry(Direction::Credit, "2.5", "promo"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerWriteError::Rejected(LedgerError::FractionalPoints)
    ));

    h.services
        .ledger
        .add_loyalty_transaction(SHOPPER, entry(Direction::Credit, "40", "order 7"))
        .await
        .unwrap();
    let spent = h
        .services
        .ledger
        .add_loyalty_transaction(SHOPPER, entry(Direction::Debit, "15", "redeemed"))
        .await
        .unwrap();

    assert_eq!(spent.balance_after, Decimal::from(25));
    assert_eq!(h.ledger.balance(SHOPPER, LedgerKind::Wallet), Decimal::ZERO);
}

#[tokio::test]
async fn test_invalid_entries_and_unknown_users() {
    let h = Harness::new();
    h.ledger.add_user(SHOPPER);

    let err = h
        .services
        .ledger
        .add_wallet_transaction(SHOPPER, entry(Direction::Credit, "0", "nothing"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerWriteError::Rejected(LedgerError::NonPositiveAmount)
    ));

    let err = h
        .services
        .ledger
        .add_wallet_transaction(SHOPPER, entry(Direction::Credit, "10", "   "))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerWriteError::Rejected(LedgerError::MissingReason)
    ));

    let err = h
        .services
        .ledger
        .add_wallet_transaction(UserId::new(77), entry(Direction::Credit, "10", "gift"))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerWriteError::UserNotFound));
}
