//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `eligibility` - Delivery address ownership and zone check
//! - `pricing` - Authoritative order totals
//! - `coupons` - Coupon resolution, usage bookkeeping, definitions
//! - `reconciliation` - Payment signature and capture verification
//! - `orders` - Order finalizer for cash and online orders
//! - `order_status` - Admin lifecycle transitions
//! - `catalog` - Cascading item and category deletes
//! - `ledger` - Wallet and loyalty adjustments
//!
//! Services only see collaborators through the store traits in
//! [`crate::db`] and [`crate::payments::PaymentProvider`], bundled in
//! [`Stores`].

pub mod catalog;
pub mod coupons;
pub mod eligibility;
pub mod error;
pub mod ledger;
pub mod order_status;
pub mod orders;
pub mod pricing;
pub mod reconciliation;

use std::sync::Arc;

use secrecy::SecretString;
use sqlx::PgPool;

use greenbasket_core::address::ShippingAddress;
use greenbasket_core::geo::DeliveryZone;
use greenbasket_core::pricing::ShippingRule;
use greenbasket_core::types::CurrencyCode;

use crate::db::{
    AddressStore, CartStore, CatalogStore, CouponStore, LedgerStore, OrderStore,
    PgAddressRepository, PgCartRepository, PgCatalogRepository, PgCouponRepository,
    PgLedgerRepository, PgOrderRepository,
};
use crate::payments::PaymentProvider;

pub use catalog::{CatalogAdmin, CatalogAdminError, CategoryDeletion, LocalMediaStore, MediaStore};
pub use coupons::{CouponAdminError, CouponLedger};
pub use eligibility::DeliveryEligibility;
pub use error::{CriticalCause, CriticalFailure, OrderError};
pub use ledger::LedgerService;
pub use order_status::OrderStatusService;
pub use orders::{CheckoutIntent, OnlineOrderRequest, OrderFinalizer, OrderRequest};
pub use pricing::{PricingEngine, Quote};
pub use reconciliation::{PaymentProof, PaymentReconciler};

/// The persistence collaborators.
#[derive(Clone)]
pub struct Stores {
    pub catalog: Arc<dyn CatalogStore>,
    pub addresses: Arc<dyn AddressStore>,
    pub carts: Arc<dyn CartStore>,
    pub coupons: Arc<dyn CouponStore>,
    pub orders: Arc<dyn OrderStore>,
    pub ledger: Arc<dyn LedgerStore>,
}

impl Stores {
    /// PostgreSQL-backed stores sharing one pool.
    #[must_use]
    pub fn postgres(pool: &PgPool) -> Self {
        Self {
            catalog: Arc::new(PgCatalogRepository::new(pool.clone())),
            addresses: Arc::new(PgAddressRepository::new(pool.clone())),
            carts: Arc::new(PgCartRepository::new(pool.clone())),
            coupons: Arc::new(PgCouponRepository::new(pool.clone())),
            orders: Arc::new(PgOrderRepository::new(pool.clone())),
            ledger: Arc::new(PgLedgerRepository::new(pool.clone())),
        }
    }
}

/// Deployment settings the services depend on.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    /// `None` disables the geofence.
    pub delivery_zone: Option<DeliveryZone>,
    pub shipping: ShippingRule,
    /// `None` makes self pickup unavailable.
    pub store_address: Option<ShippingAddress>,
    pub payment_key_id: String,
    pub payment_key_secret: SecretString,
    pub currency: CurrencyCode,
}

/// All services, wired once at start-up.
#[derive(Clone)]
pub struct Services {
    pub finalizer: OrderFinalizer,
    pub order_status: OrderStatusService,
    pub coupons: CouponLedger,
    pub catalog: CatalogAdmin,
    pub ledger: LedgerService,
}

impl Services {
    #[must_use]
    pub fn new(
        stores: &Stores,
        provider: Arc<dyn PaymentProvider>,
        media: Arc<dyn MediaStore>,
        settings: &ServiceSettings,
    ) -> Self {
        let coupons = CouponLedger::new(Arc::clone(&stores.coupons));
        let reconciler = PaymentReconciler::new(
            provider,
            settings.payment_key_secret.clone(),
            settings.currency,
        );

        Self {
            finalizer: OrderFinalizer::new(stores, settings, coupons.clone(), reconciler),
            order_status: OrderStatusService::new(Arc::clone(&stores.orders)),
            coupons,
            catalog: CatalogAdmin::new(Arc::clone(&stores.catalog), media),
            ledger: LedgerService::new(Arc::clone(&stores.ledger)),
        }
    }
}
