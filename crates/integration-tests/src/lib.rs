//! Integration tests for Green Basket order finalization.
//!
//! The services are wired exactly as in production, but against in-memory
//! stores and a scripted payment provider, so the whole order flow runs
//! without a database or network.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p greenbasket-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `pricing` - Totals, coupons, shipping
//! - `checkout` - Cash and online order placement
//! - `lifecycle` - Status transitions
//! - `admin` - Category deletes, coupon definitions, ledger

pub mod memory;
pub mod provider;

use std::sync::Arc;

use rust_decimal::Decimal;
use secrecy::SecretString;

use greenbasket_core::address::{Address, ShippingAddress};
use greenbasket_core::catalog::Item;
use greenbasket_core::coupon::{Coupon, DiscountType};
use greenbasket_core::geo::{DeliveryZone, LonLat};
use greenbasket_core::order::{DeliveryPreferenceRequest, PreferenceKind};
use greenbasket_core::pricing::{LineRequest, ShippingRule};
use greenbasket_core::types::{
    AddressId, CategoryId, CouponId, CurrencyCode, DeliveryOption, ItemId, UserId,
};
use greenbasket_storefront::payments::ProviderPayment;
use greenbasket_storefront::payments::signature;
use greenbasket_storefront::services::{
    OnlineOrderRequest, OrderRequest, PaymentProof, ServiceSettings, Services, Stores,
};

pub use memory::{
    MemoryAddresses, MemoryCarts, MemoryCatalog, MemoryCoupons, MemoryLedger, MemoryOrders,
};
pub use provider::{MockPaymentProvider, RecordingMediaStore};

pub const KEY_ID: &str = "rzp_test_greenbasket";
pub const KEY_SECRET: &str = "test_secret_do_not_use";

pub const SHOPPER: UserId = UserId::new(1);
pub const OTHER_SHOPPER: UserId = UserId::new(2);

/// Address inside the Pune delivery zone.
pub const HOME: AddressId = AddressId::new(10);
/// Address in Mumbai, outside the zone.
pub const OUT_OF_TOWN: AddressId = AddressId::new(11);
/// Address saved without coordinates.
pub const NO_PIN: AddressId = AddressId::new(12);

/// Square around central Pune.
///
/// # Panics
///
/// Never; the ring is closed and in range.
#[must_use]
pub fn pune_zone() -> DeliveryZone {
    DeliveryZone::from_ring(vec![
        LonLat::new(73.80, 18.45),
        LonLat::new(73.95, 18.45),
        LonLat::new(73.95, 18.60),
        LonLat::new(73.80, 18.60),
        LonLat::new(73.80, 18.45),
    ])
    .expect("fixture zone is valid")
}

#[must_use]
pub fn store_address() -> ShippingAddress {
    ShippingAddress {
        full_name: "Green Basket Store".to_string(),
        phone: "+91 20 4000 1234".to_string(),
        line1: "12 FC Road".to_string(),
        line2: None,
        landmark: Some("Opposite Goodluck Cafe".to_string()),
        city: "Pune".to_string(),
        state: "Maharashtra".to_string(),
        postal_code: "411004".to_string(),
        country: "India".to_string(),
        latitude: Some(18.5196),
        longitude: Some(73.8412),
    }
}

/// Fee 50, free from 1000.
#[must_use]
pub fn settings() -> ServiceSettings {
    ServiceSettings {
        delivery_zone: Some(pune_zone()),
        shipping: ShippingRule {
            delivery_fee: Decimal::from(50),
            free_delivery_threshold: Some(Decimal::from(1000)),
        },
        store_address: Some(store_address()),
        payment_key_id: KEY_ID.to_string(),
        payment_key_secret: SecretString::from(KEY_SECRET),
        currency: CurrencyCode::default(),
    }
}

/// A taxable item at 9% CGST plus 9% SGST.
#[must_use]
pub fn item(id: i32, price: i64, stock: i32, manage_stock: bool) -> Item {
    Item {
        id: ItemId::new(id),
        category_id: None,
        name: format!("Produce {id}"),
        price: Decimal::from(price),
        unit: Some("kg".to_string()),
        stock,
        manage_stock,
        is_active: true,
        taxable: true,
        cgst_rate: Decimal::from(9),
        sgst_rate: Decimal::from(9),
        image: None,
    }
}

#[must_use]
pub fn address(id: AddressId, user_id: UserId, location: Option<(f64, f64)>) -> Address {
    Address {
        id,
        user_id,
        full_name: "Asha Kulkarni".to_string(),
        phone: "+91 98220 00000".to_string(),
        line1: "Flat 4, Shanti Niwas".to_string(),
        line2: None,
        landmark: None,
        city: "Pune".to_string(),
        state: "Maharashtra".to_string(),
        postal_code: "411038".to_string(),
        country: "India".to_string(),
        latitude: location.map(|(lat, _)| lat),
        longitude: location.map(|(_, lon)| lon),
        is_default: true,
    }
}

/// An active coupon valid for the whole of the surrounding year.
#[must_use]
pub fn coupon(id: i32, code: &str, discount_type: DiscountType, amount: i64) -> Coupon {
    let now = chrono::Utc::now();
    Coupon {
        id: CouponId::new(id),
        code: code.to_string(),
        discount_type,
        discount_amount: Decimal::from(amount),
        min_purchase: Decimal::ZERO,
        max_discount: Decimal::ZERO,
        start_date: now - chrono::Duration::days(180),
        expire_date: now + chrono::Duration::days(180),
        total_used: 0,
        max_total_uses: 0,
        limit_for_same_user: 0,
        is_active: true,
    }
}

#[must_use]
pub fn line(item_id: i32, quantity: i64) -> LineRequest {
    LineRequest {
        item_id: ItemId::new(item_id),
        quantity,
    }
}

/// Quick home delivery of `items` to `address_id`.
#[must_use]
pub fn home_delivery(address_id: AddressId, items: Vec<LineRequest>) -> OrderRequest {
    OrderRequest {
        items: Some(items),
        shipping_address_id: Some(address_id.to_string()),
        delivery_option: DeliveryOption::HomeDelivery,
        delivery_preference: DeliveryPreferenceRequest {
            kind: PreferenceKind::Quick,
            date: None,
            time_slot: None,
        },
        coupon_code: None,
    }
}

/// Store pickup of `items` on a fixed slot.
#[must_use]
pub fn pickup(items: Vec<LineRequest>) -> OrderRequest {
    OrderRequest {
        items: Some(items),
        shipping_address_id: None,
        delivery_option: DeliveryOption::SelfPickup,
        delivery_preference: DeliveryPreferenceRequest {
            kind: PreferenceKind::PickupScheduled,
            date: Some("2026-11-02".to_string()),
            time_slot: Some("10:00-12:00".to_string()),
        },
        coupon_code: None,
    }
}

/// A correctly signed checkout proof.
#[must_use]
pub fn signed_proof(provider_order_id: &str, provider_payment_id: &str) -> PaymentProof {
    let secret = SecretString::from(KEY_SECRET);
    PaymentProof {
        provider_order_id: provider_order_id.to_string(),
        provider_payment_id: provider_payment_id.to_string(),
        signature: signature::sign(&secret, provider_order_id, provider_payment_id),
    }
}

#[must_use]
pub fn online(order: OrderRequest, payment: PaymentProof) -> OnlineOrderRequest {
    OnlineOrderRequest { order, payment }
}

/// A captured payment of `amount` minor units against `provider_order_id`.
#[must_use]
pub fn captured(provider_payment_id: &str, provider_order_id: &str, amount: i64) -> ProviderPayment {
    ProviderPayment {
        id: provider_payment_id.to_string(),
        status: "captured".to_string(),
        amount,
        currency: Some("INR".to_string()),
        order_id: Some(provider_order_id.to_string()),
        method: Some("upi".to_string()),
        email: Some("asha@example.in".to_string()),
        description: Some("Green Basket order".to_string()),
        created_at: 1_790_000_000,
    }
}

/// Services wired to in-memory collaborators, with handles to inspect them.
pub struct Harness {
    pub catalog: Arc<MemoryCatalog>,
    pub addresses: Arc<MemoryAddresses>,
    pub carts: Arc<MemoryCarts>,
    pub coupons: Arc<MemoryCoupons>,
    pub orders: Arc<MemoryOrders>,
    pub ledger: Arc<MemoryLedger>,
    pub provider: Arc<MockPaymentProvider>,
    pub media: Arc<RecordingMediaStore>,
    pub services: Services,
}

impl Harness {
    /// Default settings, the shopper's three addresses, and nothing in the catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::with_settings(&settings())
    }

    #[must_use]
    pub fn with_settings(settings: &ServiceSettings) -> Self {
        let catalog = Arc::new(MemoryCatalog::default());
        let addresses = Arc::new(MemoryAddresses::default());
        let carts = Arc::new(MemoryCarts::default());
        let orders = Arc::new(MemoryOrders::default());
        let coupons = Arc::new(MemoryCoupons::new(Arc::clone(&orders)));
        let ledger = Arc::new(MemoryLedger::default());
        let provider = Arc::new(MockPaymentProvider::default());
        let media = Arc::new(RecordingMediaStore::default());

        addresses.insert(address(HOME, SHOPPER, Some((18.5204, 73.8567))));
        addresses.insert(address(OUT_OF_TOWN, SHOPPER, Some((19.0760, 72.8777))));
        addresses.insert(address(NO_PIN, SHOPPER, None));

        let stores = Stores {
            catalog: Arc::clone(&catalog) as _,
            addresses: Arc::clone(&addresses) as _,
            carts: Arc::clone(&carts) as _,
            coupons: Arc::clone(&coupons) as _,
            orders: Arc::clone(&orders) as _,
            ledger: Arc::clone(&ledger) as _,
        };
        let services = Services::new(
            &stores,
            Arc::clone(&provider) as _,
            Arc::clone(&media) as _,
            settings,
        );

        Self {
            catalog,
            addresses,
            carts,
            coupons,
            orders,
            ledger,
            provider,
            media,
            services,
        }
    }

    /// Put an item into a category, creating the category.
    pub fn stock_in(&self, category: CategoryId, mut item: Item) {
        item.category_id = Some(category);
        self.catalog.insert_item(item);
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
