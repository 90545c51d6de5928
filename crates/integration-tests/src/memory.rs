//! In-memory implementations of the storefront store traits.
//!
//! Each store keeps its state behind a `std::sync::Mutex`; no lock is held
//! across an await point. Stock decrements happen entirely under the lock,
//! matching the single conditional statement of the `PostgreSQL` store.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use greenbasket_core::address::Address;
use greenbasket_core::catalog::{Item, StockDecrement};
use greenbasket_core::coupon::{Coupon, NewCoupon};
use greenbasket_core::ledger::{EntryRequest, LedgerEntry, LedgerKind};
use greenbasket_core::order::{NewOrder, Order};
use greenbasket_core::pricing::LineRequest;
use greenbasket_core::types::{
    AddressId, CategoryId, CouponId, ItemId, OrderId, OrderStatus, UserId,
};
use greenbasket_storefront::db::{
    AddressStore, CartStore, CatalogStore, CouponStore, LedgerStore, LedgerWriteError,
    OrderStore, RepositoryError,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn unavailable(what: &str) -> RepositoryError {
    RepositoryError::DataCorruption(format!("{what} unavailable (injected failure)"))
}

// ============================================================================
// Catalog
// ============================================================================

#[derive(Debug, Default)]
pub struct MemoryCatalog {
    items: Mutex<HashMap<ItemId, Item>>,
    categories: Mutex<HashSet<CategoryId>>,
    failing_deletes: Mutex<HashSet<ItemId>>,
    fail_decrements: AtomicBool,
}

impl MemoryCatalog {
    pub fn insert_item(&self, item: Item) {
        if let Some(category) = item.category_id {
            lock(&self.categories).insert(category);
        }
        lock(&self.items).insert(item.id, item);
    }

    pub fn insert_category(&self, id: CategoryId) {
        lock(&self.categories).insert(id);
    }

    #[must_use]
    pub fn item(&self, id: ItemId) -> Option<Item> {
        lock(&self.items).get(&id).cloned()
    }

    #[must_use]
    pub fn has_category(&self, id: CategoryId) -> bool {
        lock(&self.categories).contains(&id)
    }

    /// Make `delete_item` fail for `id`.
    pub fn fail_delete_of(&self, id: ItemId) {
        lock(&self.failing_deletes).insert(id);
    }

    /// Make every `decrement_stock` call fail.
    pub fn fail_decrements(&self) {
        self.fail_decrements.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalog {
    async fn find_items_by_ids(&self, ids: &[ItemId]) -> Result<Vec<Item>, RepositoryError> {
        let items = lock(&self.items);
        Ok(ids.iter().filter_map(|id| items.get(id).cloned()).collect())
    }

    async fn decrement_stock(
        &self,
        id: ItemId,
        quantity: u32,
    ) -> Result<StockDecrement, RepositoryError> {
        if self.fail_decrements.load(Ordering::SeqCst) {
            return Err(unavailable("catalog"));
        }

        let mut items = lock(&self.items);
        let Some(item) = items.get_mut(&id) else {
            return Ok(StockDecrement::Missing);
        };
        if !item.manage_stock {
            return Ok(StockDecrement::Unmanaged);
        }

        let requested = i32::try_from(quantity).unwrap_or(i32::MAX);
        if item.stock >= requested {
            item.stock -= requested;
            Ok(StockDecrement::Applied {
                remaining: item.stock,
            })
        } else {
            item.stock = 0;
            Ok(StockDecrement::Clamped { requested: quantity })
        }
    }

    async fn category_exists(&self, id: CategoryId) -> Result<bool, RepositoryError> {
        Ok(self.has_category(id))
    }

    async fn items_in_category(&self, id: CategoryId) -> Result<Vec<Item>, RepositoryError> {
        let mut items: Vec<Item> = lock(&self.items)
            .values()
            .filter(|item| item.category_id == Some(id))
            .cloned()
            .collect();
        items.sort_by_key(|item| item.id);
        Ok(items)
    }

    async fn delete_item(&self, id: ItemId) -> Result<Option<Item>, RepositoryError> {
        if lock(&self.failing_deletes).contains(&id) {
            return Err(unavailable("item delete"));
        }
        Ok(lock(&self.items).remove(&id))
    }

    async fn delete_category(&self, id: CategoryId) -> Result<bool, RepositoryError> {
        Ok(lock(&self.categories).remove(&id))
    }
}

// ============================================================================
// Addresses
// ============================================================================

#[derive(Debug, Default)]
pub struct MemoryAddresses {
    addresses: Mutex<HashMap<AddressId, Address>>,
}

impl MemoryAddresses {
    pub fn insert(&self, address: Address) {
        lock(&self.addresses).insert(address.id, address);
    }

    /// Move an address, e.g. to simulate an edit between checkout steps.
    pub fn relocate(&self, id: AddressId, latitude: Option<f64>, longitude: Option<f64>) {
        if let Some(address) = lock(&self.addresses).get_mut(&id) {
            address.latitude = latitude;
            address.longitude = longitude;
        }
    }
}

#[async_trait]
impl AddressStore for MemoryAddresses {
    async fn find_address(
        &self,
        id: AddressId,
        user_id: UserId,
    ) -> Result<Option<Address>, RepositoryError> {
        Ok(lock(&self.addresses)
            .get(&id)
            .filter(|address| address.user_id == user_id)
            .cloned())
    }
}

// ============================================================================
// Carts
// ============================================================================

#[derive(Debug, Default)]
pub struct MemoryCarts {
    carts: Mutex<HashMap<UserId, Vec<LineRequest>>>,
}

impl MemoryCarts {
    pub fn set(&self, user_id: UserId, lines: Vec<LineRequest>) {
        lock(&self.carts).insert(user_id, lines);
    }

    #[must_use]
    pub fn lines(&self, user_id: UserId) -> Vec<LineRequest> {
        lock(&self.carts).get(&user_id).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl CartStore for MemoryCarts {
    async fn cart_lines(&self, user_id: UserId) -> Result<Vec<LineRequest>, RepositoryError> {
        Ok(self.lines(user_id))
    }

    async fn clear_cart(&self, user_id: UserId) -> Result<(), RepositoryError> {
        lock(&self.carts).remove(&user_id);
        Ok(())
    }
}

// ============================================================================
// Orders
// ============================================================================

#[derive(Debug, Default)]
pub struct MemoryOrders {
    orders: Mutex<Vec<Order>>,
    fail_creates: AtomicBool,
    race_next_find: Mutex<Option<OrderStatus>>,
}

impl MemoryOrders {
    #[must_use]
    pub fn all(&self) -> Vec<Order> {
        lock(&self.orders).clone()
    }

    #[must_use]
    pub fn get(&self, id: OrderId) -> Option<Order> {
        lock(&self.orders).iter().find(|order| order.id == id).cloned()
    }

    /// Make every `create_order` call fail.
    pub fn fail_creates(&self) {
        self.fail_creates.store(true, Ordering::SeqCst);
    }

    /// Let the next `find_order` return the current order, then move the
    /// stored copy to `status` as another writer would.
    pub fn race_next_find(&self, status: OrderStatus) {
        *lock(&self.race_next_find) = Some(status);
    }

    /// Force an order's status, bypassing the lifecycle.
    pub fn force_status(&self, id: OrderId, status: OrderStatus) {
        if let Some(order) = lock(&self.orders).iter_mut().find(|order| order.id == id) {
            order.status = status;
        }
    }
}

#[async_trait]
impl OrderStore for MemoryOrders {
    async fn create_order(&self, order: NewOrder) -> Result<Order, RepositoryError> {
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(unavailable("order store"));
        }

        let mut orders = lock(&self.orders);
        let next = i32::try_from(orders.len() + 1).unwrap_or(i32::MAX);
        let order = Order::from_new(OrderId::new(next), order, Utc::now());
        orders.push(order.clone());
        Ok(order)
    }

    async fn find_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let found = self.get(id);
        if let Some(status) = lock(&self.race_next_find).take() {
            self.force_status(id, status);
        }
        Ok(found)
    }

    async fn save_lifecycle(
        &self,
        order: &Order,
        from: OrderStatus,
    ) -> Result<(), RepositoryError> {
        let mut orders = lock(&self.orders);
        let stored = orders
            .iter_mut()
            .find(|stored| stored.id == order.id)
            .ok_or(RepositoryError::NotFound)?;
        if stored.status != from {
            return Err(RepositoryError::Conflict(format!(
                "order {} is no longer {from}",
                order.id
            )));
        }

        stored.status = order.status;
        stored.is_paid = order.is_paid;
        stored.paid_at = order.paid_at;
        stored.payment_result.clone_from(&order.payment_result);
        stored.is_delivered = order.is_delivered;
        stored.delivered_at = order.delivered_at;
        Ok(())
    }
}

// ============================================================================
// Coupons
// ============================================================================

#[derive(Debug)]
pub struct MemoryCoupons {
    coupons: Mutex<Vec<Coupon>>,
    orders: Arc<MemoryOrders>,
    increments: AtomicUsize,
}

impl MemoryCoupons {
    #[must_use]
    pub fn new(orders: Arc<MemoryOrders>) -> Self {
        Self {
            coupons: Mutex::new(Vec::new()),
            orders,
            increments: AtomicUsize::new(0),
        }
    }

    pub fn insert(&self, coupon: Coupon) {
        lock(&self.coupons).push(coupon);
    }

    #[must_use]
    pub fn get(&self, id: CouponId) -> Option<Coupon> {
        lock(&self.coupons).iter().find(|c| c.id == id).cloned()
    }

    /// How many times usage was incremented.
    #[must_use]
    pub fn increments(&self) -> usize {
        self.increments.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CouponStore for MemoryCoupons {
    async fn find_active_by_code(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Coupon>, RepositoryError> {
        let code = code.trim().to_uppercase();
        Ok(lock(&self.coupons)
            .iter()
            .find(|c| c.code == code && c.is_live(now))
            .cloned())
    }

    async fn create_coupon(&self, coupon: NewCoupon) -> Result<Coupon, RepositoryError> {
        let mut coupons = lock(&self.coupons);
        if coupons.iter().any(|c| c.code == coupon.code) {
            return Err(RepositoryError::Conflict("coupon code already exists".to_string()));
        }

        let next = i32::try_from(coupons.len() + 1).unwrap_or(i32::MAX);
        let created = Coupon {
            id: CouponId::new(next),
            code: coupon.code,
            discount_type: coupon.discount_type,
            discount_amount: coupon.discount_amount,
            min_purchase: coupon.min_purchase,
            max_discount: coupon.max_discount,
            start_date: coupon.start_date,
            expire_date: coupon.expire_date,
            total_used: 0,
            max_total_uses: coupon.max_total_uses,
            limit_for_same_user: coupon.limit_for_same_user,
            is_active: true,
        };
        coupons.push(created.clone());
        Ok(created)
    }

    async fn increment_usage(&self, id: CouponId) -> Result<Coupon, RepositoryError> {
        let mut coupons = lock(&self.coupons);
        let coupon = coupons
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(RepositoryError::NotFound)?;
        coupon.total_used += 1;
        self.increments.fetch_add(1, Ordering::SeqCst);
        Ok(coupon.clone())
    }

    async fn count_user_orders_with_coupon(
        &self,
        user_id: UserId,
        code: &str,
        excluded: &[OrderStatus],
    ) -> Result<u32, RepositoryError> {
        let count = self
            .orders
            .all()
            .iter()
            .filter(|order| order.user_id == user_id)
            .filter(|order| !excluded.contains(&order.status))
            .filter(|order| {
                order
                    .coupon
                    .as_ref()
                    .is_some_and(|applied| applied.code.eq_ignore_ascii_case(code))
            })
            .count();
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn deactivate(&self, id: CouponId) -> Result<(), RepositoryError> {
        if let Some(coupon) = lock(&self.coupons).iter_mut().find(|c| c.id == id) {
            coupon.is_active = false;
        }
        Ok(())
    }
}

// ============================================================================
// Ledger
// ============================================================================

#[derive(Debug, Default)]
pub struct MemoryLedger {
    balances: Mutex<HashMap<(UserId, LedgerKind), Decimal>>,
    users: Mutex<HashSet<UserId>>,
    entries: Mutex<Vec<LedgerEntry>>,
}

impl MemoryLedger {
    pub fn add_user(&self, user_id: UserId) {
        lock(&self.users).insert(user_id);
    }

    #[must_use]
    pub fn balance(&self, user_id: UserId, kind: LedgerKind) -> Decimal {
        lock(&self.balances)
            .get(&(user_id, kind))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    #[must_use]
    pub fn entries(&self) -> Vec<LedgerEntry> {
        lock(&self.entries).clone()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn apply_entry(
        &self,
        user_id: UserId,
        kind: LedgerKind,
        entry: &EntryRequest,
    ) -> Result<LedgerEntry, LedgerWriteError> {
        if !lock(&self.users).contains(&user_id) {
            return Err(LedgerWriteError::UserNotFound);
        }

        let mut balances = lock(&self.balances);
        let balance = balances.entry((user_id, kind)).or_insert(Decimal::ZERO);
        let after = entry.apply_to(*balance)?;
        *balance = after;

        let recorded = LedgerEntry {
            user_id,
            kind,
            direction: entry.direction,
            amount: entry.amount,
            reason: entry.reason.clone(),
            balance_after: after,
            created_at: Utc::now(),
        };
        lock(&self.entries).push(recorded.clone());
        Ok(recorded)
    }
}
