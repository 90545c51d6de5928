//! Address book lookups for delivery eligibility.

use async_trait::async_trait;
use sqlx::PgPool;

use greenbasket_core::address::Address;
use greenbasket_core::types::{AddressId, UserId};

use super::RepositoryError;

/// Read access to the address book.
#[async_trait]
pub trait AddressStore: Send + Sync {
    /// Find an address by id, only if it belongs to `user_id`.
    async fn find_address(
        &self,
        id: AddressId,
        user_id: UserId,
    ) -> Result<Option<Address>, RepositoryError>;
}

#[derive(Debug, sqlx::FromRow)]
struct AddressRow {
    id: i32,
    user_id: i32,
    full_name: String,
    phone: String,
    line1: String,
    line2: Option<String>,
    landmark: Option<String>,
    city: String,
    state: String,
    postal_code: String,
    country: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
    is_default: bool,
}

impl From<AddressRow> for Address {
    fn from(row: AddressRow) -> Self {
        Self {
            id: AddressId::new(row.id),
            user_id: UserId::new(row.user_id),
            full_name: row.full_name,
            phone: row.phone,
            line1: row.line1,
            line2: row.line2,
            landmark: row.landmark,
            city: row.city,
            state: row.state,
            postal_code: row.postal_code,
            country: row.country,
            latitude: row.latitude,
            longitude: row.longitude,
            is_default: row.is_default,
        }
    }
}

/// `PostgreSQL` address repository.
#[derive(Debug, Clone)]
pub struct PgAddressRepository {
    pool: PgPool,
}

impl PgAddressRepository {
    /// Create a new address repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AddressStore for PgAddressRepository {
    async fn find_address(
        &self,
        id: AddressId,
        user_id: UserId,
    ) -> Result<Option<Address>, RepositoryError> {
        let row = sqlx::query_as::<_, AddressRow>(
            r"
            SELECT id, user_id, full_name, phone, line1, line2, landmark,
                   city, state, postal_code, country, latitude, longitude, is_default
            FROM storefront.address
            WHERE id = $1 AND user_id = $2
            ",
        )
        .bind(id.as_i32())
        .bind(user_id.as_i32())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Address::from))
    }
}
