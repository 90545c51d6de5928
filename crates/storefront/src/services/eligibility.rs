//! Delivery eligibility: may this address receive a home delivery?

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use greenbasket_core::address::Address;
use greenbasket_core::geo::DeliveryZone;
use greenbasket_core::types::{AddressId, DeliveryOption, UserId};

use super::error::OrderError;
use crate::db::AddressStore;

/// Combines the address book with the configured delivery zone.
#[derive(Clone)]
pub struct DeliveryEligibility {
    addresses: Arc<dyn AddressStore>,
    zone: Option<Arc<DeliveryZone>>,
}

impl DeliveryEligibility {
    /// Create the service. `zone = None` disables the geofence check.
    #[must_use]
    pub fn new(addresses: Arc<dyn AddressStore>, zone: Option<DeliveryZone>) -> Self {
        Self {
            addresses,
            zone: zone.map(Arc::new),
        }
    }

    /// Check that `shipping_address_id` can receive a home delivery.
    ///
    /// Returns `Ok(None)` without looking anything up when the order is not
    /// a home delivery. Otherwise returns the full address record.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` when the address id is missing or malformed
    /// - `NotFound` when the address does not belong to the user
    /// - `MissingCoordinates` / `OutOfZone` when a zone is configured and the
    ///   address has no location or lies outside it
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn check(
        &self,
        user_id: UserId,
        shipping_address_id: Option<&str>,
        option: DeliveryOption,
    ) -> Result<Option<Address>, OrderError> {
        if option != DeliveryOption::HomeDelivery {
            return Ok(None);
        }

        let raw = shipping_address_id
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
            .ok_or_else(|| {
                OrderError::InvalidInput("a shipping address is required for home delivery".to_string())
            })?;
        let address_id = raw.parse::<AddressId>().map_err(|e| {
            OrderError::InvalidInput(format!("invalid shipping address id: {e}"))
        })?;

        let address = self
            .addresses
            .find_address(address_id, user_id)
            .await?
            .ok_or_else(|| OrderError::NotFound("shipping address".to_string()))?;

        if let Some(zone) = &self.zone {
            let Some(location) = address.location() else {
                warn!(address_id = %address_id, "Address has no coordinates");
                return Err(OrderError::MissingCoordinates);
            };
            if !zone.contains(location) {
                debug!(
                    address_id = %address_id,
                    lon = location.lon,
                    lat = location.lat,
                    "Address outside delivery zone"
                );
                return Err(OrderError::OutOfZone);
            }
        }

        Ok(Some(address))
    }
}
