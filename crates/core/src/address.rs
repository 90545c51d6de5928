//! Address book entries and the frozen shipping snapshot stored on orders.

use serde::{Deserialize, Serialize};

use crate::geo::LonLat;
use crate::types::{AddressId, UserId};

/// A saved shopper address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub id: AddressId,
    pub user_id: UserId,
    pub full_name: String,
    pub phone: String,
    pub line1: String,
    pub line2: Option<String>,
    pub landmark: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub is_default: bool,
}

impl Address {
    /// The stored coordinates, longitude first, if both are present.
    #[must_use]
    pub fn location(&self) -> Option<LonLat> {
        match (self.longitude, self.latitude) {
            (Some(lon), Some(lat)) => Some(LonLat::new(lon, lat)),
            _ => None,
        }
    }
}

/// Copy of the delivery address embedded in an order.
///
/// This is a full structured copy, not a reference: later edits to the
/// address book never change historical orders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub full_name: String,
    pub phone: String,
    pub line1: String,
    pub line2: Option<String>,
    pub landmark: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl From<&Address> for ShippingAddress {
    fn from(address: &Address) -> Self {
        Self {
            full_name: address.full_name.clone(),
            phone: address.phone.clone(),
            line1: address.line1.clone(),
            line2: address.line2.clone(),
            landmark: address.landmark.clone(),
            city: address.city.clone(),
            state: address.state.clone(),
            postal_code: address.postal_code.clone(),
            country: address.country.clone(),
            latitude: address.latitude,
            longitude: address.longitude,
        }
    }
}
