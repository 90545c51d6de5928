//! Catalog items as seen by order finalization.
//!
//! The catalog owns these records; the order subsystem only reads them and
//! decrements stock.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{CategoryId, ItemId};

/// A catalog line that can be ordered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: ItemId,
    pub category_id: Option<CategoryId>,
    pub name: String,
    /// Authoritative unit price. Client-submitted prices are never used.
    pub price: Decimal,
    /// Sales unit shown next to the quantity ("kg", "pack").
    pub unit: Option<String>,
    pub stock: i32,
    /// When false, stock is treated as unlimited.
    pub manage_stock: bool,
    pub is_active: bool,
    pub taxable: bool,
    /// CGST rate in percent.
    pub cgst_rate: Decimal,
    /// SGST rate in percent.
    pub sgst_rate: Decimal,
    /// Reference to the item's display image in media storage.
    pub image: Option<String>,
}

impl Item {
    /// Combined tax rate in percent, zero for non-taxable items.
    #[must_use]
    pub fn tax_rate(&self) -> Decimal {
        if self.taxable {
            self.cgst_rate + self.sgst_rate
        } else {
            Decimal::ZERO
        }
    }

    /// Whether `quantity` units can be sold right now.
    #[must_use]
    pub fn can_fulfil(&self, quantity: u32) -> bool {
        !self.manage_stock || i64::from(self.stock) >= i64::from(quantity)
    }
}

/// Outcome of an atomic stock decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockDecrement {
    /// Stock was reduced by the full quantity.
    Applied { remaining: i32 },
    /// Not enough stock was left; the counter was floored at zero.
    Clamped { requested: u32 },
    /// The item does not track stock.
    Unmanaged,
    /// The item no longer exists.
    Missing,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(stock: i32, manage_stock: bool) -> Item {
        Item {
            id: ItemId::new(1),
            category_id: None,
            name: "Alphonso Mango".to_string(),
            price: Decimal::from(100),
            unit: Some("dozen".to_string()),
            stock,
            manage_stock,
            is_active: true,
            taxable: true,
            cgst_rate: Decimal::from(9),
            sgst_rate: Decimal::from(9),
            image: None,
        }
    }

    #[test]
    fn test_tax_rate_sums_cgst_and_sgst() {
        assert_eq!(item(5, true).tax_rate(), Decimal::from(18));
    }

    #[test]
    fn test_tax_rate_zero_when_not_taxable() {
        let mut exempt = item(5, true);
        exempt.taxable = false;
        assert_eq!(exempt.tax_rate(), Decimal::ZERO);
    }

    #[test]
    fn test_can_fulfil_respects_managed_stock() {
        assert!(item(3, true).can_fulfil(3));
        assert!(!item(3, true).can_fulfil(4));
        assert!(item(0, false).can_fulfil(500));
    }
}
