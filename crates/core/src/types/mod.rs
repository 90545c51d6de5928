//! Core value types for Green Basket.
//!
//! Type-safe ids, money helpers, and the status enums shared by every crate.

pub mod id;
pub mod money;
pub mod status;

pub use id::*;
pub use money::{CurrencyCode, MONEY_SCALE, MoneyError, from_minor_units, round_money, to_minor_units};
pub use status::*;
