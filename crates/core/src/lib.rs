//! Green Basket Core - Domain types and rules for order finalization.
//!
//! This crate provides the types and pure algorithms shared by the other
//! Green Basket components:
//! - `storefront` - Order, payment and admin API server
//! - `cli` - Command-line tools for migrations and zone checks
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no
//! database access, no HTTP clients. Everything here can be unit tested
//! without a runtime.
//!
//! # Modules
//!
//! - [`types`] - Newtype ids, money helpers, order status machine
//! - [`geo`] - Point-in-polygon and delivery-zone loading
//! - [`pricing`] - Line validation, tax apportionment, shipping and totals
//! - [`coupon`] - Coupon definitions and usage rules
//! - [`order`] - Order snapshots and status transitions
//! - [`ledger`] - Wallet and loyalty balance entries

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod address;
pub mod catalog;
pub mod coupon;
pub mod geo;
pub mod ledger;
pub mod order;
pub mod pricing;
pub mod types;

pub use types::*;
