//! Tienda Core - Shared domain types.
//!
//! This crate provides the types shared by every Tienda component:
//! - `storefront` - Public-facing shop (catalog, cart, checkout, accounts)
//! - `cli` - Command-line tools for migrations, seeding and order handling
//!
//! # Architecture
//!
//! The core crate contains only types and pure business rules - no I/O, no
//! database access, no HTTP. Rules that must hold no matter which store
//! backs the shop (order state transitions, shipping pricing, order number
//! format) live here so every caller applies them the same way.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, money, emails, regions, order status and pricing

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
