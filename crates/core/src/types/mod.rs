//! Core types for Tienda.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod money;
pub mod order_number;
pub mod rating;
pub mod region;
pub mod shipping;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use money::Money;
pub use order_number::{OrderNumber, OrderNumberError};
pub use rating::{Rating, RatingError};
pub use region::{Region, UnknownRegion};
pub use shipping::{OrderTotals, ShippingPolicy};
pub use status::*;
