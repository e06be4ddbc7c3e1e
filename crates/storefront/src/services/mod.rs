//! Business logic services for the storefront.
//!
//! Services are thin, request-scoped wrappers around `&dyn Store`: handlers
//! build one per request, call it, and map its error enum to a response.
//!
//! # Services
//!
//! - [`catalog`] - product listing, detail with reviews, home page picks
//! - [`cart`] - cart resolution, add/update/remove, totals
//! - [`addresses`] - the saved address book and its single default
//! - [`checkout`] - checkout preview and order placement
//! - [`orders`] - order history, cancellation, operator status changes
//! - [`auth`] - registration and login (argon2)
//! - [`profile`] - customer profile get-or-create and update
//! - [`reviews`] - review submission and moderation

pub mod addresses;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod orders;
pub mod profile;
pub mod reviews;

pub use addresses::{AddressBook, AddressError};
pub use auth::{AuthError, AuthService, Registration};
pub use cart::{CartError, CartService, CartUpdate};
pub use catalog::{CatalogError, CatalogService, ProductDetail};
pub use checkout::{CheckoutError, CheckoutPreview, CheckoutRequest, CheckoutService, ShipTo};
pub use orders::{OrderError, OrderLifecycle};
pub use profile::{ProfileError, ProfileService, ProfileUpdate};
pub use reviews::{ReviewError, ReviewService};
