//! Persistence for the storefront.
//!
//! # Stores
//!
//! Each aggregate has a store trait ([`ProductStore`], [`CartStore`],
//! [`AddressStore`], [`OrderStore`], [`UserStore`], [`ReviewStore`]) and the
//! [`Store`] trait ties them together. Services only ever see `&dyn Store`.
//!
//! - [`PgStore`] - `PostgreSQL`, schema `storefront` (production)
//! - [`MemoryStore`] - in-process maps behind one mutex (tests, local demos)
//!
//! Multi-row invariants are the store's job: placing an order, changing an
//! order's status and switching the default address each happen atomically
//! inside the store, never as a sequence of calls from a service.
//!
//! ## Tables
//!
//! - `product`, `review`, `testimonial` - catalog
//! - `cart`, `cart_line` - carts keyed by user or guest session token
//! - `address` - saved shipping addresses
//! - `order`, `order_line` - placed orders and their snapshots
//! - `user`, `profile` - customer accounts
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p tienda-cli -- migrate
//! ```

mod addresses;
mod carts;
pub mod memory;
mod orders;
mod products;
mod reviews;
mod users;

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use tienda_core::{
    AddressId, CartId, CartLineId, Email, InvalidTransition, OrderId, OrderNumber, OrderStatus,
    ProductId, ReviewId, UserId,
};

use crate::models::{
    Address, AddressFields, Cart, CartLine, CartOwner, DraftError, NewProduct, NewReview,
    NewTestimonial, NewUser, Order, OrderSummary, PlaceOrder, Product, ProductFilter, ProductSort,
    Profile, ProfileFields, Review, Testimonial, User,
};

pub use memory::MemoryStore;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found (or is not visible to the caller).
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Why a cart could not be turned into an order.
#[derive(Debug, Error)]
pub enum PlaceOrderError {
    #[error(transparent)]
    Rejected(#[from] DraftError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for PlaceOrderError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(e.into())
    }
}

/// Why an order status change was refused.
#[derive(Debug, Error)]
pub enum StatusChangeError {
    #[error(transparent)]
    Transition(#[from] InvalidTransition),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for StatusChangeError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(e.into())
    }
}

/// Catalog reads and maintenance.
#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    async fn count_products(&self, filter: &ProductFilter) -> Result<u64, RepositoryError>;

    async fn list_products(
        &self,
        filter: &ProductFilter,
        sort: ProductSort,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<Product>, RepositoryError>;

    /// Newest active products.
    async fn newest_products(&self, limit: u32) -> Result<Vec<Product>, RepositoryError>;

    /// Every product, active or not, by ascending id.
    async fn all_products(&self) -> Result<Vec<Product>, RepositoryError>;

    /// Distinct categories of active products, sorted.
    async fn categories(&self) -> Result<Vec<String>, RepositoryError>;

    async fn create_product(&self, product: &NewProduct) -> Result<Product, RepositoryError>;

    /// Overwrite a product's data.
    ///
    /// Returns `RepositoryError::NotFound` when no product has `id`.
    async fn update_product(
        &self,
        id: ProductId,
        product: &NewProduct,
    ) -> Result<Product, RepositoryError>;
}

/// Carts and their lines.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// The owner's cart, created on first use.
    async fn cart_for(&self, owner: &CartOwner) -> Result<Cart, RepositoryError>;

    /// Lines joined with their products, oldest first.
    async fn cart_lines(&self, cart: CartId) -> Result<Vec<CartLine>, RepositoryError>;

    async fn cart_line(&self, line: CartLineId) -> Result<Option<CartLine>, RepositoryError>;

    /// Add one unit of `product`: insert a line or bump the existing one in a
    /// single atomic step. Returns the line and its new quantity, or `None`
    /// when the product has no stock left for another unit.
    async fn add_one_to_cart(
        &self,
        cart: CartId,
        product: ProductId,
    ) -> Result<Option<(CartLineId, u32)>, RepositoryError>;

    /// Returns `RepositoryError::Conflict` if the cart already has a line for
    /// `product`.
    async fn insert_cart_line(
        &self,
        cart: CartId,
        product: ProductId,
        quantity: u32,
    ) -> Result<CartLineId, RepositoryError>;

    async fn set_cart_line_quantity(
        &self,
        line: CartLineId,
        quantity: u32,
    ) -> Result<(), RepositoryError>;

    async fn delete_cart_line(&self, line: CartLineId) -> Result<(), RepositoryError>;

    /// Delete every line; returns how many were removed.
    async fn clear_cart(&self, cart: CartId) -> Result<u64, RepositoryError>;
}

/// Saved shipping addresses. Every call is scoped to the owning user, and
/// another user's address behaves exactly like a missing one.
#[async_trait]
pub trait AddressStore: Send + Sync {
    /// Default first, then newest first.
    async fn addresses(&self, user: UserId) -> Result<Vec<Address>, RepositoryError>;

    async fn address(&self, user: UserId, id: AddressId)
    -> Result<Option<Address>, RepositoryError>;

    /// Insert (`id` is `None`) or edit an address and set its default flag in
    /// one transaction. With `is_default` every other address of `user`
    /// loses the flag first.
    async fn save_address(
        &self,
        user: UserId,
        id: Option<AddressId>,
        fields: &AddressFields,
        is_default: bool,
    ) -> Result<Address, RepositoryError>;

    /// Atomically clear the flag on every other address of `user` and set it
    /// on `id`.
    async fn set_default_address(&self, user: UserId, id: AddressId)
    -> Result<(), RepositoryError>;

    async fn delete_address(&self, user: UserId, id: AddressId) -> Result<(), RepositoryError>;
}

/// Orders.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Turn the cart into an order in one transaction.
    ///
    /// Reads and locks the cart's lines and products, builds an
    /// [`OrderDraft`](crate::models::OrderDraft) from them, optionally saves
    /// the address, writes the order with a fresh order number, decrements
    /// stock and empties the cart. Any failure leaves everything untouched.
    async fn place_order(
        &self,
        cart: CartId,
        request: &PlaceOrder,
    ) -> Result<Order, PlaceOrderError>;

    async fn order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;

    async fn order_by_number(
        &self,
        number: &OrderNumber,
    ) -> Result<Option<Order>, RepositoryError>;

    /// Newest first.
    async fn orders_for_user(&self, user: UserId) -> Result<Vec<OrderSummary>, RepositoryError>;

    /// Move an order along its lifecycle in one transaction.
    ///
    /// Restores stock when cancelling and stamps `paid_at`, `shipped_at` or
    /// `delivered_at` for the matching target status.
    async fn change_order_status(
        &self,
        id: OrderId,
        next: OrderStatus,
    ) -> Result<Order, StatusChangeError>;
}

/// Accounts and profiles.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Returns `RepositoryError::Conflict` naming `username` or `email` when
    /// either is taken.
    async fn create_user(&self, user: &NewUser) -> Result<User, RepositoryError>;

    async fn user(&self, id: UserId) -> Result<Option<User>, RepositoryError>;

    /// Look up by username or email, returning the password hash too.
    async fn user_for_login(&self, login: &str)
    -> Result<Option<(User, String)>, RepositoryError>;

    async fn username_exists(&self, username: &str) -> Result<bool, RepositoryError>;

    async fn email_owner(&self, email: &Email) -> Result<Option<UserId>, RepositoryError>;

    async fn update_user(
        &self,
        id: UserId,
        first_name: &str,
        last_name: &str,
        email: &Email,
    ) -> Result<User, RepositoryError>;

    async fn profile(&self, user: UserId) -> Result<Option<Profile>, RepositoryError>;

    /// Returns `RepositoryError::Conflict` if the user already has one.
    async fn create_profile(&self, user: UserId) -> Result<Profile, RepositoryError>;

    async fn update_profile(
        &self,
        user: UserId,
        fields: &ProfileFields,
    ) -> Result<Profile, RepositoryError>;
}

/// Reviews and testimonials.
#[async_trait]
pub trait ReviewStore: Send + Sync {
    /// Approved reviews of `product`, newest first.
    async fn approved_reviews(&self, product: ProductId) -> Result<Vec<Review>, RepositoryError>;

    /// Unapproved reviews across the catalog, oldest first.
    async fn pending_reviews(&self) -> Result<Vec<Review>, RepositoryError>;

    /// Returns `RepositoryError::Conflict` if the user already reviewed the
    /// product.
    async fn create_review(&self, review: &NewReview) -> Result<Review, RepositoryError>;

    async fn set_review_approved(
        &self,
        id: ReviewId,
        approved: bool,
    ) -> Result<Review, RepositoryError>;

    /// Active, featured testimonials, newest first.
    async fn featured_testimonials(&self, limit: u32)
    -> Result<Vec<Testimonial>, RepositoryError>;

    async fn create_testimonial(
        &self,
        testimonial: &NewTestimonial,
    ) -> Result<Testimonial, RepositoryError>;
}

/// Everything the storefront persists.
#[async_trait]
pub trait Store:
    ProductStore + CartStore + AddressStore + OrderStore + UserStore + ReviewStore
{
    /// Cheap round trip used by the readiness check.
    async fn ping(&self) -> Result<(), RepositoryError>;
}

/// `PostgreSQL` implementation of every store trait.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Map a unique violation to `Conflict(what)`, anything else to `Database`.
fn conflict_on_unique(e: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(what.to_owned());
    }
    RepositoryError::Database(e)
}

/// Convert a non-negative `INTEGER` column to `u32`.
fn to_u32(value: i32, column: &str) -> Result<u32, RepositoryError> {
    u32::try_from(value)
        .map_err(|_| RepositoryError::DataCorruption(format!("negative {column}: {value}")))
}

/// Convert a `u32` to an `INTEGER` bind parameter.
fn to_i32(value: u32, what: &str) -> Result<i32, RepositoryError> {
    i32::try_from(value)
        .map_err(|_| RepositoryError::Conflict(format!("{what} out of range: {value}")))
}
