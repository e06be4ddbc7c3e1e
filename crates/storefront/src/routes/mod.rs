//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                             - Home page (newest products, testimonials)
//!
//! # Products
//! GET  /products                     - Listing (categoria, q, orden, page)
//! GET  /products/{id}                - Product detail with reviews
//! POST /products/{id}/reviews        - Submit a review (auth)
//! GET  /api/products                 - JSON product list
//!
//! # Cart (JSON for XMLHttpRequest callers, redirects otherwise)
//! GET  /cart                         - Cart page
//! POST /cart/add/{product_id}        - Add one unit
//! POST /cart/update/{line_id}        - Set quantity (always JSON)
//! POST /cart/remove/{line_id}        - Remove line
//! GET  /cart/count                   - Item count badge
//! POST /cart/empty                   - Remove every line
//!
//! # Checkout & orders (auth)
//! GET  /checkout                     - Checkout page
//! POST /checkout                     - Place order
//! GET  /orders                       - Order history
//! GET  /orders/{id}                  - Order detail
//! GET  /orders/{id}/confirmation     - Order confirmation
//! POST /orders/{id}/cancel           - Cancel order
//!
//! # Address book (auth)
//! GET  /addresses                    - Address list
//! GET  /addresses/new                - New address form
//! POST /addresses/new                - Create address
//! GET  /addresses/{id}/edit          - Edit form
//! POST /addresses/{id}/edit          - Update address
//! POST /addresses/{id}/delete        - Delete address
//! POST /addresses/{id}/default       - Make default
//!
//! # Auth
//! GET  /auth/login                   - Login page
//! POST /auth/login                   - Login action (rate limited)
//! GET  /auth/register                - Register page
//! POST /auth/register                - Register action (rate limited)
//! POST /auth/logout                  - Logout action
//!
//! # Account (auth)
//! GET  /account/profile              - Profile form
//! POST /account/profile              - Update profile
//! ```

pub mod account;
pub mod addresses;
pub mod api;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod home;
pub mod orders;
pub mod products;

use axum::{
    Router,
    http::HeaderMap,
    response::Redirect,
    routing::{get, post},
};
use serde::Deserialize;
use tower_sessions::Session;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::auth_rate_limiter;
use crate::models::{CartOwner, CurrentUser, session_keys};
use crate::services::CartService;
use crate::state::AppState;

// =============================================================================
// Shared page data
// =============================================================================

/// Query parameters for error/success display after a redirect.
#[derive(Debug, Default, Deserialize)]
pub struct MessageQuery {
    pub error: Option<String>,
    pub success: Option<String>,
}

/// What the base template needs on every page.
#[derive(Debug, Clone, Default)]
pub struct Layout {
    pub user: Option<CurrentUser>,
    pub cart_count: u32,
    pub error: Option<String>,
    pub success: Option<String>,
}

impl Layout {
    /// Build the layout for the current visitor.
    ///
    /// Guests without a cart token show an empty badge; no cart is created
    /// just to count it.
    ///
    /// # Errors
    ///
    /// Returns `AppError` if the session or the store fails.
    pub async fn load(
        state: &AppState,
        session: &Session,
        user: Option<CurrentUser>,
        messages: MessageQuery,
    ) -> Result<Self, AppError> {
        let owner = match &user {
            Some(user) => Some(CartOwner::User(user.id)),
            None => session
                .get::<Uuid>(session_keys::CART_TOKEN)
                .await?
                .map(CartOwner::Session),
        };

        let cart_count = match owner {
            Some(owner) => {
                let carts = CartService::new(state.store());
                let cart = carts.resolve(&owner).await?;
                carts.totals(&cart).await?.item_count
            }
            None => 0,
        };

        Ok(Self {
            user,
            cart_count,
            error: messages.error,
            success: messages.success,
        })
    }

    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.user.is_some()
    }
}

// =============================================================================
// Redirect helpers
// =============================================================================

/// Redirect to `path` with a success message for the next page.
#[must_use]
pub fn redirect_success(path: &str, message: &str) -> Redirect {
    redirect_with(path, "success", message)
}

/// Redirect to `path` with an error message for the next page.
#[must_use]
pub fn redirect_error(path: &str, message: &str) -> Redirect {
    redirect_with(path, "error", message)
}

fn redirect_with(path: &str, key: &str, message: &str) -> Redirect {
    let separator = if path.contains('?') { '&' } else { '?' };
    Redirect::to(&format!(
        "{path}{separator}{key}={}",
        urlencoding::encode(message)
    ))
}

/// Whether the request came from the storefront's own `fetch` calls.
#[must_use]
pub fn is_ajax(headers: &HeaderMap) -> bool {
    headers
        .get("x-requested-with")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("XMLHttpRequest"))
}

/// A local path to return to after login, or `/`.
///
/// Only same-site absolute paths are accepted so the login form can't be
/// used as an open redirect.
#[must_use]
pub fn safe_next(next: Option<&str>) -> String {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => {
            path.to_string()
        }
        _ => "/".to_string(),
    }
}

// =============================================================================
// Routers
// =============================================================================

/// Create the auth routes router.
///
/// Login and registration are rate limited when enabled in config.
pub fn auth_routes(rate_limit: bool) -> Router<AppState> {
    let limited = Router::new()
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/register", get(auth::register_page).post(auth::register));
    let limited = if rate_limit {
        limited.layer(auth_rate_limiter())
    } else {
        limited
    };

    Router::new()
        .merge(limited)
        .route("/logout", post(auth::logout))
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{id}", get(products::show))
        .route("/{id}/reviews", post(products::submit_review))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add/{product_id}", post(cart::add))
        .route("/update/{line_id}", post(cart::update))
        .route("/remove/{line_id}", post(cart::remove))
        .route("/count", get(cart::count))
        .route("/empty", post(cart::empty))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index))
        .route("/{id}", get(orders::show))
        .route("/{id}/confirmation", get(orders::confirmation))
        .route("/{id}/cancel", post(orders::cancel))
}

/// Create the address book routes router.
pub fn address_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(addresses::index))
        .route("/new", get(addresses::new_page).post(addresses::create))
        .route("/{id}/edit", get(addresses::edit_page).post(addresses::update))
        .route("/{id}/delete", post(addresses::delete))
        .route("/{id}/default", post(addresses::set_default))
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new().route(
        "/profile",
        get(account::profile_page).post(account::update_profile),
    )
}

/// Create all routes for the storefront.
pub fn routes(rate_limit: bool) -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .nest("/products", product_routes())
        .route("/api/products", get(api::products::list))
        .nest("/cart", cart_routes())
        .route("/checkout", get(checkout::show).post(checkout::place))
        .nest("/orders", order_routes())
        .nest("/addresses", address_routes())
        .nest("/auth", auth_routes(rate_limit))
        .nest("/account", account_routes())
}
