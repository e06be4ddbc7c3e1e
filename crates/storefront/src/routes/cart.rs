//! Cart route handlers.
//!
//! The cart page is server-rendered; the buttons on it and on product cards
//! call these endpoints with `fetch` (see `static/js/cart.js`) and get JSON
//! back. Plain form posts without JavaScript are redirected instead.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Json,
    extract::{Path, Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use tienda_core::{CartLineId, Money, ProductId, ShippingPolicy};

use crate::error::AppError;
use crate::filters;
use crate::middleware::{OptionalAuth, cart_owner};
use crate::models::{Cart, CartLine, CartTotals, CurrentUser};
use crate::routes::{Layout, MessageQuery, is_ajax, redirect_error, redirect_success};
use crate::services::{CartError, CartService, CartUpdate};
use crate::state::AppState;

// =============================================================================
// JSON bodies
// =============================================================================

/// Successful cart mutation.
#[derive(Debug, Serialize)]
pub struct CartResponse {
    pub success: bool,
    pub message: String,
    /// Subtotal of the touched line, in pesos.
    pub subtotal: i64,
    /// Cart total, in pesos.
    pub total: i64,
    pub total_items: u32,
}

impl From<CartUpdate> for CartResponse {
    fn from(update: CartUpdate) -> Self {
        Self {
            success: true,
            message: update.message,
            subtotal: update.line_subtotal.amount(),
            total: update.totals.total.amount(),
            total_items: update.totals.item_count,
        }
    }
}

/// Failed cart mutation.
#[derive(Debug, Serialize)]
pub struct CartFailure {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct CartCount {
    pub total_items: u32,
}

/// Render a cart error as `{success: false, message}`.
///
/// Server-side failures still go through `AppError` so they reach Sentry.
fn failure(err: CartError) -> Response {
    match err.customer_message() {
        Some(message) => {
            let status = AppError::Cart(err).status();
            (
                status,
                Json(CartFailure {
                    success: false,
                    message,
                }),
            )
                .into_response()
        }
        None => AppError::Cart(err).into_response(),
    }
}

// =============================================================================
// Cart page
// =============================================================================

#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub layout: Layout,
    pub lines: Vec<CartLine>,
    pub totals: CartTotals,
    pub shipping: ShippingPolicy,
}

impl CartShowTemplate {
    /// How much more the customer needs to spend for free shipping.
    #[must_use]
    pub fn remaining_for_free_shipping(&self) -> Money {
        self.shipping.remaining_for_free_shipping(self.totals.total)
    }
}

async fn load_cart(
    state: &AppState,
    session: &Session,
    user: Option<&CurrentUser>,
) -> Result<Cart, AppError> {
    let owner = cart_owner(session, user).await?;
    Ok(CartService::new(state.store()).resolve(&owner).await?)
}

/// Display the cart page.
#[instrument(skip(state, session, query))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Query(query): Query<MessageQuery>,
) -> Result<CartShowTemplate, AppError> {
    let cart = load_cart(&state, &session, user.as_ref()).await?;
    let carts = CartService::new(state.store());
    let lines = carts.lines(&cart).await?;
    let totals = CartTotals::of(&lines);
    let layout = Layout::load(&state, &session, user, query).await?;

    Ok(CartShowTemplate {
        layout,
        lines,
        totals,
        shipping: state.shipping_policy(),
    })
}

// =============================================================================
// Mutations
// =============================================================================

/// Add one unit of a product.
#[instrument(skip(state, session, headers))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    headers: HeaderMap,
    Path(product_id): Path<i32>,
) -> Result<Response, AppError> {
    let cart = load_cart(&state, &session, user.as_ref()).await?;
    let result = CartService::new(state.store())
        .add_item(&cart, ProductId::new(product_id))
        .await;

    if is_ajax(&headers) {
        return Ok(match result {
            Ok(update) => Json(CartResponse::from(update)).into_response(),
            Err(err) => failure(err),
        });
    }

    match result {
        Ok(update) => Ok(redirect_success("/products", &update.message).into_response()),
        Err(err) => match err.customer_message() {
            Some(message) => Ok(redirect_error("/products", &message).into_response()),
            None => Err(err.into()),
        },
    }
}

/// Form body for a quantity change.
#[derive(Debug, Deserialize)]
pub struct UpdateForm {
    /// Kept as text so a malformed value gets a JSON answer, not a 422.
    pub cantidad: String,
}

/// Set a line's quantity. Always answers JSON.
#[instrument(skip(state, session, form))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Path(line_id): Path<i32>,
    Form(form): Form<UpdateForm>,
) -> Result<Response, AppError> {
    let Ok(quantity) = form.cantidad.trim().parse::<i64>() else {
        return Ok((
            axum::http::StatusCode::BAD_REQUEST,
            Json(CartFailure {
                success: false,
                message: "Cantidad inválida.".to_owned(),
            }),
        )
            .into_response());
    };

    let cart = load_cart(&state, &session, user.as_ref()).await?;
    let result = CartService::new(state.store())
        .set_quantity(&cart, CartLineId::new(line_id), quantity)
        .await;

    Ok(match result {
        Ok(update) => Json(CartResponse::from(update)).into_response(),
        Err(err) => failure(err),
    })
}

/// Remove a line from the cart.
#[instrument(skip(state, session, headers))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    headers: HeaderMap,
    Path(line_id): Path<i32>,
) -> Result<Response, AppError> {
    let cart = load_cart(&state, &session, user.as_ref()).await?;
    let result = CartService::new(state.store())
        .remove_item(&cart, CartLineId::new(line_id))
        .await;

    if is_ajax(&headers) {
        return Ok(match result {
            Ok(update) => Json(CartResponse::from(update)).into_response(),
            Err(err) => failure(err),
        });
    }

    match result {
        Ok(update) => Ok(redirect_success("/cart", &update.message).into_response()),
        Err(err) => match err.customer_message() {
            Some(message) => Ok(redirect_error("/cart", &message).into_response()),
            None => Err(err.into()),
        },
    }
}

/// Units in the cart, for the header badge.
#[instrument(skip(state, session))]
pub async fn count(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<Json<CartCount>, AppError> {
    let layout = Layout::load(&state, &session, user, MessageQuery::default()).await?;
    Ok(Json(CartCount {
        total_items: layout.cart_count,
    }))
}

/// Remove every line.
#[instrument(skip(state, session))]
pub async fn empty(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<Response, AppError> {
    let cart = load_cart(&state, &session, user.as_ref()).await?;
    let removed = CartService::new(state.store()).empty(&cart).await?;
    tracing::debug!(cart_id = %cart.id, removed, "Cart emptied");
    Ok(redirect_success("/cart", "Carrito vaciado.").into_response())
}
