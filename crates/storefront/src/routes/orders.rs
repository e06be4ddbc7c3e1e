//! Order history, detail and cancellation.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use tower_sessions::Session;
use tracing::instrument;

use tienda_core::OrderId;

use crate::error::AppError;
use crate::filters;
use crate::middleware::RequireAuth;
use crate::models::{Order, OrderSummary};
use crate::routes::{Layout, MessageQuery, redirect_error, redirect_success};
use crate::services::{OrderError, OrderLifecycle};
use crate::state::AppState;

#[derive(Template, WebTemplate)]
#[template(path = "orders/index.html")]
pub struct OrdersIndexTemplate {
    pub layout: Layout,
    pub orders: Vec<OrderSummary>,
}

#[derive(Template, WebTemplate)]
#[template(path = "orders/show.html")]
pub struct OrderShowTemplate {
    pub layout: Layout,
    pub order: Order,
}

#[derive(Template, WebTemplate)]
#[template(path = "orders/confirmation.html")]
pub struct OrderConfirmationTemplate {
    pub layout: Layout,
    pub order: Order,
}

/// The customer's orders, newest first.
#[instrument(skip(state, session, query), fields(user_id = %user.id))]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Query(query): Query<MessageQuery>,
) -> Result<OrdersIndexTemplate, AppError> {
    let orders = OrderLifecycle::new(state.store()).history(user.id).await?;
    let layout = Layout::load(&state, &session, Some(user), query).await?;
    Ok(OrdersIndexTemplate { layout, orders })
}

/// One order with its lines. Other customers' orders are a 404.
#[instrument(skip(state, session, query), fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i32>,
    Query(query): Query<MessageQuery>,
) -> Result<OrderShowTemplate, AppError> {
    let order = OrderLifecycle::new(state.store())
        .detail(user.id, OrderId::new(id))
        .await?;
    let layout = Layout::load(&state, &session, Some(user), query).await?;
    Ok(OrderShowTemplate { layout, order })
}

/// Thank-you page shown right after checkout.
#[instrument(skip(state, session, query), fields(user_id = %user.id))]
pub async fn confirmation(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i32>,
    Query(query): Query<MessageQuery>,
) -> Result<OrderConfirmationTemplate, AppError> {
    let order = OrderLifecycle::new(state.store())
        .detail(user.id, OrderId::new(id))
        .await?;
    let layout = Layout::load(&state, &session, Some(user), query).await?;
    Ok(OrderConfirmationTemplate { layout, order })
}

/// Cancel an order that hasn't shipped; its stock goes back on the shelf.
#[instrument(skip(state), fields(user_id = %user.id))]
pub async fn cancel(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i32>,
) -> Result<Response, AppError> {
    let back = format!("/orders/{id}");

    match OrderLifecycle::new(state.store())
        .cancel(user.id, OrderId::new(id))
        .await
    {
        Ok(order) => Ok(redirect_success(
            &back,
            &format!("Pedido #{} cancelado exitosamente", order.number),
        )
        .into_response()),
        Err(OrderError::InvalidTransition(_)) => {
            Ok(redirect_error(&back, "No se puede cancelar este pedido").into_response())
        }
        Err(err) => Err(err.into()),
    }
}
