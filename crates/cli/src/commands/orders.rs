//! Order management commands.
//!
//! Payments and shipping happen outside the storefront; operators record
//! them here so customers see the new status.

use tienda_core::{OrderNumber, OrderStatus};
use tienda_storefront::db::PgStore;
use tienda_storefront::services::OrderLifecycle;

use super::CommandError;

/// Move an order to `status`.
///
/// Cancelling puts the order's items back in stock.
///
/// # Errors
///
/// Returns an error for a malformed number or status, an unknown order, or
/// a transition the lifecycle forbids.
pub async fn advance(number: &str, status: &str) -> Result<(), CommandError> {
    let number =
        OrderNumber::parse(number).map_err(|e| CommandError::InvalidArgument(e.to_string()))?;
    let status: OrderStatus = status.parse().map_err(CommandError::InvalidArgument)?;

    let store = PgStore::new(super::connect().await?);
    let order = OrderLifecycle::new(&store).advance(&number, status).await?;

    tracing::info!(
        order_number = %order.number,
        status = %order.status,
        "Order is now {}",
        order.status.label()
    );
    Ok(())
}
