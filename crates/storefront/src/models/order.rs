//! Orders and the pure checkout draft.

use chrono::{DateTime, Utc};
use thiserror::Error;

use tienda_core::{
    Money, OrderId, OrderLineId, OrderNumber, OrderStatus, OrderTotals, PaymentMethod, ProductId,
    ShippingPolicy, UserId,
};

use super::{AddressFields, CartLine};

/// A placed order with its line snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub id: OrderId,
    pub number: OrderNumber,
    pub user_id: UserId,
    /// Copy of the destination taken when the order was placed.
    pub shipping: AddressFields,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub totals: OrderTotals,
    pub notes: String,
    pub payment_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub lines: Vec<OrderLine>,
}

impl Order {
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }
}

/// Snapshot of one purchased product.
///
/// `product_id` goes to `None` if the product is later deleted; name and
/// price never change after placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLine {
    pub id: OrderLineId,
    pub product_id: Option<ProductId>,
    pub product_name: String,
    pub unit_price: Money,
    pub quantity: u32,
}

impl OrderLine {
    #[must_use]
    pub fn subtotal(&self) -> Money {
        self.unit_price.times(self.quantity)
    }
}

/// Row of the order history list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSummary {
    pub id: OrderId,
    pub number: OrderNumber,
    pub status: OrderStatus,
    pub total: Money,
    pub item_count: u32,
    pub created_at: DateTime<Utc>,
}

/// Everything a store needs to turn a cart into an order.
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    pub user_id: UserId,
    pub shipping: AddressFields,
    /// Also keep `shipping` as a new (non-default) saved address.
    pub save_address: bool,
    pub payment_method: PaymentMethod,
    pub notes: String,
    pub policy: ShippingPolicy,
}

/// The checkout cannot go ahead with the cart as it is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DraftError {
    #[error("cart is empty")]
    EmptyCart,

    #[error("only {available} of {product} left, {requested} requested")]
    InsufficientStock {
        product_id: ProductId,
        product: String,
        available: u32,
        requested: u32,
    },
}

/// Line about to be written to an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_price: Money,
    pub quantity: u32,
}

/// Validated, priced checkout computed from cart lines.
///
/// Building a draft has no side effects; stores build one from lines read
/// inside their transaction so the checks run against locked rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDraft {
    pub lines: Vec<DraftLine>,
    pub totals: OrderTotals,
}

impl OrderDraft {
    /// Check stock and price the cart.
    ///
    /// # Errors
    ///
    /// - [`DraftError::EmptyCart`] when there are no lines
    /// - [`DraftError::InsufficientStock`] for the first line asking for more
    ///   than is in stock
    pub fn build(lines: &[CartLine], policy: &ShippingPolicy) -> Result<Self, DraftError> {
        if lines.is_empty() {
            return Err(DraftError::EmptyCart);
        }

        if let Some(short) = lines.iter().find(|l| l.quantity > l.stock) {
            return Err(DraftError::InsufficientStock {
                product_id: short.product_id,
                product: short.product_name.clone(),
                available: short.stock,
                requested: short.quantity,
            });
        }

        let subtotal = lines.iter().map(CartLine::subtotal).sum();
        let lines = lines
            .iter()
            .map(|l| DraftLine {
                product_id: l.product_id,
                product_name: l.product_name.clone(),
                unit_price: l.unit_price,
                quantity: l.quantity,
            })
            .collect();

        Ok(Self {
            lines,
            totals: policy.quote(subtotal),
        })
    }
}
