//! Shopping carts.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use tienda_core::{CartId, CartLineId, Money, ProductId, UserId};

/// Who a cart belongs to.
///
/// A signed-in customer has one cart keyed by user; a guest has one keyed by
/// the token kept in their session. The two are never merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CartOwner {
    User(UserId),
    Session(Uuid),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cart {
    pub id: CartId,
    pub owner: CartOwner,
    pub created_at: DateTime<Utc>,
}

/// A cart line joined with the current state of its product.
///
/// Price, name and stock are read live from the product, so totals always
/// reflect today's prices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    pub id: CartLineId,
    pub cart_id: CartId,
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_price: Money,
    pub stock: u32,
    pub image: Option<String>,
    pub quantity: u32,
}

impl CartLine {
    #[must_use]
    pub fn subtotal(&self) -> Money {
        self.unit_price.times(self.quantity)
    }
}

/// Derived cart totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CartTotals {
    pub item_count: u32,
    pub total: Money,
}

impl CartTotals {
    #[must_use]
    pub fn of(lines: &[CartLine]) -> Self {
        Self {
            item_count: lines.iter().map(|l| l.quantity).sum(),
            total: lines.iter().map(CartLine::subtotal).sum(),
        }
    }
}
