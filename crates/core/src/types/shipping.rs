//! Shipping pricing.

use serde::{Deserialize, Serialize};

use super::Money;

/// Flat-rate shipping waived at or above a subtotal threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingPolicy {
    /// Subtotals at or above this amount ship free.
    pub free_from: Money,
    /// Fee charged below the threshold.
    pub flat_fee: Money,
}

impl Default for ShippingPolicy {
    fn default() -> Self {
        Self {
            free_from: Money::new(50_000),
            flat_fee: Money::new(5_000),
        }
    }
}

/// Money breakdown of an order.
///
/// `total = subtotal + shipping - discount` always holds for values built
/// by [`ShippingPolicy::quote`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Money,
    pub shipping: Money,
    pub discount: Money,
    pub total: Money,
}

impl ShippingPolicy {
    #[must_use]
    pub fn shipping_for(&self, subtotal: Money) -> Money {
        if subtotal < self.free_from {
            self.flat_fee
        } else {
            Money::ZERO
        }
    }

    /// Price an order with this policy. No discounts are applied.
    #[must_use]
    pub fn quote(&self, subtotal: Money) -> OrderTotals {
        let shipping = self.shipping_for(subtotal);
        let discount = Money::ZERO;
        OrderTotals {
            subtotal,
            shipping,
            discount,
            total: subtotal + shipping - discount,
        }
    }

    /// How much more the customer must add to get free shipping.
    #[must_use]
    pub fn remaining_for_free_shipping(&self, subtotal: Money) -> Money {
        if subtotal < self.free_from {
            self.free_from - subtotal
        } else {
            Money::ZERO
        }
    }
}
