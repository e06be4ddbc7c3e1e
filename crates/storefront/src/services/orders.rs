//! Order history and lifecycle.

use thiserror::Error;
use tracing::instrument;

use tienda_core::{InvalidTransition, OrderId, OrderNumber, OrderStatus, UserId};

use crate::db::{RepositoryError, StatusChangeError, Store};
use crate::models::{Order, OrderSummary};

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("order not found")]
    NotFound,

    /// The order exists but belongs to someone else. Handlers answer 404 so
    /// order ids can't be enumerated.
    #[error("order belongs to another customer")]
    NotOwned,

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<RepositoryError> for OrderError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound => Self::NotFound,
            other => Self::Repository(other),
        }
    }
}

impl From<StatusChangeError> for OrderError {
    fn from(e: StatusChangeError) -> Self {
        match e {
            StatusChangeError::Transition(t) => t.into(),
            StatusChangeError::Repository(repo) => repo.into(),
        }
    }
}

pub struct OrderLifecycle<'a> {
    store: &'a dyn Store,
}

impl<'a> OrderLifecycle<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// The user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` if the store fails.
    pub async fn history(&self, user: UserId) -> Result<Vec<OrderSummary>, OrderError> {
        Ok(self.store.orders_for_user(user).await?)
    }

    /// An order, only if `user` placed it.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` or `OrderError::NotOwned`.
    pub async fn detail(&self, user: UserId, id: OrderId) -> Result<Order, OrderError> {
        let order = self.store.order(id).await?.ok_or(OrderError::NotFound)?;
        if order.user_id != user {
            return Err(OrderError::NotOwned);
        }
        Ok(order)
    }

    /// Cancel the user's order and put its stock back.
    ///
    /// # Errors
    ///
    /// - `OrderError::NotFound` / `OrderError::NotOwned`
    /// - `OrderError::InvalidTransition` unless the order is pending payment
    ///   or paid
    #[instrument(skip(self), fields(user_id = %user, order_id = %id))]
    pub async fn cancel(&self, user: UserId, id: OrderId) -> Result<Order, OrderError> {
        self.detail(user, id).await?;
        let order = self
            .store
            .change_order_status(id, OrderStatus::Cancelled)
            .await?;
        tracing::info!(order_number = %order.number, "Order cancelled");
        Ok(order)
    }

    /// Move an order to `next` on behalf of an operator.
    ///
    /// # Errors
    ///
    /// - `OrderError::NotFound` for an unknown order number
    /// - `OrderError::InvalidTransition` for an edge the lifecycle forbids
    #[instrument(skip(self), fields(order_number = %number))]
    pub async fn advance(
        &self,
        number: &OrderNumber,
        next: OrderStatus,
    ) -> Result<Order, OrderError> {
        let order = self
            .store
            .order_by_number(number)
            .await?
            .ok_or(OrderError::NotFound)?;
        let order = self.store.change_order_status(order.id, next).await?;
        tracing::info!(status = %order.status, "Order status changed");
        Ok(order)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tienda_core::{Money, PaymentMethod, ProductId, Region, ShippingPolicy};

    use super::*;
    use crate::db::{CartStore, MemoryStore, OrderStore, ProductStore};
    use crate::models::{AddressFields, CartOwner, NewProduct, PlaceOrder};

    async fn place(
        store: &MemoryStore,
        user: UserId,
        stock: u32,
        quantity: u32,
    ) -> (Order, ProductId) {
        let product = store
            .create_product(&NewProduct {
                name: "Vela lavanda".to_owned(),
                category: "Velas".to_owned(),
                description: String::new(),
                price: Money::new(10_000),
                stock,
                image: None,
                active: true,
            })
            .await
            .unwrap();
        let cart = store.cart_for(&CartOwner::User(user)).await.unwrap();
        store
            .insert_cart_line(cart.id, product.id, quantity)
            .await
            .unwrap();
        let order = store
            .place_order(
                cart.id,
                &PlaceOrder {
                    user_id: user,
                    shipping: AddressFields {
                        full_name: "Camila Soto".to_owned(),
                        phone: "+56912345678".to_owned(),
                        street: "Av. Grecia 1234".to_owned(),
                        reference: None,
                        comuna: "Ñuñoa".to_owned(),
                        region: Region::Metropolitana,
                        postal_code: None,
                        country: "Chile".to_owned(),
                    },
                    save_address: false,
                    payment_method: PaymentMethod::Khipu,
                    notes: String::new(),
                    policy: ShippingPolicy::default(),
                },
            )
            .await
            .unwrap();
        (order, product.id)
    }

    async fn stock(store: &MemoryStore, product: ProductId) -> u32 {
        store.product(product).await.unwrap().unwrap().stock
    }

    #[tokio::test]
    async fn test_cancel_pending_restores_stock() {
        let store = MemoryStore::new();
        let user = UserId::new(1);
        let (order, product) = place(&store, user, 5, 2).await;
        assert_eq!(stock(&store, product).await, 3);

        let cancelled = OrderLifecycle::new(&store).cancel(user, order.id).await.unwrap();

        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(stock(&store, product).await, 5);
    }

    #[tokio::test]
    async fn test_cancel_twice_is_invalid_and_keeps_stock() {
        let store = MemoryStore::new();
        let user = UserId::new(1);
        let (order, product) = place(&store, user, 5, 2).await;
        let lifecycle = OrderLifecycle::new(&store);
        lifecycle.cancel(user, order.id).await.unwrap();

        let err = lifecycle.cancel(user, order.id).await.unwrap_err();

        assert!(matches!(err, OrderError::InvalidTransition(_)));
        assert_eq!(stock(&store, product).await, 5);
    }

    #[tokio::test]
    async fn test_cannot_cancel_shipped_order() {
        let store = MemoryStore::new();
        let user = UserId::new(1);
        let (order, product) = place(&store, user, 5, 2).await;
        let lifecycle = OrderLifecycle::new(&store);
        for next in [OrderStatus::Paid, OrderStatus::Processing, OrderStatus::Shipped] {
            lifecycle.advance(&order.number, next).await.unwrap();
        }

        let err = lifecycle.cancel(user, order.id).await.unwrap_err();

        assert!(matches!(err, OrderError::InvalidTransition(_)));
        assert_eq!(stock(&store, product).await, 3);
    }

    #[tokio::test]
    async fn test_advance_rejects_skipped_states() {
        let store = MemoryStore::new();
        let (order, _) = place(&store, UserId::new(1), 5, 1).await;

        let err = OrderLifecycle::new(&store)
            .advance(&order.number, OrderStatus::Delivered)
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn test_other_customers_order_is_hidden() {
        let store = MemoryStore::new();
        let (order, product) = place(&store, UserId::new(1), 5, 1).await;
        let lifecycle = OrderLifecycle::new(&store);

        let stranger = UserId::new(2);
        assert!(matches!(
            lifecycle.detail(stranger, order.id).await,
            Err(OrderError::NotOwned)
        ));
        assert!(matches!(
            lifecycle.cancel(stranger, order.id).await,
            Err(OrderError::NotOwned)
        ));
        assert_eq!(stock(&store, product).await, 4);
        assert!(lifecycle.history(stranger).await.unwrap().is_empty());
    }
}
