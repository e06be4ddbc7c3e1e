//! Cart operations.
//!
//! Stock checks here are advisory: they keep the cart sensible while the
//! customer shops. The authoritative check runs again inside the checkout
//! transaction.

use thiserror::Error;
use tracing::instrument;

use tienda_core::{CartLineId, Money, ProductId};

use crate::db::{RepositoryError, Store};
use crate::models::{Cart, CartLine, CartOwner, CartTotals};

#[derive(Debug, Error)]
pub enum CartError {
    #[error("product not found")]
    ProductNotFound,

    #[error("{product} is out of stock")]
    OutOfStock { product: String },

    #[error("only {available} of {product} in stock")]
    InsufficientStock { product: String, available: u32 },

    #[error("cart line not found")]
    LineNotFound,

    #[error("cart line belongs to another cart")]
    NotOwned,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl CartError {
    /// Message shown to the customer, `None` for server-side failures.
    #[must_use]
    pub fn customer_message(&self) -> Option<String> {
        match self {
            Self::ProductNotFound => Some("Producto no encontrado.".to_owned()),
            Self::OutOfStock { .. } => Some("Producto agotado.".to_owned()),
            Self::InsufficientStock { available, .. } => Some(format!(
                "Solo hay {available} unidades disponibles en stock."
            )),
            Self::LineNotFound => Some("El producto ya no está en el carrito.".to_owned()),
            Self::NotOwned => Some("Item no pertenece al carrito.".to_owned()),
            Self::Repository(_) => None,
        }
    }
}

/// Outcome of a cart mutation, ready to be rendered as JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartUpdate {
    pub message: String,
    /// Subtotal of the touched line; zero once it is gone.
    pub line_subtotal: Money,
    pub totals: CartTotals,
}

pub struct CartService<'a> {
    store: &'a dyn Store,
}

impl<'a> CartService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// The owner's cart, created on first use.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the store fails.
    pub async fn resolve(&self, owner: &CartOwner) -> Result<Cart, CartError> {
        Ok(self.store.cart_for(owner).await?)
    }

    /// Add one unit of a product.
    ///
    /// # Errors
    ///
    /// - `CartError::ProductNotFound` for unknown or inactive products
    /// - `CartError::OutOfStock` when the product has no stock
    /// - `CartError::InsufficientStock` when the cart already holds every unit
    #[instrument(skip(self, cart), fields(cart_id = %cart.id))]
    pub async fn add_item(
        &self,
        cart: &Cart,
        product: ProductId,
    ) -> Result<CartUpdate, CartError> {
        let product = self
            .store
            .product(product)
            .await?
            .filter(|p| p.active)
            .ok_or(CartError::ProductNotFound)?;

        if product.stock == 0 {
            return Err(CartError::OutOfStock {
                product: product.name,
            });
        }

        let Some((line_id, quantity)) = self.store.add_one_to_cart(cart.id, product.id).await?
        else {
            return Err(CartError::InsufficientStock {
                product: product.name,
                available: product.stock,
            });
        };

        let message = if quantity == 1 {
            format!("{} agregado al carrito.", product.name)
        } else {
            format!("{} agregado al carrito (cantidad {quantity}).", product.name)
        };

        self.update_summary(cart, line_id, message).await
    }

    /// Overwrite a line's quantity; zero or less removes it.
    ///
    /// # Errors
    ///
    /// - `CartError::LineNotFound` / `CartError::NotOwned` for foreign lines
    /// - `CartError::InsufficientStock` when `quantity` exceeds stock
    #[instrument(skip(self, cart), fields(cart_id = %cart.id))]
    pub async fn set_quantity(
        &self,
        cart: &Cart,
        line: CartLineId,
        quantity: i64,
    ) -> Result<CartUpdate, CartError> {
        let line = self.owned_line(cart, line).await?;

        if quantity <= 0 {
            self.store.delete_cart_line(line.id).await?;
            let message = format!("{} eliminado del carrito.", line.product_name);
            return self.update_summary(cart, line.id, message).await;
        }

        let available = line.stock;
        let quantity = u32::try_from(quantity)
            .ok()
            .filter(|q| *q <= available)
            .ok_or_else(|| CartError::InsufficientStock {
                product: line.product_name.clone(),
                available,
            })?;

        self.store.set_cart_line_quantity(line.id, quantity).await?;
        let message = format!(
            "Cantidad de {} actualizada a {quantity}.",
            line.product_name
        );
        self.update_summary(cart, line.id, message).await
    }

    /// # Errors
    ///
    /// Returns `CartError::LineNotFound` / `CartError::NotOwned` for foreign
    /// lines.
    #[instrument(skip(self, cart), fields(cart_id = %cart.id))]
    pub async fn remove_item(
        &self,
        cart: &Cart,
        line: CartLineId,
    ) -> Result<CartUpdate, CartError> {
        let line = self.owned_line(cart, line).await?;
        self.store.delete_cart_line(line.id).await?;
        let message = format!("{} eliminado del carrito.", line.product_name);
        self.update_summary(cart, line.id, message).await
    }

    /// # Errors
    ///
    /// Returns `CartError::Repository` if the store fails.
    pub async fn lines(&self, cart: &Cart) -> Result<Vec<CartLine>, CartError> {
        Ok(self.store.cart_lines(cart.id).await?)
    }

    /// # Errors
    ///
    /// Returns `CartError::Repository` if the store fails.
    pub async fn totals(&self, cart: &Cart) -> Result<CartTotals, CartError> {
        Ok(CartTotals::of(&self.lines(cart).await?))
    }

    /// Remove every line; returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the store fails.
    pub async fn empty(&self, cart: &Cart) -> Result<u64, CartError> {
        Ok(self.store.clear_cart(cart.id).await?)
    }

    async fn owned_line(&self, cart: &Cart, line: CartLineId) -> Result<CartLine, CartError> {
        let line = self
            .store
            .cart_line(line)
            .await?
            .ok_or(CartError::LineNotFound)?;
        if line.cart_id != cart.id {
            return Err(CartError::NotOwned);
        }
        Ok(line)
    }

    async fn update_summary(
        &self,
        cart: &Cart,
        line: CartLineId,
        message: String,
    ) -> Result<CartUpdate, CartError> {
        let lines = self.lines(cart).await?;
        let line_subtotal = lines
            .iter()
            .find(|l| l.id == line)
            .map_or(Money::ZERO, CartLine::subtotal);
        Ok(CartUpdate {
            message,
            line_subtotal,
            totals: CartTotals::of(&lines),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use uuid::Uuid;

    use super::*;
    use crate::db::{MemoryStore, ProductStore};
    use crate::models::{NewProduct, Product};

    async fn product(store: &MemoryStore, name: &str, price: i64, stock: u32) -> Product {
        store
            .create_product(&NewProduct {
                name: name.to_owned(),
                category: "Velas".to_owned(),
                description: String::new(),
                price: Money::new(price),
                stock,
                image: None,
                active: true,
            })
            .await
            .unwrap()
    }

    async fn guest_cart(service: &CartService<'_>) -> Cart {
        service
            .resolve(&CartOwner::Session(Uuid::new_v4()))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_adding_twice_increments_one_line() {
        let store = MemoryStore::new();
        let vela = product(&store, "Vela lavanda", 10_000, 5).await;
        let service = CartService::new(&store);
        let cart = guest_cart(&service).await;

        service.add_item(&cart, vela.id).await.unwrap();
        let update = service.add_item(&cart, vela.id).await.unwrap();

        assert_eq!(update.message, "Vela lavanda agregado al carrito (cantidad 2).");
        assert_eq!(update.totals.item_count, 2);
        assert_eq!(update.totals.total, Money::new(20_000));
        assert_eq!(service.lines(&cart).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_add_rejects_out_of_stock_and_over_stock() {
        let store = MemoryStore::new();
        let agotada = product(&store, "Vela agotada", 10_000, 0).await;
        let unica = product(&store, "Vela única", 10_000, 1).await;
        let service = CartService::new(&store);
        let cart = guest_cart(&service).await;

        let err = service.add_item(&cart, agotada.id).await.unwrap_err();
        assert!(matches!(err, CartError::OutOfStock { .. }));
        assert_eq!(err.customer_message().unwrap(), "Producto agotado.");

        service.add_item(&cart, unica.id).await.unwrap();
        let err = service.add_item(&cart, unica.id).await.unwrap_err();
        assert!(matches!(err, CartError::InsufficientStock { available: 1, .. }));
        assert_eq!(service.totals(&cart).await.unwrap().item_count, 1);
    }

    #[tokio::test]
    async fn test_set_quantity_zero_removes_line() {
        let store = MemoryStore::new();
        let a = product(&store, "A", 10_000, 5).await;
        let b = product(&store, "B", 20_000, 5).await;
        let service = CartService::new(&store);
        let cart = guest_cart(&service).await;
        service.add_item(&cart, a.id).await.unwrap();
        service.add_item(&cart, b.id).await.unwrap();
        let line_a = store_line(&service, &cart, a.id).await;

        let update = service.set_quantity(&cart, line_a, 0).await.unwrap();

        assert_eq!(update.line_subtotal, Money::ZERO);
        assert_eq!(update.totals.item_count, 1);
        assert_eq!(update.totals.total, Money::new(20_000));
    }

    #[tokio::test]
    async fn test_set_quantity_above_stock_leaves_line() {
        let store = MemoryStore::new();
        let a = product(&store, "A", 10_000, 3).await;
        let service = CartService::new(&store);
        let cart = guest_cart(&service).await;
        service.add_item(&cart, a.id).await.unwrap();
        let line = store_line(&service, &cart, a.id).await;

        let err = service.set_quantity(&cart, line, 4).await.unwrap_err();
        assert_eq!(
            err.customer_message().unwrap(),
            "Solo hay 3 unidades disponibles en stock."
        );

        let update = service.set_quantity(&cart, line, 3).await.unwrap();
        assert_eq!(update.line_subtotal, Money::new(30_000));
    }

    #[tokio::test]
    async fn test_foreign_line_is_not_owned() {
        let store = MemoryStore::new();
        let a = product(&store, "A", 10_000, 3).await;
        let service = CartService::new(&store);
        let mine = guest_cart(&service).await;
        let theirs = guest_cart(&service).await;
        service.add_item(&theirs, a.id).await.unwrap();
        let line = store_line(&service, &theirs, a.id).await;

        assert!(matches!(
            service.remove_item(&mine, line).await,
            Err(CartError::NotOwned)
        ));
        assert!(matches!(
            service.set_quantity(&mine, line, 2).await,
            Err(CartError::NotOwned)
        ));
        assert_eq!(service.lines(&theirs).await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_adds_are_all_counted() {
        let store = Arc::new(MemoryStore::new());
        let vela = product(&store, "Vela lavanda", 10_000, 1_000).await;
        let service = CartService::new(store.as_ref());
        let mut carts = Vec::new();
        for _ in 0..50 {
            carts.push(guest_cart(&service).await);
        }

        let mut tasks = Vec::new();
        for cart in &carts {
            for _ in 0..4 {
                let store = Arc::clone(&store);
                let cart = cart.clone();
                tasks.push(tokio::spawn(async move {
                    CartService::new(store.as_ref())
                        .add_item(&cart, vela.id)
                        .await
                        .map(|_| ())
                }));
            }
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        for cart in &carts {
            let lines = service.lines(cart).await.unwrap();
            assert_eq!(lines.len(), 1);
            assert_eq!(lines[0].quantity, 4);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_adds_stop_at_stock() {
        let store = Arc::new(MemoryStore::new());
        let vela = product(&store, "Vela única", 10_000, 3).await;
        let cart = guest_cart(&CartService::new(store.as_ref())).await;

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let cart = cart.clone();
                tokio::spawn(async move {
                    CartService::new(store.as_ref())
                        .add_item(&cart, vela.id)
                        .await
                        .is_ok()
                })
            })
            .collect();
        let mut added = 0;
        for task in tasks {
            if task.await.unwrap() {
                added += 1;
            }
        }

        assert_eq!(added, 3);
        let lines = CartService::new(store.as_ref()).lines(&cart).await.unwrap();
        assert_eq!(lines[0].quantity, 3);
    }

    async fn store_line(service: &CartService<'_>, cart: &Cart, product: ProductId) -> CartLineId {
        service
            .lines(cart)
            .await
            .unwrap()
            .into_iter()
            .find(|l| l.product_id == product)
            .unwrap()
            .id
    }
}
