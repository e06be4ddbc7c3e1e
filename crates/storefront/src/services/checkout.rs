//! Checkout: turning a cart into an order.
//!
//! The service resolves the shipping address and prices the cart; the store
//! does the atomic part (see [`OrderStore::place_order`]).
//!
//! [`OrderStore::place_order`]: crate::db::OrderStore::place_order

use thiserror::Error;
use tracing::instrument;

use tienda_core::{AddressId, Money, OrderTotals, PaymentMethod, ShippingPolicy, UserId};

use crate::db::{PlaceOrderError, RepositoryError, Store};
use crate::models::{
    Address, AddressFields, AddressInput, Cart, CartLine, DraftError, Order, OrderDraft,
    PlaceOrder, ValidationError,
};

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("cart is empty")]
    EmptyCart,

    #[error("only {available} of {product} left, {requested} requested")]
    InsufficientStock {
        product: String,
        available: u32,
        requested: u32,
    },

    #[error("address not found")]
    AddressNotFound,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<DraftError> for CheckoutError {
    fn from(e: DraftError) -> Self {
        match e {
            DraftError::EmptyCart => Self::EmptyCart,
            DraftError::InsufficientStock {
                product,
                available,
                requested,
                ..
            } => Self::InsufficientStock {
                product,
                available,
                requested,
            },
        }
    }
}

impl From<PlaceOrderError> for CheckoutError {
    fn from(e: PlaceOrderError) -> Self {
        match e {
            PlaceOrderError::Rejected(draft) => draft.into(),
            PlaceOrderError::Repository(repo) => Self::Repository(repo),
        }
    }
}

impl CheckoutError {
    /// Message shown to the customer, `None` for server-side failures.
    #[must_use]
    pub fn customer_message(&self) -> Option<String> {
        match self {
            Self::EmptyCart => Some("Tu carrito está vacío.".to_owned()),
            Self::InsufficientStock { product, .. } => {
                Some(format!("No hay suficiente stock de {product}"))
            }
            Self::AddressNotFound => Some("La dirección seleccionada no existe.".to_owned()),
            Self::Validation(v) => Some(v.to_string()),
            Self::Repository(_) => None,
        }
    }
}

/// Where the order ships to.
#[derive(Debug, Clone)]
pub enum ShipTo {
    /// One of the customer's saved addresses.
    Saved(AddressId),
    /// Typed in at checkout; `save` keeps it as a new non-default address.
    New { input: AddressInput, save: bool },
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub ship_to: ShipTo,
    pub payment_method: PaymentMethod,
    pub notes: String,
}

/// Everything the checkout page shows before the order is placed.
#[derive(Debug, Clone)]
pub struct CheckoutPreview {
    pub lines: Vec<CartLine>,
    pub totals: OrderTotals,
    pub free_shipping_from: Money,
    pub remaining_for_free_shipping: Money,
    pub addresses: Vec<Address>,
}

impl CheckoutPreview {
    /// The address to pre-select: the default one, if any.
    #[must_use]
    pub fn default_address(&self) -> Option<&Address> {
        self.addresses.iter().find(|a| a.is_default)
    }
}

pub struct CheckoutService<'a> {
    store: &'a dyn Store,
    policy: ShippingPolicy,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn Store, policy: ShippingPolicy) -> Self {
        Self { store, policy }
    }

    /// Price the cart and list the customer's addresses.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::EmptyCart` or `CheckoutError::InsufficientStock`
    /// when the cart cannot be checked out as it is.
    pub async fn preview(
        &self,
        user: UserId,
        cart: &Cart,
    ) -> Result<CheckoutPreview, CheckoutError> {
        let lines = self.store.cart_lines(cart.id).await?;
        let draft = OrderDraft::build(&lines, &self.policy)?;
        let addresses = self.store.addresses(user).await?;

        Ok(CheckoutPreview {
            lines,
            totals: draft.totals,
            free_shipping_from: self.policy.free_from,
            remaining_for_free_shipping: self
                .policy
                .remaining_for_free_shipping(draft.totals.subtotal),
            addresses,
        })
    }

    /// Place the order.
    ///
    /// # Errors
    ///
    /// - `CheckoutError::EmptyCart` / `CheckoutError::InsufficientStock`
    /// - `CheckoutError::AddressNotFound` for a saved address the user doesn't own
    /// - `CheckoutError::Validation` for incomplete typed-in address fields
    ///
    /// On any error nothing is written.
    #[instrument(skip(self, cart, request), fields(user_id = %user, cart_id = %cart.id))]
    pub async fn place(
        &self,
        user: UserId,
        cart: &Cart,
        request: CheckoutRequest,
    ) -> Result<Order, CheckoutError> {
        let lines = self.store.cart_lines(cart.id).await?;
        OrderDraft::build(&lines, &self.policy)?;

        let (shipping, save_address) = self.resolve_address(user, &request.ship_to).await?;

        let order = self
            .store
            .place_order(
                cart.id,
                &PlaceOrder {
                    user_id: user,
                    shipping,
                    save_address,
                    payment_method: request.payment_method,
                    notes: request.notes.trim().to_owned(),
                    policy: self.policy,
                },
            )
            .await?;

        tracing::info!(
            order_number = %order.number,
            total = order.totals.total.amount(),
            "Order placed"
        );
        Ok(order)
    }

    async fn resolve_address(
        &self,
        user: UserId,
        ship_to: &ShipTo,
    ) -> Result<(AddressFields, bool), CheckoutError> {
        match ship_to {
            ShipTo::Saved(id) => {
                let address = self
                    .store
                    .address(user, *id)
                    .await?
                    .ok_or(CheckoutError::AddressNotFound)?;
                Ok((address.fields, false))
            }
            ShipTo::New { input, save } => Ok((input.validate()?, *save)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tienda_core::{OrderStatus, ProductId};

    use super::*;
    use crate::db::{AddressStore, CartStore, MemoryStore, OrderStore, ProductStore};
    use crate::models::{CartOwner, NewProduct};

    struct Fixture {
        store: MemoryStore,
        user: UserId,
        cart: Cart,
    }

    impl Fixture {
        async fn new() -> Self {
            let store = MemoryStore::new();
            let user = UserId::new(500);
            let cart = store.cart_for(&CartOwner::User(user)).await.unwrap();
            Self { store, user, cart }
        }

        async fn product(&self, name: &str, price: i64, stock: u32) -> ProductId {
            self.store
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
                .id
        }

        async fn put(&self, product: ProductId, quantity: u32) {
            self.store
                .insert_cart_line(self.cart.id, product, quantity)
                .await
                .unwrap();
        }

        async fn stock(&self, product: ProductId) -> u32 {
            self.store.product(product).await.unwrap().unwrap().stock
        }

        fn service(&self) -> CheckoutService<'_> {
            CheckoutService::new(&self.store, ShippingPolicy::default())
        }
    }

    fn typed_address(save: bool) -> CheckoutRequest {
        CheckoutRequest {
            ship_to: ShipTo::New {
                input: AddressInput {
                    full_name: Some("Camila Soto".to_owned()),
                    phone: Some("+56912345678".to_owned()),
                    street: Some("Av. Grecia 1234".to_owned()),
                    comuna: Some("Ñuñoa".to_owned()),
                    region: Some("metropolitana".to_owned()),
                    ..AddressInput::default()
                },
                save,
            },
            payment_method: PaymentMethod::BankTransfer,
            notes: "  Dejar en conserjería  ".to_owned(),
        }
    }

    #[tokio::test]
    async fn test_checkout_prices_and_empties_cart() {
        let f = Fixture::new().await;
        let a = f.product("A", 10_000, 5).await;
        let b = f.product("B", 20_000, 5).await;
        f.put(a, 2).await;
        f.put(b, 1).await;

        let order = f
            .service()
            .place(f.user, &f.cart, typed_address(false))
            .await
            .unwrap();

        assert_eq!(order.totals.subtotal, Money::new(40_000));
        assert_eq!(order.totals.shipping, Money::new(5_000));
        assert_eq!(order.totals.discount, Money::ZERO);
        assert_eq!(order.totals.total, Money::new(45_000));
        assert_eq!(order.status, OrderStatus::PendingPayment);
        assert_eq!(order.notes, "Dejar en conserjería");
        assert!(order.number.as_str().starts_with("VGL"));
        assert_eq!(f.stock(a).await, 3);
        assert_eq!(f.stock(b).await, 4);
        assert!(f.store.cart_lines(f.cart.id).await.unwrap().is_empty());
        assert!(f.store.addresses(f.user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_order_lines_are_snapshots() {
        let f = Fixture::new().await;
        let a = f.product("Vela lavanda", 30_000, 5).await;
        f.put(a, 2).await;

        let order = f
            .service()
            .place(f.user, &f.cart, typed_address(true))
            .await
            .unwrap();
        assert_eq!(order.totals.shipping, Money::ZERO);
        assert_eq!(order.totals.total, Money::new(60_000));

        f.store
            .update_product(
                a,
                &NewProduct {
                    name: "Vela renombrada".to_owned(),
                    category: "Velas".to_owned(),
                    description: String::new(),
                    price: Money::new(1),
                    stock: 3,
                    image: None,
                    active: true,
                },
            )
            .await
            .unwrap();

        let stored = f.store.order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.lines[0].product_name, "Vela lavanda");
        assert_eq!(stored.lines[0].unit_price, Money::new(30_000));
        assert_eq!(stored.lines[0].subtotal(), Money::new(60_000));
        let saved = f.store.addresses(f.user).await.unwrap();
        assert_eq!(saved.len(), 1);
        assert!(!saved[0].is_default);
    }

    #[tokio::test]
    async fn test_insufficient_stock_changes_nothing() {
        let f = Fixture::new().await;
        let a = f.product("A", 10_000, 5).await;
        let b = f.product("Escasa", 10_000, 1).await;
        f.put(a, 1).await;
        f.put(b, 2).await;

        let err = f
            .service()
            .place(f.user, &f.cart, typed_address(true))
            .await
            .unwrap_err();

        assert_eq!(
            err.customer_message().unwrap(),
            "No hay suficiente stock de Escasa"
        );
        assert_eq!(f.stock(a).await, 5);
        assert_eq!(f.stock(b).await, 1);
        assert_eq!(f.store.cart_lines(f.cart.id).await.unwrap().len(), 2);
        assert!(f.store.orders_for_user(f.user).await.unwrap().is_empty());
        assert!(f.store.addresses(f.user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_cart_is_rejected() {
        let f = Fixture::new().await;
        let err = f
            .service()
            .place(f.user, &f.cart, typed_address(false))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::EmptyCart));
    }

    #[tokio::test]
    async fn test_foreign_saved_address_is_not_found() {
        let f = Fixture::new().await;
        let a = f.product("A", 10_000, 5).await;
        f.put(a, 1).await;
        let theirs = f
            .store
            .save_address(
                UserId::new(9),
                None,
                &typed_address(false).ship_to.fields(),
                false,
            )
            .await
            .unwrap();

        let err = f
            .service()
            .place(
                f.user,
                &f.cart,
                CheckoutRequest {
                    ship_to: ShipTo::Saved(theirs.id),
                    payment_method: PaymentMethod::Webpay,
                    notes: String::new(),
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::AddressNotFound));
        assert_eq!(f.stock(a).await, 5);
    }

    #[tokio::test]
    async fn test_missing_fields_are_a_validation_error() {
        let f = Fixture::new().await;
        let a = f.product("A", 10_000, 5).await;
        f.put(a, 1).await;
        let mut request = typed_address(false);
        if let ShipTo::New { input, .. } = &mut request.ship_to {
            input.phone = None;
        }

        let err = f.service().place(f.user, &f.cart, request).await.unwrap_err();
        assert!(matches!(err, CheckoutError::Validation(ref v) if v.field == "phone"));
    }

    #[tokio::test]
    async fn test_preview_reports_free_shipping_gap() {
        let f = Fixture::new().await;
        let a = f.product("A", 10_000, 5).await;
        f.put(a, 2).await;

        let preview = f.service().preview(f.user, &f.cart).await.unwrap();
        assert_eq!(preview.totals.total, Money::new(25_000));
        assert_eq!(preview.remaining_for_free_shipping, Money::new(30_000));
        assert!(preview.default_address().is_none());
    }

    impl ShipTo {
        fn fields(&self) -> AddressFields {
            match self {
                Self::New { input, .. } => input.validate().unwrap(),
                Self::Saved(_) => unreachable!(),
            }
        }
    }
}
