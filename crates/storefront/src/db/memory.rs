//! In-process store used by tests and local demos.
//!
//! All data sits behind a single [`tokio::sync::Mutex`], so every trait call
//! is atomic with respect to every other one. That gives the same guarantees
//! the `PostgreSQL` store gets from transactions and row locks.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use tienda_core::{
    AddressId, CartId, CartLineId, Email, OrderId, OrderLineId, OrderNumber, OrderStatus,
    ProductId, ProfileId, ReviewId, TestimonialId, UserId,
};

use super::{
    AddressStore, CartStore, OrderStore, PlaceOrderError, ProductStore, RepositoryError,
    ReviewStore, StatusChangeError, Store, UserStore,
};
use crate::models::{
    Address, AddressFields, Cart, CartLine, CartOwner, NewProduct, NewReview, NewTestimonial,
    NewUser, Order, OrderDraft, OrderLine, OrderSummary, PlaceOrder, Product, ProductFilter,
    ProductSort, Profile, ProfileFields, Review, Testimonial, User,
};

const ORDER_NUMBER_ATTEMPTS: usize = 5;

#[derive(Debug, Clone, Copy)]
struct StoredLine {
    cart_id: CartId,
    product_id: ProductId,
    quantity: u32,
}

#[derive(Debug, Default)]
struct State {
    next_id: i32,
    products: BTreeMap<ProductId, Product>,
    carts: BTreeMap<CartId, Cart>,
    cart_lines: BTreeMap<CartLineId, StoredLine>,
    addresses: BTreeMap<AddressId, Address>,
    orders: BTreeMap<OrderId, Order>,
    users: BTreeMap<UserId, (User, String)>,
    profiles: BTreeMap<UserId, Profile>,
    reviews: BTreeMap<ReviewId, Review>,
    testimonials: BTreeMap<TestimonialId, Testimonial>,
}

impl State {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn join_line(&self, id: CartLineId, line: StoredLine) -> Option<CartLine> {
        let product = self.products.get(&line.product_id)?;
        Some(CartLine {
            id,
            cart_id: line.cart_id,
            product_id: line.product_id,
            product_name: product.name.clone(),
            unit_price: product.price,
            stock: product.stock,
            image: product.image.clone(),
            quantity: line.quantity,
        })
    }

    fn lines_of(&self, cart: CartId) -> Vec<CartLine> {
        self.cart_lines
            .iter()
            .filter(|(_, l)| l.cart_id == cart)
            .filter_map(|(id, l)| self.join_line(*id, *l))
            .collect()
    }

    fn owned_address(&self, user: UserId, id: AddressId) -> Result<&Address, RepositoryError> {
        self.addresses
            .get(&id)
            .filter(|a| a.user_id == user)
            .ok_or(RepositoryError::NotFound)
    }

    fn insert_address(&mut self, user: UserId, fields: &AddressFields) -> Address {
        let address = Address {
            id: AddressId::new(self.next_id()),
            user_id: user,
            fields: fields.clone(),
            is_default: false,
            created_at: Utc::now(),
        };
        self.addresses.insert(address.id, address.clone());
        address
    }

    fn email_owner(&self, email: &str) -> Option<UserId> {
        let email = email.to_lowercase();
        self.users
            .values()
            .find(|(u, _)| u.email.as_str().to_lowercase() == email)
            .map(|(u, _)| u.id)
    }

    fn fresh_order_number(&self) -> Result<OrderNumber, RepositoryError> {
        let today = Utc::now().date_naive();
        for _ in 0..ORDER_NUMBER_ATTEMPTS {
            let candidate = OrderNumber::generate(today, &mut rand::rng());
            if !self.orders.values().any(|o| o.number == candidate) {
                return Ok(candidate);
            }
        }
        Err(RepositoryError::Conflict(format!(
            "no free order number after {ORDER_NUMBER_ATTEMPTS} attempts"
        )))
    }
}

/// [`Store`] backed by ordered maps in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn sort_products(products: &mut [Product], sort: ProductSort) {
    match sort {
        ProductSort::Newest => {
            products.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        }
        ProductSort::PriceAsc => {
            products.sort_by(|a, b| a.price.cmp(&b.price).then(a.id.cmp(&b.id)));
        }
        ProductSort::PriceDesc => {
            products.sort_by(|a, b| b.price.cmp(&a.price).then(a.id.cmp(&b.id)));
        }
        ProductSort::Name => products.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id))),
    }
}

fn product_from(id: ProductId, new: &NewProduct, created_at: chrono::DateTime<Utc>) -> Product {
    Product {
        id,
        name: new.name.clone(),
        category: new.category.clone(),
        description: new.description.clone(),
        price: new.price,
        stock: new.stock,
        image: new.image.clone(),
        active: new.active,
        created_at,
    }
}

#[async_trait]
impl ProductStore for MemoryStore {
    async fn product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.state.lock().await.products.get(&id).cloned())
    }

    async fn count_products(&self, filter: &ProductFilter) -> Result<u64, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.products.values().filter(|p| filter.matches(p)).count() as u64)
    }

    async fn list_products(
        &self,
        filter: &ProductFilter,
        sort: ProductSort,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<Product>, RepositoryError> {
        let state = self.state.lock().await;
        let mut products: Vec<Product> = state
            .products
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        sort_products(&mut products, sort);
        Ok(products
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn newest_products(&self, limit: u32) -> Result<Vec<Product>, RepositoryError> {
        self.list_products(&ProductFilter::default(), ProductSort::Newest, 0, limit)
            .await
    }

    async fn all_products(&self) -> Result<Vec<Product>, RepositoryError> {
        Ok(self.state.lock().await.products.values().cloned().collect())
    }

    async fn categories(&self) -> Result<Vec<String>, RepositoryError> {
        let state = self.state.lock().await;
        let mut categories: Vec<String> = state
            .products
            .values()
            .filter(|p| p.active)
            .map(|p| p.category.clone())
            .collect();
        categories.sort();
        categories.dedup();
        Ok(categories)
    }

    async fn create_product(&self, product: &NewProduct) -> Result<Product, RepositoryError> {
        let mut state = self.state.lock().await;
        let product = product_from(ProductId::new(state.next_id()), product, Utc::now());
        state.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn update_product(
        &self,
        id: ProductId,
        product: &NewProduct,
    ) -> Result<Product, RepositoryError> {
        let mut state = self.state.lock().await;
        let existing = state.products.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        *existing = product_from(id, product, existing.created_at);
        Ok(existing.clone())
    }
}

#[async_trait]
impl CartStore for MemoryStore {
    async fn cart_for(&self, owner: &CartOwner) -> Result<Cart, RepositoryError> {
        let mut state = self.state.lock().await;
        if let Some(cart) = state.carts.values().find(|c| &c.owner == owner) {
            return Ok(cart.clone());
        }
        let cart = Cart {
            id: CartId::new(state.next_id()),
            owner: *owner,
            created_at: Utc::now(),
        };
        state.carts.insert(cart.id, cart.clone());
        Ok(cart)
    }

    async fn cart_lines(&self, cart: CartId) -> Result<Vec<CartLine>, RepositoryError> {
        Ok(self.state.lock().await.lines_of(cart))
    }

    async fn cart_line(&self, line: CartLineId) -> Result<Option<CartLine>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .cart_lines
            .get(&line)
            .and_then(|l| state.join_line(line, *l)))
    }

    async fn add_one_to_cart(
        &self,
        cart: CartId,
        product: ProductId,
    ) -> Result<Option<(CartLineId, u32)>, RepositoryError> {
        let mut state = self.state.lock().await;
        if !state.carts.contains_key(&cart) {
            return Err(RepositoryError::NotFound);
        }
        let stock = match state.products.get(&product) {
            Some(p) => p.stock,
            None => return Ok(None),
        };

        let existing = state
            .cart_lines
            .iter_mut()
            .find(|(_, l)| l.cart_id == cart && l.product_id == product);
        if let Some((id, line)) = existing {
            if line.quantity >= stock {
                return Ok(None);
            }
            line.quantity += 1;
            return Ok(Some((*id, line.quantity)));
        }

        if stock == 0 {
            return Ok(None);
        }
        let id = CartLineId::new(state.next_id());
        state.cart_lines.insert(
            id,
            StoredLine {
                cart_id: cart,
                product_id: product,
                quantity: 1,
            },
        );
        Ok(Some((id, 1)))
    }

    async fn insert_cart_line(
        &self,
        cart: CartId,
        product: ProductId,
        quantity: u32,
    ) -> Result<CartLineId, RepositoryError> {
        let mut state = self.state.lock().await;
        if state
            .cart_lines
            .values()
            .any(|l| l.cart_id == cart && l.product_id == product)
        {
            return Err(RepositoryError::Conflict("cart line".to_owned()));
        }
        if !state.products.contains_key(&product) || !state.carts.contains_key(&cart) {
            return Err(RepositoryError::NotFound);
        }
        let id = CartLineId::new(state.next_id());
        state.cart_lines.insert(
            id,
            StoredLine {
                cart_id: cart,
                product_id: product,
                quantity,
            },
        );
        Ok(id)
    }

    async fn set_cart_line_quantity(
        &self,
        line: CartLineId,
        quantity: u32,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        let stored = state
            .cart_lines
            .get_mut(&line)
            .ok_or(RepositoryError::NotFound)?;
        stored.quantity = quantity;
        Ok(())
    }

    async fn delete_cart_line(&self, line: CartLineId) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        state
            .cart_lines
            .remove(&line)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }

    async fn clear_cart(&self, cart: CartId) -> Result<u64, RepositoryError> {
        let mut state = self.state.lock().await;
        let before = state.cart_lines.len();
        state.cart_lines.retain(|_, l| l.cart_id != cart);
        Ok((before - state.cart_lines.len()) as u64)
    }
}

#[async_trait]
impl AddressStore for MemoryStore {
    async fn addresses(&self, user: UserId) -> Result<Vec<Address>, RepositoryError> {
        let state = self.state.lock().await;
        let mut addresses: Vec<Address> = state
            .addresses
            .values()
            .filter(|a| a.user_id == user)
            .cloned()
            .collect();
        addresses.sort_by(|a, b| {
            b.is_default
                .cmp(&a.is_default)
                .then(b.created_at.cmp(&a.created_at))
                .then(b.id.cmp(&a.id))
        });
        Ok(addresses)
    }

    async fn address(
        &self,
        user: UserId,
        id: AddressId,
    ) -> Result<Option<Address>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.owned_address(user, id).ok().cloned())
    }

    async fn save_address(
        &self,
        user: UserId,
        id: Option<AddressId>,
        fields: &AddressFields,
        is_default: bool,
    ) -> Result<Address, RepositoryError> {
        let mut state = self.state.lock().await;
        let id = match id {
            Some(id) => {
                state.owned_address(user, id)?;
                id
            }
            None => state.insert_address(user, fields).id,
        };

        if is_default {
            for address in state.addresses.values_mut().filter(|a| a.user_id == user) {
                address.is_default = false;
            }
        }
        let address = state
            .addresses
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        address.fields = fields.clone();
        address.is_default = is_default;
        Ok(address.clone())
    }

    async fn set_default_address(
        &self,
        user: UserId,
        id: AddressId,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        state.owned_address(user, id)?;
        for address in state.addresses.values_mut().filter(|a| a.user_id == user) {
            address.is_default = address.id == id;
        }
        Ok(())
    }

    async fn delete_address(&self, user: UserId, id: AddressId) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        state.owned_address(user, id)?;
        state.addresses.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn place_order(
        &self,
        cart: CartId,
        request: &PlaceOrder,
    ) -> Result<Order, PlaceOrderError> {
        let mut state = self.state.lock().await;

        let mut lines = state.lines_of(cart);
        lines.sort_by_key(|l| l.product_id);
        let draft = OrderDraft::build(&lines, &request.policy)?;
        let number = state.fresh_order_number()?;

        // Nothing below can fail, so the order is all-or-nothing.
        if request.save_address {
            state.insert_address(request.user_id, &request.shipping);
        }

        let mut order_lines = Vec::with_capacity(draft.lines.len());
        for line in &draft.lines {
            if let Some(product) = state.products.get_mut(&line.product_id) {
                product.stock -= line.quantity;
            }
            order_lines.push(OrderLine {
                id: OrderLineId::new(state.next_id()),
                product_id: Some(line.product_id),
                product_name: line.product_name.clone(),
                unit_price: line.unit_price,
                quantity: line.quantity,
            });
        }
        state.cart_lines.retain(|_, l| l.cart_id != cart);

        let now = Utc::now();
        let order = Order {
            id: OrderId::new(state.next_id()),
            number,
            user_id: request.user_id,
            shipping: request.shipping.clone(),
            status: OrderStatus::PendingPayment,
            payment_method: request.payment_method,
            totals: draft.totals,
            notes: request.notes.clone(),
            payment_reference: None,
            created_at: now,
            updated_at: now,
            paid_at: None,
            shipped_at: None,
            delivered_at: None,
            lines: order_lines,
        };
        state.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.state.lock().await.orders.get(&id).cloned())
    }

    async fn order_by_number(
        &self,
        number: &OrderNumber,
    ) -> Result<Option<Order>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.orders.values().find(|o| &o.number == number).cloned())
    }

    async fn orders_for_user(&self, user: UserId) -> Result<Vec<OrderSummary>, RepositoryError> {
        let state = self.state.lock().await;
        let mut orders: Vec<OrderSummary> = state
            .orders
            .values()
            .filter(|o| o.user_id == user)
            .map(|o| OrderSummary {
                id: o.id,
                number: o.number.clone(),
                status: o.status,
                total: o.totals.total,
                item_count: o.item_count(),
                created_at: o.created_at,
            })
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(orders)
    }

    async fn change_order_status(
        &self,
        id: OrderId,
        next: OrderStatus,
    ) -> Result<Order, StatusChangeError> {
        let mut state = self.state.lock().await;
        let order = state.orders.get(&id).ok_or(RepositoryError::NotFound)?;
        let next = order.status.transition_to(next)?;

        if next == OrderStatus::Cancelled {
            let restock: Vec<(ProductId, u32)> = order
                .lines
                .iter()
                .filter_map(|l| l.product_id.map(|p| (p, l.quantity)))
                .collect();
            for (product_id, quantity) in restock {
                if let Some(product) = state.products.get_mut(&product_id) {
                    product.stock += quantity;
                }
            }
        }

        let order = state
            .orders
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        let now = Utc::now();
        order.status = next;
        order.updated_at = now;
        match next {
            OrderStatus::Paid => order.paid_at = Some(now),
            OrderStatus::Shipped => order.shipped_at = Some(now),
            OrderStatus::Delivered => order.delivered_at = Some(now),
            OrderStatus::PendingPayment | OrderStatus::Processing | OrderStatus::Cancelled => {}
        }
        Ok(order.clone())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, user: &NewUser) -> Result<User, RepositoryError> {
        let mut state = self.state.lock().await;
        if state.users.values().any(|(u, _)| u.username == user.username) {
            return Err(RepositoryError::Conflict("username".to_owned()));
        }
        if state.email_owner(user.email.as_str()).is_some() {
            return Err(RepositoryError::Conflict("email".to_owned()));
        }
        let created = User {
            id: UserId::new(state.next_id()),
            username: user.username.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            created_at: Utc::now(),
        };
        state
            .users
            .insert(created.id, (created.clone(), user.password_hash.clone()));
        Ok(created)
    }

    async fn user(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.users.get(&id).map(|(u, _)| u.clone()))
    }

    async fn user_for_login(
        &self,
        login: &str,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let login = login.trim();
        let state = self.state.lock().await;
        let by_username = state.users.values().find(|(u, _)| u.username == login);
        let found = match by_username {
            Some(found) => Some(found),
            None => state
                .email_owner(login)
                .and_then(|id| state.users.get(&id)),
        };
        Ok(found.cloned())
    }

    async fn username_exists(&self, username: &str) -> Result<bool, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.users.values().any(|(u, _)| u.username == username))
    }

    async fn email_owner(&self, email: &Email) -> Result<Option<UserId>, RepositoryError> {
        Ok(self.state.lock().await.email_owner(email.as_str()))
    }

    async fn update_user(
        &self,
        id: UserId,
        first_name: &str,
        last_name: &str,
        email: &Email,
    ) -> Result<User, RepositoryError> {
        let mut state = self.state.lock().await;
        if state.email_owner(email.as_str()).is_some_and(|owner| owner != id) {
            return Err(RepositoryError::Conflict("email".to_owned()));
        }
        let (user, _) = state.users.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        user.first_name = first_name.to_owned();
        user.last_name = last_name.to_owned();
        user.email = email.clone();
        Ok(user.clone())
    }

    async fn profile(&self, user: UserId) -> Result<Option<Profile>, RepositoryError> {
        Ok(self.state.lock().await.profiles.get(&user).cloned())
    }

    async fn create_profile(&self, user: UserId) -> Result<Profile, RepositoryError> {
        let mut state = self.state.lock().await;
        if state.profiles.contains_key(&user) {
            return Err(RepositoryError::Conflict("profile".to_owned()));
        }
        if !state.users.contains_key(&user) {
            return Err(RepositoryError::NotFound);
        }
        let now = Utc::now();
        let profile = Profile {
            id: ProfileId::new(state.next_id()),
            user_id: user,
            fields: ProfileFields::default(),
            created_at: now,
            updated_at: now,
        };
        state.profiles.insert(user, profile.clone());
        Ok(profile)
    }

    async fn update_profile(
        &self,
        user: UserId,
        fields: &ProfileFields,
    ) -> Result<Profile, RepositoryError> {
        let mut state = self.state.lock().await;
        let profile = state
            .profiles
            .get_mut(&user)
            .ok_or(RepositoryError::NotFound)?;
        profile.fields = fields.clone();
        profile.updated_at = Utc::now();
        Ok(profile.clone())
    }
}

#[async_trait]
impl ReviewStore for MemoryStore {
    async fn approved_reviews(&self, product: ProductId) -> Result<Vec<Review>, RepositoryError> {
        let state = self.state.lock().await;
        let mut reviews: Vec<Review> = state
            .reviews
            .values()
            .filter(|r| r.product_id == product && r.approved)
            .cloned()
            .collect();
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(reviews)
    }

    async fn pending_reviews(&self) -> Result<Vec<Review>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .reviews
            .values()
            .filter(|r| !r.approved)
            .cloned()
            .collect())
    }

    async fn create_review(&self, review: &NewReview) -> Result<Review, RepositoryError> {
        let mut state = self.state.lock().await;
        if state
            .reviews
            .values()
            .any(|r| r.product_id == review.product_id && r.user_id == review.user_id)
        {
            return Err(RepositoryError::Conflict("review".to_owned()));
        }
        let created = Review {
            id: ReviewId::new(state.next_id()),
            product_id: review.product_id,
            user_id: review.user_id,
            author: review.author.clone(),
            rating: review.rating,
            comment: review.comment.clone(),
            approved: false,
            created_at: Utc::now(),
        };
        state.reviews.insert(created.id, created.clone());
        Ok(created)
    }

    async fn set_review_approved(
        &self,
        id: ReviewId,
        approved: bool,
    ) -> Result<Review, RepositoryError> {
        let mut state = self.state.lock().await;
        let review = state.reviews.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        review.approved = approved;
        Ok(review.clone())
    }

    async fn featured_testimonials(
        &self,
        limit: u32,
    ) -> Result<Vec<Testimonial>, RepositoryError> {
        let state = self.state.lock().await;
        let mut featured: Vec<Testimonial> = state
            .testimonials
            .values()
            .filter(|t| t.active && t.featured)
            .cloned()
            .collect();
        featured.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        featured.truncate(limit as usize);
        Ok(featured)
    }

    async fn create_testimonial(
        &self,
        testimonial: &NewTestimonial,
    ) -> Result<Testimonial, RepositoryError> {
        let mut state = self.state.lock().await;
        let created = Testimonial {
            id: TestimonialId::new(state.next_id()),
            author: testimonial.author.clone(),
            content: testimonial.content.clone(),
            rating: testimonial.rating,
            active: testimonial.active,
            featured: testimonial.featured,
            created_at: Utc::now(),
        };
        state.testimonials.insert(created.id, created.clone());
        Ok(created)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}
