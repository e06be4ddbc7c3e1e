//! `PostgreSQL` order queries, including the checkout transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgConnection;

use tienda_core::{
    CartId, Money, OrderId, OrderLineId, OrderNumber, OrderStatus, OrderTotals, PaymentMethod,
    ProductId, Region, UserId,
};

use super::carts::{CART_LINE_SELECT, CartLineRow};
use super::{
    OrderStore, PgStore, PlaceOrderError, RepositoryError, StatusChangeError, addresses, to_i32,
    to_u32,
};
use crate::models::{
    AddressFields, CartLine, DraftError, Order, OrderDraft, OrderLine, OrderSummary, PlaceOrder,
};

/// Attempts at drawing an order number that is not taken yet.
const ORDER_NUMBER_ATTEMPTS: usize = 5;

const ORDER_COLUMNS: &str = "o.id, o.number, o.user_id, \
     o.ship_full_name, o.ship_phone, o.ship_street, o.ship_reference, o.ship_comuna, \
     o.ship_region, o.ship_postal_code, o.ship_country, \
     o.status, o.payment_method, o.subtotal, o.shipping, o.discount, o.total, \
     o.notes, o.payment_reference, o.created_at, o.updated_at, \
     o.paid_at, o.shipped_at, o.delivered_at";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    number: OrderNumber,
    user_id: UserId,
    ship_full_name: String,
    ship_phone: String,
    ship_street: String,
    ship_reference: Option<String>,
    ship_comuna: String,
    ship_region: Region,
    ship_postal_code: Option<String>,
    ship_country: String,
    status: OrderStatus,
    payment_method: PaymentMethod,
    subtotal: Money,
    shipping: Money,
    discount: Money,
    total: Money,
    notes: String,
    payment_reference: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    paid_at: Option<DateTime<Utc>>,
    shipped_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
}

impl OrderRow {
    fn into_order(self, lines: Vec<OrderLine>) -> Order {
        Order {
            id: self.id,
            number: self.number,
            user_id: self.user_id,
            shipping: AddressFields {
                full_name: self.ship_full_name,
                phone: self.ship_phone,
                street: self.ship_street,
                reference: self.ship_reference,
                comuna: self.ship_comuna,
                region: self.ship_region,
                postal_code: self.ship_postal_code,
                country: self.ship_country,
            },
            status: self.status,
            payment_method: self.payment_method,
            totals: OrderTotals {
                subtotal: self.subtotal,
                shipping: self.shipping,
                discount: self.discount,
                total: self.total,
            },
            notes: self.notes,
            payment_reference: self.payment_reference,
            created_at: self.created_at,
            updated_at: self.updated_at,
            paid_at: self.paid_at,
            shipped_at: self.shipped_at,
            delivered_at: self.delivered_at,
            lines,
        }
    }
}

#[derive(sqlx::FromRow)]
struct OrderLineRow {
    id: OrderLineId,
    product_id: Option<ProductId>,
    product_name: String,
    unit_price: Money,
    quantity: i32,
}

impl TryFrom<OrderLineRow> for OrderLine {
    type Error = RepositoryError;

    fn try_from(r: OrderLineRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            product_id: r.product_id,
            product_name: r.product_name,
            unit_price: r.unit_price,
            quantity: to_u32(r.quantity, "quantity")?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderSummaryRow {
    id: OrderId,
    number: OrderNumber,
    status: OrderStatus,
    total: Money,
    item_count: i32,
    created_at: DateTime<Utc>,
}

/// Load an order and its lines over one connection.
async fn load_order(
    conn: &mut PgConnection,
    key: OrderKey<'_>,
) -> Result<Option<Order>, RepositoryError> {
    let filter = match key {
        OrderKey::Id(_) => "o.id = $1",
        OrderKey::Number(_) => "o.number = $1",
    };
    let sql = format!("SELECT {ORDER_COLUMNS} FROM storefront.order o WHERE {filter}");
    let query = sqlx::query_as::<_, OrderRow>(&sql);
    let query = match key {
        OrderKey::Id(id) => query.bind(id),
        OrderKey::Number(number) => query.bind(number),
    };
    let Some(row) = query.fetch_optional(&mut *conn).await? else {
        return Ok(None);
    };

    let lines = sqlx::query_as::<_, OrderLineRow>(
        "SELECT id, product_id, product_name, unit_price, quantity
         FROM storefront.order_line
         WHERE order_id = $1
         ORDER BY id",
    )
    .bind(row.id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(OrderLine::try_from)
    .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(row.into_order(lines)))
}

#[derive(Clone, Copy)]
enum OrderKey<'a> {
    Id(OrderId),
    Number(&'a OrderNumber),
}

/// Draw order numbers until one is free.
async fn fresh_order_number(conn: &mut PgConnection) -> Result<OrderNumber, RepositoryError> {
    let today = Utc::now().date_naive();
    for _ in 0..ORDER_NUMBER_ATTEMPTS {
        let candidate = OrderNumber::generate(today, &mut rand::rng());
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM storefront.order WHERE number = $1)",
        )
        .bind(&candidate)
        .fetch_one(&mut *conn)
        .await?;
        if !taken {
            return Ok(candidate);
        }
    }
    Err(RepositoryError::Conflict(format!(
        "no free order number after {ORDER_NUMBER_ATTEMPTS} attempts"
    )))
}

/// Column stamped when an order enters `status`, if any.
const fn timestamp_column(status: OrderStatus) -> Option<&'static str> {
    match status {
        OrderStatus::Paid => Some("paid_at"),
        OrderStatus::Shipped => Some("shipped_at"),
        OrderStatus::Delivered => Some("delivered_at"),
        OrderStatus::PendingPayment | OrderStatus::Processing | OrderStatus::Cancelled => None,
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn place_order(
        &self,
        cart: CartId,
        request: &PlaceOrder,
    ) -> Result<Order, PlaceOrderError> {
        let mut tx = self.pool.begin().await?;

        // Lock products in id order so concurrent checkouts cannot deadlock.
        let sql =
            format!("{CART_LINE_SELECT} WHERE l.cart_id = $1 ORDER BY p.id FOR UPDATE OF p");
        let lines = sqlx::query_as::<_, CartLineRow>(&sql)
            .bind(cart)
            .fetch_all(&mut *tx)
            .await?
            .into_iter()
            .map(CartLine::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        let draft = OrderDraft::build(&lines, &request.policy)?;

        if request.save_address {
            addresses::insert(&mut *tx, request.user_id, &request.shipping, false).await?;
        }

        let number = fresh_order_number(&mut tx).await?;
        let ship = &request.shipping;
        let order_id: OrderId = sqlx::query_scalar(
            "INSERT INTO storefront.order
                 (number, user_id, ship_full_name, ship_phone, ship_street, ship_reference,
                  ship_comuna, ship_region, ship_postal_code, ship_country,
                  status, payment_method, subtotal, shipping, discount, total, notes)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
             RETURNING id",
        )
        .bind(&number)
        .bind(request.user_id)
        .bind(&ship.full_name)
        .bind(&ship.phone)
        .bind(&ship.street)
        .bind(&ship.reference)
        .bind(&ship.comuna)
        .bind(ship.region)
        .bind(&ship.postal_code)
        .bind(&ship.country)
        .bind(OrderStatus::PendingPayment)
        .bind(request.payment_method)
        .bind(draft.totals.subtotal)
        .bind(draft.totals.shipping)
        .bind(draft.totals.discount)
        .bind(draft.totals.total)
        .bind(&request.notes)
        .fetch_one(&mut *tx)
        .await?;

        for (line, cart_line) in draft.lines.iter().zip(&lines) {
            let quantity = to_i32(line.quantity, "quantity")?;

            sqlx::query(
                "INSERT INTO storefront.order_line
                     (order_id, product_id, product_name, unit_price, quantity)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(order_id)
            .bind(line.product_id)
            .bind(&line.product_name)
            .bind(line.unit_price)
            .bind(quantity)
            .execute(&mut *tx)
            .await?;

            let decremented = sqlx::query(
                "UPDATE storefront.product SET stock = stock - $2, updated_at = now()
                 WHERE id = $1 AND stock >= $2",
            )
            .bind(line.product_id)
            .bind(quantity)
            .execute(&mut *tx)
            .await?;

            if decremented.rows_affected() == 0 {
                return Err(DraftError::InsufficientStock {
                    product_id: line.product_id,
                    product: line.product_name.clone(),
                    available: cart_line.stock,
                    requested: line.quantity,
                }
                .into());
            }
        }

        sqlx::query("DELETE FROM storefront.cart_line WHERE cart_id = $1")
            .bind(cart)
            .execute(&mut *tx)
            .await?;

        let order = load_order(&mut tx, OrderKey::Id(order_id))
            .await?
            .ok_or(RepositoryError::NotFound)?;

        tx.commit().await?;
        Ok(order)
    }

    async fn order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        load_order(&mut conn, OrderKey::Id(id)).await
    }

    async fn order_by_number(
        &self,
        number: &OrderNumber,
    ) -> Result<Option<Order>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        load_order(&mut conn, OrderKey::Number(number)).await
    }

    async fn orders_for_user(&self, user: UserId) -> Result<Vec<OrderSummary>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderSummaryRow>(
            "SELECT o.id, o.number, o.status, o.total, o.created_at,
                    COALESCE(SUM(l.quantity), 0)::INTEGER AS item_count
             FROM storefront.order o
             LEFT JOIN storefront.order_line l ON l.order_id = o.id
             WHERE o.user_id = $1
             GROUP BY o.id
             ORDER BY o.created_at DESC, o.id DESC",
        )
        .bind(user)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| {
                Ok(OrderSummary {
                    id: r.id,
                    number: r.number,
                    status: r.status,
                    total: r.total,
                    item_count: to_u32(r.item_count, "item_count")?,
                    created_at: r.created_at,
                })
            })
            .collect()
    }

    async fn change_order_status(
        &self,
        id: OrderId,
        next: OrderStatus,
    ) -> Result<Order, StatusChangeError> {
        let mut tx = self.pool.begin().await?;

        let current: Option<OrderStatus> =
            sqlx::query_scalar("SELECT status FROM storefront.order WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let current = current.ok_or(RepositoryError::NotFound)?;
        let next = current.transition_to(next)?;

        if next == OrderStatus::Cancelled {
            // Lines whose product was deleted have a NULL product_id and drop out.
            sqlx::query(
                "UPDATE storefront.product p
                 SET stock = p.stock + l.quantity, updated_at = now()
                 FROM storefront.order_line l
                 WHERE l.order_id = $1 AND p.id = l.product_id",
            )
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }

        let stamp = timestamp_column(next)
            .map(|column| format!(", {column} = now()"))
            .unwrap_or_default();
        let sql = format!(
            "UPDATE storefront.order SET status = $2, updated_at = now(){stamp} WHERE id = $1"
        );
        sqlx::query(&sql)
            .bind(id)
            .bind(next)
            .execute(&mut *tx)
            .await?;

        let order = load_order(&mut tx, OrderKey::Id(id))
            .await?
            .ok_or(RepositoryError::NotFound)?;

        tx.commit().await?;
        Ok(order)
    }
}
