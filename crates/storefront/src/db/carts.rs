//! `PostgreSQL` cart queries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use tienda_core::{CartId, CartLineId, Money, ProductId, UserId};

use super::{CartStore, PgStore, RepositoryError, conflict_on_unique, to_i32, to_u32};
use crate::models::{Cart, CartLine, CartOwner};

#[derive(sqlx::FromRow)]
struct CartRow {
    id: CartId,
    user_id: Option<UserId>,
    session_token: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl TryFrom<CartRow> for Cart {
    type Error = RepositoryError;

    fn try_from(r: CartRow) -> Result<Self, Self::Error> {
        let owner = match (r.user_id, r.session_token) {
            (Some(user), None) => CartOwner::User(user),
            (None, Some(token)) => CartOwner::Session(token),
            _ => {
                return Err(RepositoryError::DataCorruption(format!(
                    "cart {} must have exactly one owner",
                    r.id
                )));
            }
        };
        Ok(Self {
            id: r.id,
            owner,
            created_at: r.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(super) struct CartLineRow {
    id: CartLineId,
    cart_id: CartId,
    product_id: ProductId,
    product_name: String,
    unit_price: Money,
    stock: i32,
    image: Option<String>,
    quantity: i32,
}

impl TryFrom<CartLineRow> for CartLine {
    type Error = RepositoryError;

    fn try_from(r: CartLineRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            cart_id: r.cart_id,
            product_id: r.product_id,
            product_name: r.product_name,
            unit_price: r.unit_price,
            stock: to_u32(r.stock, "stock")?,
            image: r.image,
            quantity: to_u32(r.quantity, "quantity")?,
        })
    }
}

/// Cart lines joined with their products; callers append `WHERE`/`ORDER BY`.
pub(super) const CART_LINE_SELECT: &str = "SELECT l.id, l.cart_id, l.product_id,
            p.name AS product_name, p.price AS unit_price, p.stock, p.image, l.quantity
     FROM storefront.cart_line l
     JOIN storefront.product p ON p.id = l.product_id";

#[async_trait]
impl CartStore for PgStore {
    async fn cart_for(&self, owner: &CartOwner) -> Result<Cart, RepositoryError> {
        // The no-op update makes RETURNING yield the existing row on conflict.
        let row = match owner {
            CartOwner::User(user) => {
                sqlx::query_as::<_, CartRow>(
                    "INSERT INTO storefront.cart (user_id) VALUES ($1)
                     ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id
                     RETURNING id, user_id, session_token, created_at",
                )
                .bind(*user)
                .fetch_one(&self.pool)
                .await?
            }
            CartOwner::Session(token) => {
                sqlx::query_as::<_, CartRow>(
                    "INSERT INTO storefront.cart (session_token) VALUES ($1)
                     ON CONFLICT (session_token) DO UPDATE SET session_token = EXCLUDED.session_token
                     RETURNING id, user_id, session_token, created_at",
                )
                .bind(*token)
                .fetch_one(&self.pool)
                .await?
            }
        };
        row.try_into()
    }

    async fn cart_lines(&self, cart: CartId) -> Result<Vec<CartLine>, RepositoryError> {
        let sql = format!("{CART_LINE_SELECT} WHERE l.cart_id = $1 ORDER BY l.id");
        sqlx::query_as::<_, CartLineRow>(&sql)
            .bind(cart)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(CartLine::try_from)
            .collect()
    }

    async fn cart_line(&self, line: CartLineId) -> Result<Option<CartLine>, RepositoryError> {
        let sql = format!("{CART_LINE_SELECT} WHERE l.id = $1");
        sqlx::query_as::<_, CartLineRow>(&sql)
            .bind(line)
            .fetch_optional(&self.pool)
            .await?
            .map(CartLine::try_from)
            .transpose()
    }

    async fn add_one_to_cart(
        &self,
        cart: CartId,
        product: ProductId,
    ) -> Result<Option<(CartLineId, u32)>, RepositoryError> {
        // A skipped DO UPDATE or an empty SELECT returns no row.
        let row: Option<(CartLineId, i32)> = sqlx::query_as(
            "INSERT INTO storefront.cart_line AS l (cart_id, product_id, quantity)
             SELECT $1, p.id, 1 FROM storefront.product p WHERE p.id = $2 AND p.stock > 0
             ON CONFLICT (cart_id, product_id) DO UPDATE
             SET quantity = l.quantity + 1, updated_at = now()
             WHERE l.quantity < (SELECT stock FROM storefront.product WHERE id = l.product_id)
             RETURNING l.id, l.quantity",
        )
        .bind(cart)
        .bind(product)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(id, quantity)| Ok((id, to_u32(quantity, "quantity")?)))
            .transpose()
    }

    async fn insert_cart_line(
        &self,
        cart: CartId,
        product: ProductId,
        quantity: u32,
    ) -> Result<CartLineId, RepositoryError> {
        sqlx::query_scalar::<_, CartLineId>(
            "INSERT INTO storefront.cart_line (cart_id, product_id, quantity)
             VALUES ($1, $2, $3)
             RETURNING id",
        )
        .bind(cart)
        .bind(product)
        .bind(to_i32(quantity, "quantity")?)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "cart line"))
    }

    async fn set_cart_line_quantity(
        &self,
        line: CartLineId,
        quantity: u32,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE storefront.cart_line SET quantity = $2, updated_at = now() WHERE id = $1",
        )
        .bind(line)
        .bind(to_i32(quantity, "quantity")?)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn delete_cart_line(&self, line: CartLineId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM storefront.cart_line WHERE id = $1")
            .bind(line)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn clear_cart(&self, cart: CartId) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM storefront.cart_line WHERE cart_id = $1")
            .bind(cart)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
