//! `PostgreSQL` catalog queries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Postgres, QueryBuilder};

use tienda_core::{Money, ProductId};

use super::{PgStore, ProductStore, RepositoryError, to_i32, to_u32};
use crate::models::{NewProduct, Product, ProductFilter, ProductSort};

const PRODUCT_COLUMNS: &str =
    "id, name, category, description, price, stock, image, active, created_at";

#[derive(sqlx::FromRow)]
pub(super) struct ProductRow {
    id: ProductId,
    name: String,
    category: String,
    description: String,
    price: Money,
    stock: i32,
    image: Option<String>,
    active: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(r: ProductRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            name: r.name,
            category: r.category,
            description: r.description,
            price: r.price,
            stock: to_u32(r.stock, "stock")?,
            image: r.image,
            active: r.active,
            created_at: r.created_at,
        })
    }
}

fn collect(rows: Vec<ProductRow>) -> Result<Vec<Product>, RepositoryError> {
    rows.into_iter().map(Product::try_from).collect()
}

/// Append `WHERE` clauses for an active-product listing.
fn push_filter<'a>(qb: &mut QueryBuilder<'a, Postgres>, filter: &'a ProductFilter) {
    qb.push(" WHERE active");
    if let Some(category) = &filter.category {
        qb.push(" AND category = ").push_bind(category.as_str());
    }
    if let Some(pattern) = filter.search_pattern() {
        qb.push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

const fn order_clause(sort: ProductSort) -> &'static str {
    match sort {
        ProductSort::Newest => " ORDER BY created_at DESC, id DESC",
        ProductSort::PriceAsc => " ORDER BY price ASC, id ASC",
        ProductSort::PriceDesc => " ORDER BY price DESC, id ASC",
        ProductSort::Name => " ORDER BY name ASC, id ASC",
    }
}

#[async_trait]
impl ProductStore for PgStore {
    async fn product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM storefront.product WHERE id = $1");
        sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Product::try_from)
            .transpose()
    }

    async fn count_products(&self, filter: &ProductFilter) -> Result<u64, RepositoryError> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM storefront.product");
        push_filter(&mut qb, filter);
        let count = qb.build_query_scalar::<i64>().fetch_one(&self.pool).await?;
        u64::try_from(count)
            .map_err(|_| RepositoryError::DataCorruption(format!("negative count: {count}")))
    }

    async fn list_products(
        &self,
        filter: &ProductFilter,
        sort: ProductSort,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<Product>, RepositoryError> {
        let mut qb = QueryBuilder::new(format!(
            "SELECT {PRODUCT_COLUMNS} FROM storefront.product"
        ));
        push_filter(&mut qb, filter);
        qb.push(order_clause(sort))
            .push(" LIMIT ")
            .push_bind(i64::from(limit))
            .push(" OFFSET ")
            .push_bind(i64::from(offset));

        let rows = qb
            .build_query_as::<ProductRow>()
            .fetch_all(&self.pool)
            .await?;
        collect(rows)
    }

    async fn newest_products(&self, limit: u32) -> Result<Vec<Product>, RepositoryError> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM storefront.product
             WHERE active ORDER BY created_at DESC, id DESC LIMIT $1"
        );
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;
        collect(rows)
    }

    async fn all_products(&self) -> Result<Vec<Product>, RepositoryError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM storefront.product ORDER BY id");
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        collect(rows)
    }

    async fn categories(&self) -> Result<Vec<String>, RepositoryError> {
        let categories = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT category FROM storefront.product WHERE active ORDER BY category",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(categories)
    }

    async fn create_product(&self, product: &NewProduct) -> Result<Product, RepositoryError> {
        let sql = format!(
            "INSERT INTO storefront.product
                 (name, category, description, price, stock, image, active)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {PRODUCT_COLUMNS}"
        );
        sqlx::query_as::<_, ProductRow>(&sql)
            .bind(&product.name)
            .bind(&product.category)
            .bind(&product.description)
            .bind(product.price)
            .bind(to_i32(product.stock, "stock")?)
            .bind(&product.image)
            .bind(product.active)
            .fetch_one(&self.pool)
            .await?
            .try_into()
    }

    async fn update_product(
        &self,
        id: ProductId,
        product: &NewProduct,
    ) -> Result<Product, RepositoryError> {
        let sql = format!(
            "UPDATE storefront.product
             SET name = $2, category = $3, description = $4, price = $5,
                 stock = $6, image = $7, active = $8
             WHERE id = $1
             RETURNING {PRODUCT_COLUMNS}"
        );
        sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id)
            .bind(&product.name)
            .bind(&product.category)
            .bind(&product.description)
            .bind(product.price)
            .bind(to_i32(product.stock, "stock")?)
            .bind(&product.image)
            .bind(product.active)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)?
            .try_into()
    }
}
