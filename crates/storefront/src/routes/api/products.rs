//! Product list for JavaScript clients.

use axum::{Json, extract::State};
use serde::Serialize;
use tracing::instrument;

use tienda_core::{Money, ProductId};

use crate::error::AppError;
use crate::models::Product;
use crate::services::CatalogService;
use crate::state::AppState;

/// A product as the API exposes it.
#[derive(Debug, Serialize)]
pub struct ApiProduct {
    pub id: ProductId,
    pub name: String,
    pub category: String,
    pub description: String,
    pub price: Money,
    pub stock: u32,
    pub image: Option<String>,
    pub active: bool,
}

impl From<Product> for ApiProduct {
    fn from(product: Product) -> Self {
        Self {
            id: product.id,
            name: product.name,
            category: product.category,
            description: product.description,
            price: product.price,
            stock: product.stock,
            image: product.image.map(|path| format!("/static/{path}")),
            active: product.active,
        }
    }
}

/// Every product, ordered by id.
#[instrument(skip(state))]
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<ApiProduct>>, AppError> {
    let products = CatalogService::new(state.store()).all().await?;
    Ok(Json(products.into_iter().map(ApiProduct::from).collect()))
}
