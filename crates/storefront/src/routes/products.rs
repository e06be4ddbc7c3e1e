//! Product route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use tienda_core::ProductId;

use crate::error::{AppError, add_breadcrumb};
use crate::filters;
use crate::middleware::{OptionalAuth, RequireAuth};
use crate::models::{Product, ProductFilter, ProductPage, ProductSort, RatingSummary, Review};
use crate::routes::{Layout, MessageQuery, redirect_error, redirect_success};
use crate::services::{CatalogService, ProductDetail, ReviewService};
use crate::state::AppState;

/// Listing query parameters, named as the shop's links have always used them.
#[derive(Debug, Default, Deserialize)]
pub struct ListingQuery {
    pub categoria: Option<String>,
    pub q: Option<String>,
    pub orden: Option<String>,
    pub page: Option<u32>,
    pub error: Option<String>,
    pub success: Option<String>,
}

/// Product listing page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct ProductsIndexTemplate {
    pub layout: Layout,
    pub page: ProductPage,
    pub categories: Vec<String>,
    pub filter: ProductFilter,
    pub sort: ProductSort,
    pub sorts: [ProductSort; 4],
}

impl ProductsIndexTemplate {
    #[must_use]
    pub fn previous_link(&self) -> String {
        self.page_link(self.page.page.saturating_sub(1))
    }

    #[must_use]
    pub fn next_link(&self) -> String {
        self.page_link(self.page.page.saturating_add(1))
    }

    /// Link to another page of the same listing.
    fn page_link(&self, page: u32) -> String {
        let mut link = format!("/products?page={page}&orden={}", self.sort.as_param());
        if let Some(category) = &self.filter.category {
            link.push_str("&categoria=");
            link.push_str(&urlencoding::encode(category));
        }
        if let Some(search) = &self.filter.search {
            link.push_str("&q=");
            link.push_str(&urlencoding::encode(search));
        }
        link
    }

    #[must_use]
    pub fn is_category(&self, category: &str) -> bool {
        self.filter.category.as_deref() == Some(category)
    }

    #[must_use]
    pub fn search_text(&self) -> &str {
        self.filter.search.as_deref().unwrap_or_default()
    }

    #[must_use]
    pub fn category_value(&self) -> &str {
        self.filter.category.as_deref().unwrap_or_default()
    }
}

/// Product detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ProductShowTemplate {
    pub layout: Layout,
    pub product: Product,
    pub reviews: Vec<Review>,
    pub rating: RatingSummary,
}

impl ProductShowTemplate {
    /// Average rating formatted with one decimal.
    #[must_use]
    pub fn average(&self) -> String {
        format!("{:.1}", self.rating.average)
    }
}

/// Display product listing page.
#[instrument(skip(state, session, query))]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Query(query): Query<ListingQuery>,
) -> Result<ProductsIndexTemplate, AppError> {
    let filter = ProductFilter::new(query.categoria.as_deref(), query.q.as_deref());
    let sort = ProductSort::from_param(query.orden.as_deref());

    let catalog = CatalogService::new(state.store());
    let page = catalog
        .list(&filter, sort, query.page.unwrap_or(1))
        .await?;
    let categories = catalog.categories().await?;

    let messages = MessageQuery {
        error: query.error,
        success: query.success,
    };
    let layout = Layout::load(&state, &session, user, messages).await?;

    Ok(ProductsIndexTemplate {
        layout,
        page,
        categories,
        filter,
        sort,
        sorts: ProductSort::ALL,
    })
}

/// Display product detail page.
#[instrument(skip(state, session, query))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Path(id): Path<i32>,
    Query(query): Query<MessageQuery>,
) -> Result<ProductShowTemplate, AppError> {
    let ProductDetail {
        product,
        reviews,
        rating,
    } = CatalogService::new(state.store())
        .detail(ProductId::new(id))
        .await?;

    add_breadcrumb(
        "navigation",
        "Viewed product page",
        Some(&[("product_id", &id.to_string())]),
    );

    let layout = Layout::load(&state, &session, user, query).await?;

    Ok(ProductShowTemplate {
        layout,
        product,
        reviews,
        rating,
    })
}

/// Review form data.
#[derive(Debug, Deserialize)]
pub struct ReviewForm {
    pub calificacion: i32,
    pub comentario: String,
}

/// Submit a review. It shows up once approved.
#[instrument(skip(state, form), fields(user_id = %user.id))]
pub async fn submit_review(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i32>,
    Form(form): Form<ReviewForm>,
) -> Result<Response, AppError> {
    let back = format!("/products/{id}");
    let result = ReviewService::new(state.store())
        .submit(&user, ProductId::new(id), form.calificacion, &form.comentario)
        .await;

    match result {
        Ok(_) => Ok(redirect_success(
            &back,
            "¡Gracias por tu reseña! Se publicará una vez aprobada.",
        )
        .into_response()),
        Err(err) => match err.customer_message() {
            Some(message) => Ok(redirect_error(&back, &message).into_response()),
            None => Err(err.into()),
        },
    }
}
