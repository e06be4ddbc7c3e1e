//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::{Query, State};
use tower_sessions::Session;
use tracing::instrument;

use crate::error::AppError;
use crate::filters;
use crate::middleware::OptionalAuth;
use crate::models::{Product, Testimonial};
use crate::routes::{Layout, MessageQuery};
use crate::services::CatalogService;
use crate::state::AppState;

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "index.html")]
pub struct HomeTemplate {
    pub layout: Layout,
    pub products: Vec<Product>,
    pub testimonials: Vec<Testimonial>,
}

/// Display the home page: newest products and featured testimonials.
#[instrument(skip(state, session, query))]
pub async fn home(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Query(query): Query<MessageQuery>,
) -> Result<HomeTemplate, AppError> {
    let catalog = CatalogService::new(state.store());
    let products = catalog.featured().await?;
    let testimonials = catalog.testimonials().await?;
    let layout = Layout::load(&state, &session, user, query).await?;

    Ok(HomeTemplate {
        layout,
        products,
        testimonials,
    })
}
