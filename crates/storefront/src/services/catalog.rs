//! Product catalog reads.

use thiserror::Error;
use tracing::instrument;

use tienda_core::ProductId;

use crate::db::{RepositoryError, Store};
use crate::models::{
    Product, ProductFilter, ProductPage, ProductSort, RatingSummary, Review, Testimonial,
};

/// Products per listing page.
pub const PAGE_SIZE: u32 = 12;

/// Products shown on the home page.
pub const HOME_PRODUCTS: u32 = 8;

/// Testimonials shown on the home page.
pub const HOME_TESTIMONIALS: u32 = 6;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("product not found")]
    NotFound,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// A product page: the product plus its approved reviews.
#[derive(Debug, Clone)]
pub struct ProductDetail {
    pub product: Product,
    pub reviews: Vec<Review>,
    pub rating: RatingSummary,
}

pub struct CatalogService<'a> {
    store: &'a dyn Store,
}

impl<'a> CatalogService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// One page of active products. `page` is 1-based and clamped into range.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the store fails.
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        filter: &ProductFilter,
        sort: ProductSort,
        page: u32,
    ) -> Result<ProductPage, CatalogError> {
        let total_products = self.store.count_products(filter).await?;
        let total_pages = u32::try_from(total_products.div_ceil(u64::from(PAGE_SIZE)))
            .unwrap_or(u32::MAX)
            .max(1);
        let page = page.clamp(1, total_pages);
        let offset = (page - 1).saturating_mul(PAGE_SIZE);

        let products = self
            .store
            .list_products(filter, sort, offset, PAGE_SIZE)
            .await?;

        Ok(ProductPage {
            products,
            page,
            total_pages,
            total_products,
        })
    }

    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the store fails.
    pub async fn categories(&self) -> Result<Vec<String>, CatalogError> {
        Ok(self.store.categories().await?)
    }

    /// An active product with its approved reviews.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` for unknown or inactive products.
    #[instrument(skip(self))]
    pub async fn detail(&self, id: ProductId) -> Result<ProductDetail, CatalogError> {
        let product = self
            .store
            .product(id)
            .await?
            .filter(|p| p.active)
            .ok_or(CatalogError::NotFound)?;
        let reviews = self.store.approved_reviews(id).await?;
        let rating = RatingSummary::of(&reviews);

        Ok(ProductDetail {
            product,
            reviews,
            rating,
        })
    }

    /// Newest active products for the home page.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the store fails.
    pub async fn featured(&self) -> Result<Vec<Product>, CatalogError> {
        Ok(self.store.newest_products(HOME_PRODUCTS).await?)
    }

    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the store fails.
    pub async fn testimonials(&self) -> Result<Vec<Testimonial>, CatalogError> {
        Ok(self.store.featured_testimonials(HOME_TESTIMONIALS).await?)
    }

    /// Every product by ascending id, for the JSON API.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the store fails.
    pub async fn all(&self) -> Result<Vec<Product>, CatalogError> {
        Ok(self.store.all_products().await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tienda_core::{Money, Rating, UserId};

    use super::*;
    use crate::db::{MemoryStore, ProductStore, ReviewStore};
    use crate::models::{NewProduct, NewReview};

    fn new_product(name: &str, category: &str, price: i64, active: bool) -> NewProduct {
        NewProduct {
            name: name.to_owned(),
            category: category.to_owned(),
            description: format!("{name} hecha a mano"),
            price: Money::new(price),
            stock: 4,
            image: None,
            active,
        }
    }

    #[tokio::test]
    async fn test_listing_paginates_by_twelve() {
        let store = MemoryStore::new();
        for i in 0..13 {
            store
                .create_product(&new_product(&format!("Vela {i:02}"), "Velas", 1_000, true))
                .await
                .unwrap();
        }
        let catalog = CatalogService::new(&store);
        let filter = ProductFilter::default();

        let first = catalog.list(&filter, ProductSort::Name, 1).await.unwrap();
        assert_eq!(first.products.len(), 12);
        assert_eq!(first.total_pages, 2);
        assert!(first.has_next());

        let clamped = catalog.list(&filter, ProductSort::Name, 9).await.unwrap();
        assert_eq!(clamped.page, 2);
        assert_eq!(clamped.products.len(), 1);
        assert_eq!(clamped.products[0].name, "Vela 12");
    }

    #[tokio::test]
    async fn test_listing_hides_inactive_and_filters() {
        let store = MemoryStore::new();
        store
            .create_product(&new_product("Vela lavanda", "Velas", 8_000, true))
            .await
            .unwrap();
        store
            .create_product(&new_product("Jabón avena", "Jabones", 4_000, true))
            .await
            .unwrap();
        store
            .create_product(&new_product("Vela retirada", "Velas", 9_000, false))
            .await
            .unwrap();
        let catalog = CatalogService::new(&store);

        let velas = ProductFilter::new(Some("Velas"), None);
        let page = catalog.list(&velas, ProductSort::PriceDesc, 1).await.unwrap();
        assert_eq!(page.total_products, 1);
        assert_eq!(page.products[0].name, "Vela lavanda");

        let search = ProductFilter::new(None, Some("AVENA"));
        let page = catalog.list(&search, ProductSort::Newest, 1).await.unwrap();
        assert_eq!(page.products.len(), 1);

        assert_eq!(
            catalog.categories().await.unwrap(),
            vec!["Jabones".to_owned(), "Velas".to_owned()]
        );
    }

    #[tokio::test]
    async fn test_detail_averages_approved_reviews_only() {
        let store = MemoryStore::new();
        let vela = store
            .create_product(&new_product("Vela lavanda", "Velas", 8_000, true))
            .await
            .unwrap();
        for (user, stars, approve) in [(1, 5, true), (2, 4, true), (3, 4, true), (4, 1, false)] {
            let review = store
                .create_review(&NewReview {
                    product_id: vela.id,
                    user_id: UserId::new(user),
                    author: format!("cliente{user}"),
                    rating: Rating::new(stars).unwrap(),
                    comment: "Muy buena".to_owned(),
                })
                .await
                .unwrap();
            if approve {
                store.set_review_approved(review.id, true).await.unwrap();
            }
        }

        let detail = CatalogService::new(&store).detail(vela.id).await.unwrap();
        assert_eq!(detail.rating.count, 3);
        assert!((detail.rating.average - 4.3).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_inactive_product_detail_is_not_found() {
        let store = MemoryStore::new();
        let hidden = store
            .create_product(&new_product("Vela retirada", "Velas", 9_000, false))
            .await
            .unwrap();
        let err = CatalogService::new(&store).detail(hidden.id).await.unwrap_err();
        assert!(matches!(err, CatalogError::NotFound));
    }
}
