//! Product reviews.
//!
//! Customers submit one review per product; it stays hidden until an
//! operator approves it (see the `tienda reviews` CLI commands).

use thiserror::Error;
use tracing::instrument;

use tienda_core::{ProductId, Rating, RatingError, ReviewId};

use crate::db::{RepositoryError, Store};
use crate::models::{CurrentUser, NewReview, Review};

/// Maximum review length in characters.
pub const MAX_COMMENT_LENGTH: usize = 1000;

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("product not found")]
    ProductNotFound,

    #[error("review not found")]
    NotFound,

    #[error(transparent)]
    InvalidRating(#[from] RatingError),

    #[error("comment must be 1 to {MAX_COMMENT_LENGTH} characters")]
    InvalidComment,

    #[error("product already reviewed by this user")]
    AlreadyReviewed,

    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<RepositoryError> for ReviewError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound => Self::NotFound,
            RepositoryError::Conflict(_) => Self::AlreadyReviewed,
            other => Self::Repository(other),
        }
    }
}

impl ReviewError {
    /// Message shown to the customer, `None` for server-side failures.
    #[must_use]
    pub fn customer_message(&self) -> Option<String> {
        match self {
            Self::ProductNotFound => Some("Producto no encontrado.".to_owned()),
            Self::NotFound => Some("Reseña no encontrada.".to_owned()),
            Self::InvalidRating(_) => {
                Some("La calificación debe estar entre 1 y 5 estrellas.".to_owned())
            }
            Self::InvalidComment => Some(format!(
                "El comentario debe tener entre 1 y {MAX_COMMENT_LENGTH} caracteres."
            )),
            Self::AlreadyReviewed => Some("Ya dejaste una reseña para este producto.".to_owned()),
            Self::Repository(_) => None,
        }
    }
}

pub struct ReviewService<'a> {
    store: &'a dyn Store,
}

impl<'a> ReviewService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Store an unapproved review by `user`.
    ///
    /// # Errors
    ///
    /// - `ReviewError::ProductNotFound` for unknown or inactive products
    /// - `ReviewError::InvalidRating` / `ReviewError::InvalidComment`
    /// - `ReviewError::AlreadyReviewed` on a second review of the same product
    #[instrument(skip(self, user, comment), fields(user_id = %user.id))]
    pub async fn submit(
        &self,
        user: &CurrentUser,
        product: ProductId,
        rating: i32,
        comment: &str,
    ) -> Result<Review, ReviewError> {
        let rating = Rating::new(rating)?;
        let comment = comment.trim();
        let length = comment.chars().count();
        if length == 0 || length > MAX_COMMENT_LENGTH {
            return Err(ReviewError::InvalidComment);
        }

        self.store
            .product(product)
            .await?
            .filter(|p| p.active)
            .ok_or(ReviewError::ProductNotFound)?;

        let review = self
            .store
            .create_review(&NewReview {
                product_id: product,
                user_id: user.id,
                author: user.username.clone(),
                rating,
                comment: comment.to_owned(),
            })
            .await?;

        tracing::info!(review_id = %review.id, "Review submitted for approval");
        Ok(review)
    }

    /// Reviews waiting for approval, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `ReviewError::Repository` if the store fails.
    pub async fn pending(&self) -> Result<Vec<Review>, ReviewError> {
        Ok(self.store.pending_reviews().await?)
    }

    /// Approve (or hide again) a review.
    ///
    /// # Errors
    ///
    /// Returns `ReviewError::NotFound` for an unknown review.
    #[instrument(skip(self))]
    pub async fn approve(&self, id: ReviewId, approved: bool) -> Result<Review, ReviewError> {
        Ok(self.store.set_review_approved(id, approved).await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tienda_core::{Email, Money, UserId};

    use super::*;
    use crate::db::{MemoryStore, ProductStore, ReviewStore};
    use crate::models::NewProduct;

    fn customer(id: i32) -> CurrentUser {
        CurrentUser {
            id: UserId::new(id),
            username: format!("cliente{id}"),
            email: Email::parse(&format!("cliente{id}@correo.cl")).unwrap(),
        }
    }

    async fn product(store: &MemoryStore) -> ProductId {
        store
            .create_product(&NewProduct {
                name: "Vela lavanda".to_owned(),
                category: "Velas".to_owned(),
                description: String::new(),
                price: Money::new(8_000),
                stock: 3,
                image: None,
                active: true,
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_submitted_review_waits_for_approval() {
        let store = MemoryStore::new();
        let vela = product(&store).await;
        let service = ReviewService::new(&store);

        let review = service
            .submit(&customer(1), vela, 5, "  Huele increíble  ")
            .await
            .unwrap();

        assert!(!review.approved);
        assert_eq!(review.comment, "Huele increíble");
        assert_eq!(review.author, "cliente1");
        assert!(store.approved_reviews(vela).await.unwrap().is_empty());

        service.approve(review.id, true).await.unwrap();
        assert_eq!(store.approved_reviews(vela).await.unwrap().len(), 1);
        assert!(service.pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_second_review_is_rejected() {
        let store = MemoryStore::new();
        let vela = product(&store).await;
        let service = ReviewService::new(&store);
        service.submit(&customer(1), vela, 4, "Buena").await.unwrap();

        assert!(matches!(
            service.submit(&customer(1), vela, 2, "Cambié de opinión").await,
            Err(ReviewError::AlreadyReviewed)
        ));
        service.submit(&customer(2), vela, 3, "Normal").await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_bad_rating_and_comment() {
        let store = MemoryStore::new();
        let vela = product(&store).await;
        let service = ReviewService::new(&store);
        let user = customer(1);

        assert!(matches!(
            service.submit(&user, vela, 6, "Buena").await,
            Err(ReviewError::InvalidRating(_))
        ));
        assert!(matches!(
            service.submit(&user, vela, 4, "   ").await,
            Err(ReviewError::InvalidComment)
        ));
        let long = "a".repeat(MAX_COMMENT_LENGTH + 1);
        assert!(matches!(
            service.submit(&user, vela, 4, &long).await,
            Err(ReviewError::InvalidComment)
        ));
        assert!(matches!(
            service.submit(&user, ProductId::new(999), 4, "Buena").await,
            Err(ReviewError::ProductNotFound)
        ));
    }
}
