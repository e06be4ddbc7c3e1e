//! `PostgreSQL` review and testimonial queries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use tienda_core::{ProductId, Rating, ReviewId, TestimonialId, UserId};

use super::{PgStore, RepositoryError, ReviewStore, conflict_on_unique};
use crate::models::{NewReview, NewTestimonial, Review, Testimonial};

const REVIEW_COLUMNS: &str =
    "id, product_id, user_id, author, rating, comment, approved, created_at";

const TESTIMONIAL_COLUMNS: &str = "id, author, content, rating, active, featured, created_at";

fn rating(value: i32) -> Result<Rating, RepositoryError> {
    Rating::new(value).map_err(|e| RepositoryError::DataCorruption(e.to_string()))
}

#[derive(sqlx::FromRow)]
struct ReviewRow {
    id: ReviewId,
    product_id: ProductId,
    user_id: UserId,
    author: String,
    rating: i32,
    comment: String,
    approved: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<ReviewRow> for Review {
    type Error = RepositoryError;

    fn try_from(r: ReviewRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            product_id: r.product_id,
            user_id: r.user_id,
            author: r.author,
            rating: rating(r.rating)?,
            comment: r.comment,
            approved: r.approved,
            created_at: r.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct TestimonialRow {
    id: TestimonialId,
    author: String,
    content: String,
    rating: i32,
    active: bool,
    featured: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<TestimonialRow> for Testimonial {
    type Error = RepositoryError;

    fn try_from(r: TestimonialRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            author: r.author,
            content: r.content,
            rating: rating(r.rating)?,
            active: r.active,
            featured: r.featured,
            created_at: r.created_at,
        })
    }
}

#[async_trait]
impl ReviewStore for PgStore {
    async fn approved_reviews(&self, product: ProductId) -> Result<Vec<Review>, RepositoryError> {
        let sql = format!(
            "SELECT {REVIEW_COLUMNS} FROM storefront.review
             WHERE product_id = $1 AND approved
             ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, ReviewRow>(&sql)
            .bind(product)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Review::try_from)
            .collect()
    }

    async fn pending_reviews(&self) -> Result<Vec<Review>, RepositoryError> {
        let sql = format!(
            "SELECT {REVIEW_COLUMNS} FROM storefront.review
             WHERE NOT approved
             ORDER BY created_at, id"
        );
        sqlx::query_as::<_, ReviewRow>(&sql)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Review::try_from)
            .collect()
    }

    async fn create_review(&self, review: &NewReview) -> Result<Review, RepositoryError> {
        let sql = format!(
            "INSERT INTO storefront.review (product_id, user_id, author, rating, comment)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {REVIEW_COLUMNS}"
        );
        sqlx::query_as::<_, ReviewRow>(&sql)
            .bind(review.product_id)
            .bind(review.user_id)
            .bind(&review.author)
            .bind(i32::from(review.rating))
            .bind(&review.comment)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| conflict_on_unique(e, "review"))?
            .try_into()
    }

    async fn set_review_approved(
        &self,
        id: ReviewId,
        approved: bool,
    ) -> Result<Review, RepositoryError> {
        let sql = format!(
            "UPDATE storefront.review SET approved = $2 WHERE id = $1 RETURNING {REVIEW_COLUMNS}"
        );
        sqlx::query_as::<_, ReviewRow>(&sql)
            .bind(id)
            .bind(approved)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)?
            .try_into()
    }

    async fn featured_testimonials(
        &self,
        limit: u32,
    ) -> Result<Vec<Testimonial>, RepositoryError> {
        let sql = format!(
            "SELECT {TESTIMONIAL_COLUMNS} FROM storefront.testimonial
             WHERE active AND featured
             ORDER BY created_at DESC, id DESC
             LIMIT $1"
        );
        sqlx::query_as::<_, TestimonialRow>(&sql)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Testimonial::try_from)
            .collect()
    }

    async fn create_testimonial(
        &self,
        testimonial: &NewTestimonial,
    ) -> Result<Testimonial, RepositoryError> {
        let sql = format!(
            "INSERT INTO storefront.testimonial (author, content, rating, active, featured)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {TESTIMONIAL_COLUMNS}"
        );
        sqlx::query_as::<_, TestimonialRow>(&sql)
            .bind(&testimonial.author)
            .bind(&testimonial.content)
            .bind(i32::from(testimonial.rating))
            .bind(testimonial.active)
            .bind(testimonial.featured)
            .fetch_one(&self.pool)
            .await?
            .try_into()
    }
}
