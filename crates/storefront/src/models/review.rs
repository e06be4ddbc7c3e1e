//! Product reviews and shop testimonials.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use tienda_core::{ProductId, Rating, ReviewId, TestimonialId, UserId};

/// A customer's review of a product. Hidden until approved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Review {
    pub id: ReviewId,
    pub product_id: ProductId,
    pub user_id: UserId,
    pub author: String,
    pub rating: Rating,
    pub comment: String,
    pub approved: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewReview {
    pub product_id: ProductId,
    pub user_id: UserId,
    pub author: String,
    pub rating: Rating,
    pub comment: String,
}

/// Average and count of approved reviews for a product.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingSummary {
    /// Rounded to one decimal; `0.0` without reviews.
    pub average: f64,
    pub count: usize,
}

impl RatingSummary {
    #[must_use]
    pub fn of(reviews: &[Review]) -> Self {
        let ratings: Vec<Rating> = reviews.iter().map(|r| r.rating).collect();
        Self {
            average: Rating::average(&ratings),
            count: ratings.len(),
        }
    }
}

/// A testimonial shown on the home page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Testimonial {
    pub id: TestimonialId,
    pub author: String,
    pub content: String,
    pub rating: Rating,
    pub active: bool,
    pub featured: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTestimonial {
    pub author: String,
    pub content: String,
    pub rating: Rating,
    #[serde(default = "yes")]
    pub active: bool,
    #[serde(default)]
    pub featured: bool,
}

const fn yes() -> bool {
    true
}
