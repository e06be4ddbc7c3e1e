//! Star ratings for reviews and testimonials.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("rating must be between 1 and 5, got {got}")]
pub struct RatingError {
    pub got: i32,
}

/// A whole-star rating from 1 to 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct Rating(u8);

impl Rating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    /// # Errors
    ///
    /// Returns [`RatingError`] when `stars` is outside `1..=5`.
    pub fn new(stars: i32) -> Result<Self, RatingError> {
        u8::try_from(stars)
            .ok()
            .filter(|s| (Self::MIN..=Self::MAX).contains(s))
            .map(Self)
            .ok_or(RatingError { got: stars })
    }

    #[must_use]
    pub const fn stars(self) -> u8 {
        self.0
    }

    /// Average of `ratings` rounded to one decimal, `0.0` when empty.
    #[must_use]
    pub fn average(ratings: &[Self]) -> f64 {
        if ratings.is_empty() {
            return 0.0;
        }
        let sum: u32 = ratings.iter().map(|r| u32::from(r.0)).sum();
        let count = u32::try_from(ratings.len()).unwrap_or(u32::MAX);
        let avg = f64::from(sum) / f64::from(count);
        (avg * 10.0).round() / 10.0
    }
}

impl TryFrom<i32> for Rating {
    type Error = RatingError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Rating> for i32 {
    fn from(rating: Rating) -> Self {
        Self::from(rating.0)
    }
}
