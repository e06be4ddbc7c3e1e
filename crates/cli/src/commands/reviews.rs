//! Review moderation commands.

use tienda_core::ReviewId;
use tienda_storefront::db::PgStore;
use tienda_storefront::services::ReviewService;

use super::CommandError;

/// List reviews waiting for approval, oldest first.
///
/// # Errors
///
/// Returns an error if the database is unreachable.
pub async fn list() -> Result<(), CommandError> {
    let store = PgStore::new(super::connect().await?);
    let pending = ReviewService::new(&store).pending().await?;

    if pending.is_empty() {
        tracing::info!("No reviews waiting for approval");
        return Ok(());
    }

    tracing::info!("Pending reviews: {}", pending.len());
    for review in &pending {
        tracing::info!(
            "  #{} product {} by {} ({}/5): {}",
            review.id,
            review.product_id,
            review.author,
            review.rating.stars(),
            review.comment
        );
    }
    Ok(())
}

/// Publish or unpublish a review.
///
/// # Errors
///
/// Returns an error for an unknown review id.
pub async fn set_approved(id: i32, approved: bool) -> Result<(), CommandError> {
    let store = PgStore::new(super::connect().await?);
    let review = ReviewService::new(&store)
        .approve(ReviewId::new(id), approved)
        .await?;

    if review.approved {
        tracing::info!(review_id = %review.id, "Review published");
    } else {
        tracing::info!(review_id = %review.id, "Review hidden");
    }
    Ok(())
}
