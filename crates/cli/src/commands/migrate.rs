//! Database migration command.
//!
//! Applies `crates/storefront/migrations/` and creates the
//! `tower_sessions` table used for logins and guest carts.

use tower_sessions_sqlx_store::PostgresStore;

use super::CommandError;

/// Run storefront database migrations.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), CommandError> {
    let pool = super::connect().await?;

    tracing::info!("Running storefront migrations...");
    sqlx::migrate!("../storefront/migrations").run(&pool).await?;

    tracing::info!("Creating session table...");
    PostgresStore::new(pool).migrate().await?;

    tracing::info!("Storefront migrations complete!");
    Ok(())
}
