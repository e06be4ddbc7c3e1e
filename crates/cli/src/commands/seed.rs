//! Seed the catalog from a YAML file.
//!
//! The file has two optional lists, `products` and `testimonials`, in the
//! shape of [`NewProduct`] and [`NewTestimonial`]. Products whose name is
//! already in the catalog are skipped, so the command can be re-run after
//! adding entries.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use tienda_storefront::db::{PgStore, ProductStore, ReviewStore};
use tienda_storefront::models::{NewProduct, NewTestimonial};

use super::CommandError;

/// Contents of a seed file.
#[derive(Debug, Default, Deserialize)]
pub struct CatalogSeed {
    #[serde(default)]
    pub products: Vec<NewProduct>,
    #[serde(default)]
    pub testimonials: Vec<NewTestimonial>,
}

impl CatalogSeed {
    /// Parse and check a seed file's contents.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed YAML or a product with a negative
    /// price or a blank name.
    pub fn parse(content: &str) -> Result<Self, CommandError> {
        let seed: Self = serde_yaml::from_str(content)?;

        for product in &seed.products {
            if product.name.trim().is_empty() {
                return Err(CommandError::InvalidArgument(
                    "product with a blank name".to_owned(),
                ));
            }
            if product.price.is_negative() {
                return Err(CommandError::InvalidArgument(format!(
                    "{}: price cannot be negative",
                    product.name
                )));
            }
        }

        Ok(seed)
    }
}

/// Seed products and testimonials from `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or a database
/// operation fails.
pub async fn catalog(path: &Path) -> Result<(), CommandError> {
    info!(path = %path.display(), "Loading catalog from file");

    // Read and validate before connecting to the database
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CommandError::Io {
            path: path.display().to_string(),
            source,
        })?;
    let seed = CatalogSeed::parse(&content)?;

    info!(
        products = seed.products.len(),
        testimonials = seed.testimonials.len(),
        "Parsed seed file"
    );

    let store = PgStore::new(super::connect().await?);

    let existing: HashSet<String> = store
        .all_products()
        .await?
        .into_iter()
        .map(|p| p.name)
        .collect();

    let mut inserted = 0;
    let mut skipped = 0;
    for product in &seed.products {
        if existing.contains(&product.name) {
            warn!(name = %product.name, "Product already exists, skipping");
            skipped += 1;
            continue;
        }
        store.create_product(product).await?;
        inserted += 1;
    }

    for testimonial in &seed.testimonials {
        store.create_testimonial(testimonial).await?;
    }

    info!("Seeding complete!");
    info!("  Products inserted: {inserted}");
    info!("  Products skipped (already exist): {skipped}");
    info!("  Testimonials inserted: {}", seed.testimonials.len());

    Ok(())
}
