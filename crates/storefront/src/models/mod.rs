//! Domain models for the storefront.
//!
//! These are validated domain objects, separate from the row types the
//! `PostgreSQL` store decodes into. Every store implementation hands back
//! these types.

pub mod address;
pub mod cart;
pub mod order;
pub mod product;
pub mod review;
pub mod session;
pub mod user;

pub use address::{Address, AddressFields, AddressInput};
pub use cart::{Cart, CartLine, CartOwner, CartTotals};
pub use order::{
    DraftError, DraftLine, Order, OrderDraft, OrderLine, OrderSummary, PlaceOrder,
};
pub use product::{NewProduct, Product, ProductFilter, ProductPage, ProductSort};
pub use review::{NewReview, NewTestimonial, RatingSummary, Review, Testimonial};
pub use session::{CurrentUser, keys as session_keys};
pub use user::{NewUser, Profile, ProfileFields, User};

use thiserror::Error;

/// A submitted field failed validation.
///
/// `message` is written for the customer and shown next to the form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Trim `value` and require it to be non-empty and at most `max` characters.
pub(crate) fn required_text(
    field: &'static str,
    value: Option<&str>,
    max: usize,
) -> Result<String, ValidationError> {
    let value = value.map(str::trim).unwrap_or_default();
    if value.is_empty() {
        return Err(ValidationError::new(field, "Este campo es obligatorio"));
    }
    bounded(field, value, max)
}

/// Trim `value`; empty input becomes `None`.
pub(crate) fn optional_text(
    field: &'static str,
    value: Option<&str>,
    max: usize,
) -> Result<Option<String>, ValidationError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => bounded(field, v, max).map(Some),
    }
}

fn bounded(field: &'static str, value: &str, max: usize) -> Result<String, ValidationError> {
    if value.chars().count() > max {
        return Err(ValidationError::new(
            field,
            format!("Máximo {max} caracteres"),
        ));
    }
    Ok(value.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_text_trims_and_checks_length() {
        assert_eq!(
            required_text("comuna", Some("  Ñuñoa "), 100),
            Ok("Ñuñoa".to_owned())
        );
        assert!(required_text("comuna", Some("   "), 100).is_err());
        assert!(required_text("comuna", None, 100).is_err());
        assert!(required_text("phone", Some("123456"), 5).is_err());
    }

    #[test]
    fn test_optional_text_maps_blank_to_none() {
        assert_eq!(optional_text("reference", Some(" "), 10), Ok(None));
        assert_eq!(optional_text("reference", None, 10), Ok(None));
        assert_eq!(
            optional_text("reference", Some("Depto 4"), 10),
            Ok(Some("Depto 4".to_owned()))
        );
    }
}
