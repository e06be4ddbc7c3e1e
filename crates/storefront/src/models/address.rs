//! Saved shipping addresses.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use tienda_core::{AddressId, Region, UserId};

use super::{ValidationError, optional_text, required_text};

/// Country used when none is given.
pub const DEFAULT_COUNTRY: &str = "Chile";

/// Shipping destination fields.
///
/// Used both for saved addresses and for the snapshot copied onto an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressFields {
    pub full_name: String,
    pub phone: String,
    pub street: String,
    /// Free-form delivery hint ("depto 42, timbre malo").
    pub reference: Option<String>,
    pub comuna: String,
    pub region: Region,
    pub postal_code: Option<String>,
    pub country: String,
}

impl AddressFields {
    /// `street, comuna, region` on one line.
    #[must_use]
    pub fn one_line(&self) -> String {
        format!("{}, {}, {}", self.street, self.comuna, self.region)
    }
}

/// Raw address form input, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddressInput {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub street: Option<String>,
    pub reference: Option<String>,
    pub comuna: Option<String>,
    pub region: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

impl AddressInput {
    /// Validate into [`AddressFields`], reporting the first bad field.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when a required field is blank, a field
    /// is too long, or the region is not one of the sixteen regions.
    pub fn validate(&self) -> Result<AddressFields, ValidationError> {
        let full_name = required_text("full_name", self.full_name.as_deref(), 200)?;
        let phone = required_text("phone", self.phone.as_deref(), 20)?;
        let street = required_text("street", self.street.as_deref(), 300)?;
        let reference = optional_text("reference", self.reference.as_deref(), 300)?;
        let comuna = required_text("comuna", self.comuna.as_deref(), 100)?;
        let region = required_text("region", self.region.as_deref(), 100)?
            .parse::<Region>()
            .map_err(|_| ValidationError::new("region", "Selecciona una región válida"))?;
        let postal_code = optional_text("postal_code", self.postal_code.as_deref(), 10)?;
        let country = optional_text("country", self.country.as_deref(), 100)?
            .unwrap_or_else(|| DEFAULT_COUNTRY.to_owned());

        Ok(AddressFields {
            full_name,
            phone,
            street,
            reference,
            comuna,
            region,
            postal_code,
            country,
        })
    }
}

impl From<&AddressFields> for AddressInput {
    fn from(fields: &AddressFields) -> Self {
        Self {
            full_name: Some(fields.full_name.clone()),
            phone: Some(fields.phone.clone()),
            street: Some(fields.street.clone()),
            reference: fields.reference.clone(),
            comuna: Some(fields.comuna.clone()),
            region: Some(fields.region.code().to_owned()),
            postal_code: fields.postal_code.clone(),
            country: Some(fields.country.clone()),
        }
    }
}

/// A saved address owned by one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub id: AddressId,
    pub user_id: UserId,
    pub fields: AddressFields,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}
