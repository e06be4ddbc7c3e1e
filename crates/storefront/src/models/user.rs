//! User and profile domain types.

use chrono::{DateTime, NaiveDate, Utc};

use tienda_core::{Email, ProfileId, UserId};

/// A registered customer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: Email,
    pub first_name: String,
    pub last_name: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// First and last name, or the username when both are blank.
    #[must_use]
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_owned()
        }
    }
}

/// A user about to be inserted; the password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: Email,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
}

/// Editable profile data. Blank strings mean "not provided".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileFields {
    pub phone: String,
    pub birth_date: Option<NaiveDate>,
    pub street: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub newsletter: bool,
    pub notifications: bool,
}

impl Default for ProfileFields {
    fn default() -> Self {
        Self {
            phone: String::new(),
            birth_date: None,
            street: String::new(),
            city: String::new(),
            state: String::new(),
            postal_code: String::new(),
            country: super::address::DEFAULT_COUNTRY.to_owned(),
            newsletter: true,
            notifications: true,
        }
    }
}

/// Per-user profile, created right after registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub id: ProfileId,
    pub user_id: UserId,
    pub fields: ProfileFields,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
