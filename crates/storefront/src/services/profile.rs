//! The customer's own profile page.

use thiserror::Error;
use tracing::instrument;

use tienda_core::{Email, EmailError, UserId};

use crate::db::{RepositoryError, Store};
use crate::models::{Profile, ProfileFields, User, ValidationError};

/// Maximum lengths of the free-text profile fields.
const MAX_NAME_LENGTH: usize = 150;
const MAX_PHONE_LENGTH: usize = 20;
const MAX_FIELD_LENGTH: usize = 255;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("user not found")]
    NotFound,

    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("email already registered")]
    EmailTaken,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<RepositoryError> for ProfileError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound => Self::NotFound,
            RepositoryError::Conflict(_) => Self::EmailTaken,
            other => Self::Repository(other),
        }
    }
}

impl ProfileError {
    /// Message shown next to the form, `None` for server-side failures.
    #[must_use]
    pub fn customer_message(&self) -> Option<String> {
        match self {
            Self::NotFound => Some("No encontramos tu cuenta.".to_owned()),
            Self::InvalidEmail(_) => Some("Ingresa un correo electrónico válido.".to_owned()),
            Self::EmailTaken => Some("Ya existe una cuenta con ese correo.".to_owned()),
            Self::Validation(v) => Some(v.message.clone()),
            Self::Repository(_) => None,
        }
    }
}

/// The profile form as submitted: account names and email plus the
/// profile fields.
#[derive(Debug, Clone)]
pub struct ProfileUpdate {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub fields: ProfileFields,
}

pub struct ProfileService<'a> {
    store: &'a dyn Store,
}

impl<'a> ProfileService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// The user and their profile, creating the profile if registration
    /// never got to it.
    ///
    /// # Errors
    ///
    /// Returns `ProfileError::NotFound` if the user no longer exists.
    pub async fn get_or_create(&self, user: UserId) -> Result<(User, Profile), ProfileError> {
        let account = self.store.user(user).await?.ok_or(ProfileError::NotFound)?;
        let profile = match self.store.profile(user).await? {
            Some(profile) => profile,
            None => {
                tracing::warn!(user_id = %user, "Profile missing, creating default");
                self.store.create_profile(user).await.map_err(|e| match e {
                    RepositoryError::Conflict(_) => ProfileError::Repository(e),
                    other => other.into(),
                })?
            }
        };
        Ok((account, profile))
    }

    /// Update the user's names and email together with the profile fields.
    ///
    /// # Errors
    ///
    /// - `ProfileError::InvalidEmail` / `ProfileError::Validation` for bad input
    /// - `ProfileError::EmailTaken` when another account has the email
    #[instrument(skip(self, update), fields(user_id = %user))]
    pub async fn update(
        &self,
        user: UserId,
        update: &ProfileUpdate,
    ) -> Result<(User, Profile), ProfileError> {
        let email = Email::parse(&update.email)?;
        let first_name = bounded("first_name", &update.first_name, MAX_NAME_LENGTH)?;
        let last_name = bounded("last_name", &update.last_name, MAX_NAME_LENGTH)?;
        let fields = normalize(&update.fields)?;

        if self
            .store
            .email_owner(&email)
            .await?
            .is_some_and(|owner| owner != user)
        {
            return Err(ProfileError::EmailTaken);
        }

        // Recover a missing profile before writing to it.
        self.get_or_create(user).await?;

        let account = self
            .store
            .update_user(user, &first_name, &last_name, &email)
            .await?;
        let profile = self.store.update_profile(user, &fields).await?;

        tracing::info!("Profile updated");
        Ok((account, profile))
    }
}

fn bounded(field: &'static str, value: &str, max: usize) -> Result<String, ValidationError> {
    let value = value.trim();
    if value.chars().count() > max {
        return Err(ValidationError::new(field, format!("Máximo {max} caracteres")));
    }
    Ok(value.to_owned())
}

fn normalize(fields: &ProfileFields) -> Result<ProfileFields, ValidationError> {
    Ok(ProfileFields {
        phone: bounded("phone", &fields.phone, MAX_PHONE_LENGTH)?,
        birth_date: fields.birth_date,
        street: bounded("street", &fields.street, MAX_FIELD_LENGTH)?,
        city: bounded("city", &fields.city, MAX_NAME_LENGTH)?,
        state: bounded("state", &fields.state, MAX_NAME_LENGTH)?,
        postal_code: bounded("postal_code", &fields.postal_code, MAX_PHONE_LENGTH)?,
        country: bounded("country", &fields.country, MAX_NAME_LENGTH)?,
        newsletter: fields.newsletter,
        notifications: fields.notifications,
    })
}
