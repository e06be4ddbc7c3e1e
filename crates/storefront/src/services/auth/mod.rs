//! Authentication service.
//!
//! Provides username/email + password accounts. Passwords are hashed with
//! Argon2id; the session side of logging in lives in
//! [`crate::middleware::auth`].

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use tracing::instrument;

use tienda_core::{Email, UserId};

use crate::db::{RepositoryError, Store};
use crate::models::{NewUser, Profile, User, ValidationError, required_text};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum username length.
const MAX_USERNAME_LENGTH: usize = 150;

/// Maximum length of first and last names.
const MAX_NAME_LENGTH: usize = 150;

/// The registration form as submitted.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct Registration {
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
}

/// Authentication service.
///
/// Handles user registration and login.
pub struct AuthService<'a> {
    store: &'a dyn Store,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Register a new user and give them a default profile.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Validation` for a missing or overlong username.
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::PasswordMismatch` if the confirmation differs.
    /// Returns `AuthError::UsernameTaken` / `AuthError::EmailTaken` for duplicates.
    #[instrument(skip(self, form), fields(username = %form.username))]
    pub async fn register(&self, form: &Registration) -> Result<User, AuthError> {
        let username = required_text("username", Some(&form.username), MAX_USERNAME_LENGTH)?;
        let first_name = bounded_name("first_name", &form.first_name)?;
        let last_name = bounded_name("last_name", &form.last_name)?;
        let email = Email::parse(&form.email)?;

        validate_password(&form.password)?;
        if form.password != form.password_confirm {
            return Err(AuthError::PasswordMismatch);
        }

        if self.store.username_exists(&username).await? {
            return Err(AuthError::UsernameTaken);
        }
        if self.store.email_owner(&email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let password_hash = hash_password(&form.password)?;

        // The checks above race with concurrent registrations; the unique
        // constraints have the final word.
        let user = self
            .store
            .create_user(&NewUser {
                username,
                email,
                first_name,
                last_name,
                password_hash,
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(what) if what == "username" => AuthError::UsernameTaken,
                RepositoryError::Conflict(_) => AuthError::EmailTaken,
                other => AuthError::Repository(other),
            })?;

        self.create_default_profile(user.id).await?;

        tracing::info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    /// Create the profile every new account starts with.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the user already has a profile or
    /// the store fails.
    pub async fn create_default_profile(&self, user: UserId) -> Result<Profile, AuthError> {
        Ok(self.store.create_profile(user).await?)
    }

    // =========================================================================
    // Login
    // =========================================================================

    /// Login with username or email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the login/password is wrong.
    #[instrument(skip(self, password))]
    pub async fn login(&self, login: &str, password: &str) -> Result<User, AuthError> {
        let login = login.trim();
        if login.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }

        let (user, password_hash) = self
            .store
            .user_for_login(login)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        Ok(user)
    }
}

fn bounded_name(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let value = value.trim();
    if value.chars().count() > MAX_NAME_LENGTH {
        return Err(ValidationError::new(
            field,
            format!("Máximo {MAX_NAME_LENGTH} caracteres"),
        ));
    }
    Ok(value.to_owned())
}

/// Validate password meets requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    Ok(())
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}
