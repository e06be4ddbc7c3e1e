//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;
use crate::models::ValidationError;

/// Errors that can occur during registration and login.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] tienda_core::EmailError),

    /// A form field failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Username already registered.
    #[error("username already taken")]
    UsernameTaken,

    /// Email already registered.
    #[error("email already registered")]
    EmailTaken,

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// Password and confirmation differ.
    #[error("passwords do not match")]
    PasswordMismatch,

    /// Invalid credentials (wrong password or user not found).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}

impl AuthError {
    /// Message shown next to the form, `None` for server-side failures.
    #[must_use]
    pub fn customer_message(&self) -> Option<String> {
        match self {
            Self::InvalidEmail(_) => Some("Ingresa un correo electrónico válido.".to_owned()),
            Self::Validation(v) => Some(v.message.clone()),
            Self::UsernameTaken => Some("Ese nombre de usuario ya está en uso.".to_owned()),
            Self::EmailTaken => Some("Ya existe una cuenta con ese correo.".to_owned()),
            Self::WeakPassword(_) => Some(format!(
                "La contraseña debe tener al menos {} caracteres.",
                super::MIN_PASSWORD_LENGTH
            )),
            Self::PasswordMismatch => Some("Las contraseñas no coinciden.".to_owned()),
            Self::InvalidCredentials => Some("Usuario o contraseña incorrectos.".to_owned()),
            Self::Repository(_) | Self::PasswordHash => None,
        }
    }
}
