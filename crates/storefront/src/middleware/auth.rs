//! Authentication extractors and session helpers.
//!
//! The session holds two things: the logged-in [`CurrentUser`] and, for
//! guests, an anonymous cart token. Both are read and written only here.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;
use uuid::Uuid;

use crate::models::{CartOwner, CurrentUser, session_keys};

/// Extractor that requires an authenticated user.
///
/// If the user is not logged in, HTML requests are redirected to the login
/// page (remembering where they were going) and API requests get a 401.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAuth(user): RequireAuth,
/// ) -> impl IntoResponse {
///     format!("Hola, {}!", user.username)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

/// Error returned when authentication is required but the user is not logged in.
pub enum AuthRejection {
    /// Redirect to login page (for HTML requests), with the path to return to.
    RedirectToLogin(String),
    /// Unauthorized response (for API requests).
    Unauthorized,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin(next) => Redirect::to(&format!(
                "/auth/login?next={}",
                urlencoding::encode(&next)
            ))
            .into_response(),
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
        }
    }
}

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Get the session from extensions (set by SessionManagerLayer)
        let session = parts
            .extensions
            .get::<Session>()
            .ok_or(AuthRejection::Unauthorized)?;

        let user: CurrentUser = session
            .get(session_keys::CURRENT_USER)
            .await
            .ok()
            .flatten()
            .ok_or_else(|| {
                let path = parts.uri.path();
                if path.starts_with("/api/") {
                    AuthRejection::Unauthorized
                } else {
                    AuthRejection::RedirectToLogin(login_return_path(parts))
                }
            })?;

        Ok(Self(user))
    }
}

/// Extractor that optionally gets the current user.
///
/// Unlike `RequireAuth`, this does not reject the request if the user is not logged in.
pub struct OptionalAuth(pub Option<CurrentUser>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = match parts.extensions.get::<Session>() {
            Some(session) => current_user(session).await,
            None => None,
        };

        Ok(Self(user))
    }
}

/// Where to send the user after logging in. Only GET pages are returned to;
/// anything else lands on the home page.
fn login_return_path(parts: &Parts) -> String {
    if parts.method == axum::http::Method::GET {
        return parts
            .uri
            .path_and_query()
            .map_or_else(|| "/".to_string(), ToString::to_string);
    }
    "/".to_string()
}

/// The logged-in user, if any.
pub async fn current_user(session: &Session) -> Option<CurrentUser> {
    session
        .get::<CurrentUser>(session_keys::CURRENT_USER)
        .await
        .ok()
        .flatten()
}

/// Log `user` in.
///
/// The session id is cycled first so a pre-login session id can't be reused.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &CurrentUser,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::CURRENT_USER, user).await
}

/// Log out: drop everything in the session, including the guest cart token.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}

/// Who owns the cart for this request.
///
/// Logged-in users own their user cart. Guests are identified by a random
/// token kept in the session, minted on first use. The two carts are never
/// merged.
///
/// # Errors
///
/// Returns an error if the session cannot be read or written.
pub async fn cart_owner(
    session: &Session,
    user: Option<&CurrentUser>,
) -> Result<CartOwner, tower_sessions::session::Error> {
    if let Some(user) = user {
        return Ok(CartOwner::User(user.id));
    }

    if let Some(token) = session.get::<Uuid>(session_keys::CART_TOKEN).await? {
        return Ok(CartOwner::Session(token));
    }

    let token = Uuid::new_v4();
    session.insert(session_keys::CART_TOKEN, token).await?;
    Ok(CartOwner::Session(token))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use tienda_core::{Email, UserId};
    use tower_sessions::MemoryStore;

    use super::*;

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    fn user() -> CurrentUser {
        CurrentUser {
            id: UserId::new(7),
            username: "csoto".to_string(),
            email: Email::parse("csoto@correo.cl").unwrap(),
        }
    }

    #[tokio::test]
    async fn test_guest_token_is_stable() {
        let session = session();

        let first = cart_owner(&session, None).await.unwrap();
        let second = cart_owner(&session, None).await.unwrap();

        assert!(matches!(first, CartOwner::Session(_)));
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_user_owns_user_cart() {
        let session = session();
        let guest = cart_owner(&session, None).await.unwrap();
        let user = user();

        let owner = cart_owner(&session, Some(&user)).await.unwrap();

        assert_eq!(owner, CartOwner::User(UserId::new(7)));
        assert_ne!(owner, guest);
    }

    #[tokio::test]
    async fn test_logout_clears_user_and_cart_token() {
        let session = session();
        set_current_user(&session, &user()).await.unwrap();
        cart_owner(&session, None).await.unwrap();

        clear_current_user(&session).await.unwrap();

        assert!(current_user(&session).await.is_none());
        assert!(
            session
                .get::<Uuid>(session_keys::CART_TOKEN)
                .await
                .unwrap()
                .is_none()
        );
    }
}
