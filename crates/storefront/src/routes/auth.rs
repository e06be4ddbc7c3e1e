//! Authentication route handlers.
//!
//! Handles login, registration and logout against the local user table.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{AppError, clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::{OptionalAuth, clear_current_user, set_current_user};
use crate::models::CurrentUser;
use crate::routes::{Layout, MessageQuery, redirect_error, redirect_success, safe_next};
use crate::services::{AuthError, AuthService, Registration};
use crate::state::AppState;

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Deserialize)]
pub struct LoginForm {
    /// Username or email.
    pub login: String,
    pub password: String,
    pub next: Option<String>,
}

// =============================================================================
// Query Types
// =============================================================================

/// Query parameters for the login page.
#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    pub next: Option<String>,
    pub error: Option<String>,
    pub success: Option<String>,
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub layout: Layout,
    pub next: String,
}

/// Register page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub layout: Layout,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

// =============================================================================
// Login Routes
// =============================================================================

/// Display the login page.
#[instrument(skip(state, session, query))]
pub async fn login_page(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Query(query): Query<LoginQuery>,
) -> Result<Response, AppError> {
    let next = safe_next(query.next.as_deref());
    if user.is_some() {
        return Ok(Redirect::to(&next).into_response());
    }

    let messages = MessageQuery {
        error: query.error,
        success: query.success,
    };
    let layout = Layout::load(&state, &session, None, messages).await?;
    Ok(LoginTemplate { layout, next }.into_response())
}

/// Handle login form submission.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let next = safe_next(form.next.as_deref());

    match AuthService::new(state.store())
        .login(&form.login, &form.password)
        .await
    {
        Ok(user) => {
            let current = CurrentUser::from(&user);
            set_current_user(&session, &current).await?;
            set_sentry_user(&current.id, Some(current.email.as_str()));
            tracing::info!(user_id = %current.id, "User logged in");
            Ok(Redirect::to(&next).into_response())
        }
        Err(AuthError::InvalidCredentials) => {
            tracing::warn!("Login failed");
            let back = format!("/auth/login?next={}", urlencoding::encode(&next));
            Ok(redirect_error(&back, "Usuario o contraseña incorrectos.").into_response())
        }
        Err(err) => Err(err.into()),
    }
}

// =============================================================================
// Registration Routes
// =============================================================================

/// Display the registration page.
#[instrument(skip(state, session, query))]
pub async fn register_page(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Query(query): Query<MessageQuery>,
) -> Result<Response, AppError> {
    if user.is_some() {
        return Ok(Redirect::to("/").into_response());
    }

    let layout = Layout::load(&state, &session, None, query).await?;
    Ok(RegisterTemplate {
        layout,
        username: String::new(),
        first_name: String::new(),
        last_name: String::new(),
        email: String::new(),
    }
    .into_response())
}

/// Handle registration form submission.
///
/// Creates the account and its profile, then logs the new customer in.
/// Problems with the form re-render it with what was typed, minus passwords.
#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<Registration>,
) -> Result<Response, AppError> {
    let user = match AuthService::new(state.store()).register(&form).await {
        Ok(user) => user,
        Err(err) => {
            let Some(message) = err.customer_message() else {
                return Err(err.into());
            };
            tracing::warn!(error = %err, "Registration rejected");
            let messages = MessageQuery {
                error: Some(message),
                success: None,
            };
            let layout = Layout::load(&state, &session, None, messages).await?;
            return Ok(RegisterTemplate {
                layout,
                username: form.username,
                first_name: form.first_name,
                last_name: form.last_name,
                email: form.email,
            }
            .into_response());
        }
    };

    let current = CurrentUser::from(&user);
    set_current_user(&session, &current).await?;
    set_sentry_user(&current.id, Some(current.email.as_str()));
    tracing::info!(user_id = %current.id, "User registered");

    Ok(redirect_success(
        "/",
        &format!("¡Bienvenido {}! Tu cuenta ha sido creada exitosamente.", user.username),
    )
    .into_response())
}

// =============================================================================
// Logout
// =============================================================================

/// Log out and forget the session, guest cart token included.
#[instrument(skip_all)]
pub async fn logout(session: Session) -> Result<Response, AppError> {
    clear_current_user(&session).await?;
    clear_sentry_user();
    Ok(redirect_success("/", "Has cerrado sesión exitosamente.").into_response())
}
