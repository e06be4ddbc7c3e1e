//! Account route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use chrono::NaiveDate;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{AppError, set_sentry_user};
use crate::filters;
use crate::middleware::{RequireAuth, set_current_user};
use crate::models::{CurrentUser, Profile, ProfileFields, User};
use crate::routes::{Layout, MessageQuery, redirect_error, redirect_success};
use crate::services::{ProfileService, ProfileUpdate};
use crate::state::AppState;

/// Profile form data.
#[derive(Debug, Default, Deserialize)]
pub struct ProfileForm {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    /// `YYYY-MM-DD` from a date input; blank clears it.
    #[serde(default)]
    pub birth_date: String,
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub country: String,
    /// Checkboxes; present when ticked.
    pub newsletter: Option<String>,
    pub notifications: Option<String>,
}

impl ProfileForm {
    /// # Errors
    ///
    /// Returns a customer-facing message when the birth date is not a date.
    pub fn into_update(self) -> Result<ProfileUpdate, String> {
        let birth_date = match self.birth_date.trim() {
            "" => None,
            date => Some(
                NaiveDate::parse_from_str(date, "%Y-%m-%d")
                    .map_err(|_| "Fecha de nacimiento inválida.".to_owned())?,
            ),
        };

        Ok(ProfileUpdate {
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            fields: ProfileFields {
                phone: self.phone,
                birth_date,
                street: self.street,
                city: self.city,
                state: self.state,
                postal_code: self.postal_code,
                country: self.country,
                newsletter: self.newsletter.is_some(),
                notifications: self.notifications.is_some(),
            },
        })
    }
}

/// Profile page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/profile.html")]
pub struct ProfileTemplate {
    pub layout: Layout,
    pub account: User,
    pub profile: Profile,
}

impl ProfileTemplate {
    /// Birth date as a date input value.
    #[must_use]
    pub fn birth_date_value(&self) -> String {
        self.profile
            .fields
            .birth_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default()
    }
}

/// Display the profile form, creating the profile if it went missing.
#[instrument(skip(state, session, query), fields(user_id = %user.id))]
pub async fn profile_page(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Query(query): Query<MessageQuery>,
) -> Result<ProfileTemplate, AppError> {
    let (account, profile) = ProfileService::new(state.store())
        .get_or_create(user.id)
        .await?;
    let layout = Layout::load(&state, &session, Some(user), query).await?;

    Ok(ProfileTemplate {
        layout,
        account,
        profile,
    })
}

/// Handle profile form submission.
#[instrument(skip(state, session, form), fields(user_id = %user.id))]
pub async fn update_profile(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Form(form): Form<ProfileForm>,
) -> Result<Response, AppError> {
    let update = match form.into_update() {
        Ok(update) => update,
        Err(message) => return Ok(redirect_error("/account/profile", &message).into_response()),
    };

    match ProfileService::new(state.store())
        .update(user.id, &update)
        .await
    {
        Ok((account, _)) => {
            // The session copy carries the email shown in the header.
            let current = CurrentUser::from(&account);
            set_current_user(&session, &current).await?;
            set_sentry_user(&current.id, Some(current.email.as_str()));
            Ok(redirect_success("/account/profile", "Perfil actualizado exitosamente.")
                .into_response())
        }
        Err(err) => match err.customer_message() {
            Some(message) => Ok(redirect_error("/account/profile", &message).into_response()),
            None => Err(err.into()),
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_checkboxes_and_birth_date() {
        let update = ProfileForm {
            email: "csoto@correo.cl".to_owned(),
            birth_date: "1990-04-12".to_owned(),
            newsletter: Some("on".to_owned()),
            ..ProfileForm::default()
        }
        .into_update()
        .unwrap();

        assert_eq!(
            update.fields.birth_date,
            NaiveDate::from_ymd_opt(1990, 4, 12)
        );
        assert!(update.fields.newsletter);
        assert!(!update.fields.notifications);
    }

    #[test]
    fn test_bad_birth_date_is_reported() {
        let err = ProfileForm {
            birth_date: "12/04/1990".to_owned(),
            ..ProfileForm::default()
        }
        .into_update()
        .unwrap_err();

        assert_eq!(err, "Fecha de nacimiento inválida.");
    }
}
