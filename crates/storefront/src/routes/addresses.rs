//! Address book route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use tienda_core::{AddressId, Region};

use crate::error::AppError;
use crate::filters;
use crate::middleware::RequireAuth;
use crate::models::{Address, AddressInput, CurrentUser};
use crate::routes::{Layout, MessageQuery, redirect_error, redirect_success};
use crate::services::{AddressBook, AddressError};
use crate::state::AppState;

/// Address form data.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddressForm {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub street: Option<String>,
    pub reference: Option<String>,
    pub comuna: Option<String>,
    pub region: Option<String>,
    pub postal_code: Option<String>,
    /// Checkbox; present when ticked.
    pub is_default: Option<String>,
}

impl AddressForm {
    fn input(&self) -> AddressInput {
        AddressInput {
            full_name: self.full_name.clone(),
            phone: self.phone.clone(),
            street: self.street.clone(),
            reference: self.reference.clone(),
            comuna: self.comuna.clone(),
            region: self.region.clone(),
            postal_code: self.postal_code.clone(),
            country: None,
        }
    }

    const fn wants_default(&self) -> bool {
        self.is_default.is_some()
    }
}

/// Field values for re-displaying the form.
#[derive(Debug, Clone, Default)]
pub struct AddressFormValues {
    pub full_name: String,
    pub phone: String,
    pub street: String,
    pub reference: String,
    pub comuna: String,
    /// Region code.
    pub region: String,
    pub postal_code: String,
    pub is_default: bool,
}

impl From<&AddressForm> for AddressFormValues {
    fn from(form: &AddressForm) -> Self {
        let text = |v: &Option<String>| v.clone().unwrap_or_default();
        Self {
            full_name: text(&form.full_name),
            phone: text(&form.phone),
            street: text(&form.street),
            reference: text(&form.reference),
            comuna: text(&form.comuna),
            region: text(&form.region),
            postal_code: text(&form.postal_code),
            is_default: form.wants_default(),
        }
    }
}

impl From<&Address> for AddressFormValues {
    fn from(address: &Address) -> Self {
        let fields = &address.fields;
        Self {
            full_name: fields.full_name.clone(),
            phone: fields.phone.clone(),
            street: fields.street.clone(),
            reference: fields.reference.clone().unwrap_or_default(),
            comuna: fields.comuna.clone(),
            region: fields.region.code().to_owned(),
            postal_code: fields.postal_code.clone().unwrap_or_default(),
            is_default: address.is_default,
        }
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "addresses/index.html")]
pub struct AddressesIndexTemplate {
    pub layout: Layout,
    pub addresses: Vec<Address>,
}

#[derive(Template, WebTemplate)]
#[template(path = "addresses/form.html")]
pub struct AddressFormTemplate {
    pub layout: Layout,
    /// "Agregar" or "Editar".
    pub heading: &'static str,
    pub action: String,
    pub values: AddressFormValues,
    pub regions: [Region; 16],
}

impl AddressFormTemplate {
    fn new(layout: Layout, id: Option<AddressId>, values: AddressFormValues) -> Self {
        let (heading, action) = match id {
            Some(id) => ("Editar", format!("/addresses/{id}/edit")),
            None => ("Agregar", "/addresses/new".to_owned()),
        };
        Self {
            layout,
            heading,
            action,
            values,
            regions: Region::ALL,
        }
    }
}

/// Save the form; a validation problem re-renders it with the customer's input.
async fn save(
    state: &AppState,
    session: &Session,
    user: CurrentUser,
    id: Option<AddressId>,
    form: &AddressForm,
) -> Result<Response, AppError> {
    let result = AddressBook::new(state.store())
        .save(user.id, id, &form.input(), form.wants_default())
        .await;

    match result {
        Ok(_) => {
            let message = if id.is_some() {
                "Dirección actualizada exitosamente"
            } else {
                "Dirección agregada exitosamente"
            };
            Ok(redirect_success("/addresses", message).into_response())
        }
        Err(AddressError::Validation(err)) => {
            let messages = MessageQuery {
                error: Some(err.message),
                success: None,
            };
            let layout = Layout::load(state, session, Some(user), messages).await?;
            Ok(AddressFormTemplate::new(layout, id, AddressFormValues::from(form)).into_response())
        }
        Err(err) => Err(err.into()),
    }
}

/// The customer's saved addresses, default first.
#[instrument(skip(state, session, query), fields(user_id = %user.id))]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Query(query): Query<MessageQuery>,
) -> Result<AddressesIndexTemplate, AppError> {
    let addresses = AddressBook::new(state.store()).list(user.id).await?;
    let layout = Layout::load(&state, &session, Some(user), query).await?;
    Ok(AddressesIndexTemplate { layout, addresses })
}

#[instrument(skip(state, session), fields(user_id = %user.id))]
pub async fn new_page(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
) -> Result<AddressFormTemplate, AppError> {
    let layout = Layout::load(&state, &session, Some(user), MessageQuery::default()).await?;
    Ok(AddressFormTemplate::new(
        layout,
        None,
        AddressFormValues::default(),
    ))
}

#[instrument(skip(state, session, form), fields(user_id = %user.id))]
pub async fn create(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Form(form): Form<AddressForm>,
) -> Result<Response, AppError> {
    save(&state, &session, user, None, &form).await
}

#[instrument(skip(state, session), fields(user_id = %user.id))]
pub async fn edit_page(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i32>,
) -> Result<AddressFormTemplate, AppError> {
    let id = AddressId::new(id);
    let address = AddressBook::new(state.store()).get(user.id, id).await?;
    let layout = Layout::load(&state, &session, Some(user), MessageQuery::default()).await?;
    Ok(AddressFormTemplate::new(
        layout,
        Some(id),
        AddressFormValues::from(&address),
    ))
}

#[instrument(skip(state, session, form), fields(user_id = %user.id))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i32>,
    Form(form): Form<AddressForm>,
) -> Result<Response, AppError> {
    save(&state, &session, user, Some(AddressId::new(id)), &form).await
}

#[instrument(skip(state), fields(user_id = %user.id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i32>,
) -> Result<Response, AppError> {
    match AddressBook::new(state.store())
        .delete(user.id, AddressId::new(id))
        .await
    {
        Ok(()) => Ok(redirect_success("/addresses", "Dirección eliminada exitosamente").into_response()),
        Err(AddressError::NotFound) => {
            Ok(redirect_error("/addresses", "Dirección no encontrada.").into_response())
        }
        Err(err) => Err(err.into()),
    }
}

#[instrument(skip(state), fields(user_id = %user.id))]
pub async fn set_default(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i32>,
) -> Result<Response, AppError> {
    match AddressBook::new(state.store())
        .set_default(user.id, AddressId::new(id))
        .await
    {
        Ok(()) => Ok(
            redirect_success("/addresses", "Dirección predeterminada actualizada").into_response(),
        ),
        Err(AddressError::NotFound) => {
            Ok(redirect_error("/addresses", "Dirección no encontrada.").into_response())
        }
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_values_keep_customer_input() {
        let form = AddressForm {
            full_name: Some("Camila Soto".to_owned()),
            region: Some("valparaiso".to_owned()),
            is_default: Some("on".to_owned()),
            ..AddressForm::default()
        };

        let values = AddressFormValues::from(&form);

        assert_eq!(values.full_name, "Camila Soto");
        assert_eq!(values.region, "valparaiso");
        assert_eq!(values.street, "");
        assert!(values.is_default);
    }
}
