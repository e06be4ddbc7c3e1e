//! Checkout route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use tienda_core::{AddressId, PaymentMethod, Region};

use crate::error::{AppError, add_breadcrumb};
use crate::filters;
use crate::middleware::RequireAuth;
use crate::models::{AddressInput, CartOwner, ValidationError};
use crate::routes::{Layout, MessageQuery, redirect_error, redirect_success};
use crate::services::{
    CartService, CheckoutError, CheckoutPreview, CheckoutRequest, CheckoutService, ShipTo,
};
use crate::state::AppState;

/// Checkout form data.
///
/// A non-blank `address_id` ships to that saved address and the address
/// fields are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct CheckoutForm {
    pub address_id: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub street: Option<String>,
    pub reference: Option<String>,
    pub comuna: Option<String>,
    pub region: Option<String>,
    pub postal_code: Option<String>,
    /// Checkbox; present when ticked.
    pub save_address: Option<String>,
    #[serde(default)]
    pub payment_method: String,
    #[serde(default)]
    pub notes: String,
}

impl CheckoutForm {
    /// Turn the raw form into a checkout request.
    ///
    /// # Errors
    ///
    /// - `CheckoutError::AddressNotFound` for a malformed saved-address id
    /// - `CheckoutError::Validation` for an unknown payment method
    pub fn into_request(self) -> Result<CheckoutRequest, CheckoutError> {
        let payment_method = self
            .payment_method
            .parse::<PaymentMethod>()
            .map_err(|_| {
                ValidationError::new("payment_method", "Selecciona un método de pago válido")
            })?;

        let saved = self
            .address_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty());

        let ship_to = match saved {
            Some(id) => ShipTo::Saved(
                id.parse::<AddressId>()
                    .map_err(|_| CheckoutError::AddressNotFound)?,
            ),
            None => ShipTo::New {
                input: AddressInput {
                    full_name: self.full_name,
                    phone: self.phone,
                    street: self.street,
                    reference: self.reference,
                    comuna: self.comuna,
                    region: self.region,
                    postal_code: self.postal_code,
                    country: None,
                },
                save: self.save_address.is_some(),
            },
        };

        Ok(CheckoutRequest {
            ship_to,
            payment_method,
            notes: self.notes,
        })
    }
}

/// Checkout page template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/show.html")]
pub struct CheckoutTemplate {
    pub layout: Layout,
    pub preview: CheckoutPreview,
    pub regions: [Region; 16],
    pub payment_methods: [PaymentMethod; 5],
}

impl CheckoutTemplate {
    /// Whether `id` is the saved address to pre-select.
    #[must_use]
    pub fn is_preselected(&self, id: &AddressId) -> bool {
        self.preview.default_address().is_some_and(|a| a.id == *id)
    }
}

/// Where a customer-facing checkout error sends the customer.
const fn error_destination(err: &CheckoutError) -> &'static str {
    match err {
        CheckoutError::EmptyCart | CheckoutError::InsufficientStock { .. } => "/cart",
        _ => "/checkout",
    }
}

/// Redirect for a checkout error the customer can fix, or the error itself.
fn checkout_failure(err: CheckoutError) -> Result<Response, AppError> {
    match err.customer_message() {
        Some(message) => Ok(redirect_error(error_destination(&err), &message).into_response()),
        None => Err(err.into()),
    }
}

/// Display the checkout page.
#[instrument(skip(state, session, query), fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Query(query): Query<MessageQuery>,
) -> Result<Response, AppError> {
    let cart = CartService::new(state.store())
        .resolve(&CartOwner::User(user.id))
        .await?;

    let preview = match CheckoutService::new(state.store(), state.shipping_policy())
        .preview(user.id, &cart)
        .await
    {
        Ok(preview) => preview,
        Err(err) => return checkout_failure(err),
    };

    let layout = Layout::load(&state, &session, Some(user), query).await?;

    Ok(CheckoutTemplate {
        layout,
        preview,
        regions: Region::ALL,
        payment_methods: PaymentMethod::ALL,
    }
    .into_response())
}

/// Place the order and show its confirmation.
#[instrument(skip(state, form), fields(user_id = %user.id))]
pub async fn place(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Form(form): Form<CheckoutForm>,
) -> Result<Response, AppError> {
    let request = match form.into_request() {
        Ok(request) => request,
        Err(err) => return checkout_failure(err),
    };

    let cart = CartService::new(state.store())
        .resolve(&CartOwner::User(user.id))
        .await?;

    let order = match CheckoutService::new(state.store(), state.shipping_policy())
        .place(user.id, &cart, request)
        .await
    {
        Ok(order) => order,
        Err(err) => return checkout_failure(err),
    };

    add_breadcrumb(
        "checkout",
        "Order placed",
        Some(&[("order_number", order.number.as_str())]),
    );

    Ok(redirect_success(
        &format!("/orders/{}/confirmation", order.id),
        &format!("¡Pedido #{} creado exitosamente!", order.number),
    )
    .into_response())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn form() -> CheckoutForm {
        CheckoutForm {
            full_name: Some("Camila Soto".to_owned()),
            street: Some("Av. Brasil 123".to_owned()),
            payment_method: "webpay".to_owned(),
            ..CheckoutForm::default()
        }
    }

    #[test]
    fn test_saved_address_wins_over_fields() {
        let request = CheckoutForm {
            address_id: Some("12".to_owned()),
            ..form()
        }
        .into_request()
        .unwrap();

        assert!(matches!(request.ship_to, ShipTo::Saved(id) if id == AddressId::new(12)));
        assert_eq!(request.payment_method, PaymentMethod::Webpay);
    }

    #[test]
    fn test_blank_address_id_uses_typed_address() {
        let request = CheckoutForm {
            address_id: Some(String::new()),
            save_address: Some("on".to_owned()),
            ..form()
        }
        .into_request()
        .unwrap();

        match request.ship_to {
            ShipTo::New { input, save } => {
                assert!(save);
                assert_eq!(input.street.as_deref(), Some("Av. Brasil 123"));
            }
            ShipTo::Saved(_) => panic!("expected a typed-in address"),
        }
    }

    #[test]
    fn test_unknown_payment_method_is_rejected() {
        let err = CheckoutForm {
            payment_method: "bitcoin".to_owned(),
            ..form()
        }
        .into_request()
        .unwrap_err();

        assert!(matches!(err, CheckoutError::Validation(_)));
    }

    #[test]
    fn test_stock_problems_send_customer_back_to_cart() {
        assert_eq!(error_destination(&CheckoutError::EmptyCart), "/cart");
        assert_eq!(error_destination(&CheckoutError::AddressNotFound), "/checkout");
    }
}
