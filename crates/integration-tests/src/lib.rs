//! Integration tests for Tienda.
//!
//! Each test spawns the full storefront router in-process on an ephemeral
//! port, backed by `MemoryStore` and an in-memory session store, and talks
//! to it over HTTP with a cookie-holding `reqwest` client. No database or
//! external service is needed:
//!
//! ```bash
//! cargo test -p tienda-integration-tests
//! ```
//!
//! Clients never follow redirects so tests can assert on `Location`.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use reqwest::header::LOCATION;
use reqwest::redirect::Policy;
use reqwest::{Client, Response};
use secrecy::SecretString;
use tokio::net::TcpListener;

use tienda_core::{Money, ShippingPolicy};
use tienda_storefront::app::build_app;
use tienda_storefront::config::{SentryConfig, StorefrontConfig};
use tienda_storefront::db::{MemoryStore, ProductStore};
use tienda_storefront::middleware::create_session_layer;
use tienda_storefront::models::{NewProduct, Product};
use tienda_storefront::state::AppState;

/// Password used for every account created by tests.
pub const PASSWORD: &str = "clave-segura-123";

/// A running storefront and direct access to its store.
pub struct TestApp {
    pub address: SocketAddr,
    pub store: Arc<MemoryStore>,
}

impl TestApp {
    /// Start a storefront on `127.0.0.1:0`.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    pub async fn spawn() -> Self {
        let store = Arc::new(MemoryStore::new());
        let config = test_config();
        let session_layer =
            create_session_layer(tower_sessions::MemoryStore::default(), &config);
        let state = AppState::new(config, store.clone());
        let app = build_app(state, session_layer);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let address = listener.local_addr().expect("Listener has no address");

        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .expect("Test server failed");
        });

        Self { address, store }
    }

    /// Absolute URL for `path`.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.address)
    }

    /// Put a product straight into the catalog.
    ///
    /// # Panics
    ///
    /// Panics if the store rejects the product.
    pub async fn product(&self, name: &str, price: i64, stock: u32) -> Product {
        self.store
            .create_product(&NewProduct {
                name: name.to_owned(),
                category: "Velas".to_owned(),
                description: format!("{name} artesanal"),
                price: Money::new(price),
                stock,
                image: None,
                active: true,
            })
            .await
            .expect("Failed to create product")
    }

    /// Current stock of a product.
    ///
    /// # Panics
    ///
    /// Panics if the product is gone.
    pub async fn stock(&self, product: &Product) -> u32 {
        self.store
            .product(product.id)
            .await
            .expect("Store failed")
            .expect("Product missing")
            .stock
    }

    /// Register `username` through the form; the client ends up logged in.
    ///
    /// # Panics
    ///
    /// Panics if the request fails.
    pub async fn register(&self, client: &Client, username: &str) -> Response {
        let email = format!("{username}@correo.cl");
        client
            .post(self.url("/auth/register"))
            .form(&[
                ("username", username),
                ("first_name", "Camila"),
                ("last_name", "Soto"),
                ("email", email.as_str()),
                ("password", PASSWORD),
                ("password_confirm", PASSWORD),
            ])
            .send()
            .await
            .expect("Failed to register")
    }

    /// Add one unit of `product` to the client's cart as the cart script does.
    ///
    /// # Panics
    ///
    /// Panics if the request fails or the body is not JSON.
    pub async fn add_to_cart(&self, client: &Client, product: &Product) -> serde_json::Value {
        client
            .post(self.url(&format!("/cart/add/{}", product.id)))
            .header("X-Requested-With", "XMLHttpRequest")
            .send()
            .await
            .expect("Failed to add to cart")
            .json()
            .await
            .expect("Cart response was not JSON")
    }
}

/// Client with a cookie jar that never follows redirects.
///
/// # Panics
///
/// Panics if the client cannot be built.
#[must_use]
pub fn client() -> Client {
    Client::builder()
        .cookie_store(true)
        .redirect(Policy::none())
        .build()
        .expect("Failed to create HTTP client")
}

/// The `Location` header of a redirect, or `""`.
#[must_use]
pub fn location(response: &Response) -> String {
    response
        .headers()
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_owned()
}

/// Cart line ids rendered on the cart page, in page order.
#[must_use]
pub fn cart_line_ids(html: &str) -> Vec<i32> {
    html.split("data-line=\"")
        .skip(1)
        .filter_map(|rest| rest.split('"').next()?.parse().ok())
        .collect()
}

/// Numeric id from a path like `/orders/7/confirmation?success=...`.
#[must_use]
pub fn id_after(path: &str, prefix: &str) -> Option<i32> {
    path.strip_prefix(prefix)?
        .split(['/', '?'])
        .next()?
        .parse()
        .ok()
}

fn test_config() -> StorefrontConfig {
    StorefrontConfig {
        database_url: SecretString::from("postgres://unused@localhost/tienda"),
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 0,
        base_url: "http://127.0.0.1".to_owned(),
        session_secret: SecretString::from("integration-tests-session-secret-0123456789"),
        shipping: ShippingPolicy::default(),
        rate_limit: false,
        sentry: SentryConfig::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cart_line_ids_reads_rows() {
        let html = r#"<tr data-line="4"></tr><tr data-line="11"></tr>"#;
        assert_eq!(cart_line_ids(html), vec![4, 11]);
    }

    #[test]
    fn test_id_after_prefix() {
        assert_eq!(id_after("/orders/7/confirmation?success=x", "/orders/"), Some(7));
        assert_eq!(id_after("/cart?error=x", "/orders/"), None);
    }
}
