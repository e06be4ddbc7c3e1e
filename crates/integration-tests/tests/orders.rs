//! Checkout, order history, cancellation and reviews.

use reqwest::{Client, StatusCode};

use tienda_integration_tests::{TestApp, client, id_after, location};
use tienda_storefront::db::ReviewStore;
use tienda_storefront::services::ReviewService;

const NEW_ADDRESS: [(&str, &str); 6] = [
    ("full_name", "Camila Soto"),
    ("phone", "+56 9 8765 4321"),
    ("street", "Av. Brasil 123"),
    ("comuna", "Valparaíso"),
    ("region", "valparaiso"),
    ("postal_code", "2340000"),
];

/// Check out with a typed-in address; returns the new order's id.
async fn checkout(app: &TestApp, client: &Client, save_address: bool) -> i32 {
    let mut form: Vec<(&str, &str)> = NEW_ADDRESS.to_vec();
    form.push(("address_id", ""));
    form.push(("payment_method", "webpay"));
    form.push(("notes", "Dejar en conserjería"));
    if save_address {
        form.push(("save_address", "on"));
    }

    let resp = client
        .post(app.url("/checkout"))
        .form(&form)
        .send()
        .await
        .unwrap();

    assert!(resp.status().is_redirection());
    let target = location(&resp);
    assert!(target.contains("/confirmation?success="), "{target}");
    id_after(&target, "/orders/").unwrap()
}

/// Save an address from the address book form.
async fn add_address(app: &TestApp, client: &Client, street: &str, default: bool) {
    let mut form: Vec<(&str, &str)> = NEW_ADDRESS.to_vec();
    form.retain(|(name, _)| *name != "street");
    form.push(("street", street));
    if default {
        form.push(("is_default", "on"));
    }
    let resp = client
        .post(app.url("/addresses/new"))
        .form(&form)
        .send()
        .await
        .unwrap();
    assert!(location(&resp).starts_with("/addresses?success="));
}

#[tokio::test]
async fn test_checkout_preselects_default_address() {
    let app = TestApp::spawn().await;
    let client = client();
    let vela = app.product("Vela de soya", 10_000, 5).await;
    app.register(&client, "camila").await;
    add_address(&app, &client, "Av. Brasil 123", true).await;
    add_address(&app, &client, "Cumming 45", false).await;
    app.add_to_cart(&client, &vela).await;

    // The default is listed first.
    let addresses = client
        .get(app.url("/addresses"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    let ids: Vec<i32> = addresses
        .split("href=\"/addresses/")
        .skip(1)
        .filter_map(|rest| rest.split('/').next()?.parse().ok())
        .collect();
    assert_eq!(ids.len(), 2);

    let resp = client.get(app.url("/checkout")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.text().await.unwrap();

    assert!(body.contains(&format!("value=\"{}\" checked", ids[0])), "{body}");
    assert!(!body.contains(&format!("value=\"{}\" checked", ids[1])));
    assert!(!body.contains("value=\"\" checked"));
}

#[tokio::test]
async fn test_checkout_requires_login() {
    let app = TestApp::spawn().await;

    let resp = client().get(app.url("/checkout")).send().await.unwrap();

    assert!(resp.status().is_redirection());
    assert_eq!(location(&resp), "/auth/login?next=%2Fcheckout");
}

#[tokio::test]
async fn test_empty_cart_goes_back_to_cart() {
    let app = TestApp::spawn().await;
    let client = client();
    app.register(&client, "camila").await;

    let resp = client.get(app.url("/checkout")).send().await.unwrap();

    assert!(resp.status().is_redirection());
    assert!(location(&resp).starts_with("/cart?error="));
}

#[tokio::test]
async fn test_checkout_places_order_and_takes_stock() {
    let app = TestApp::spawn().await;
    let vela = app.product("Vela lavanda", 8_990, 5).await;
    let client = client();
    app.register(&client, "camila").await;
    app.add_to_cart(&client, &vela).await;
    app.add_to_cart(&client, &vela).await;

    let page = client
        .get(app.url("/checkout"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(page.contains("Finalizar compra"));
    assert!(page.contains("$22.980"));

    let order_id = checkout(&app, &client, true).await;

    assert_eq!(app.stock(&vela).await, 3);

    let confirmation = client
        .get(app.url(&format!("/orders/{order_id}/confirmation")))
        .send()
        .await
        .unwrap();
    assert_eq!(confirmation.status(), StatusCode::OK);
    let body = confirmation.text().await.unwrap();
    assert!(body.contains("#VGL"));
    assert!(body.contains("$17.980"));
    assert!(body.contains("$5.000"));
    assert!(body.contains("$22.980"));
    assert!(body.contains("Av. Brasil 123"));

    // The cart was emptied and the address saved.
    let cart = client
        .get(app.url("/cart"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(cart.contains("Tu carrito está vacío."));
    let addresses = client
        .get(app.url("/addresses"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(addresses.contains("Av. Brasil 123"));

    let history = client
        .get(app.url("/orders"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(history.contains(&format!("/orders/{order_id}")));
    assert!(history.contains("Pendiente de pago"));
}

#[tokio::test]
async fn test_free_shipping_from_threshold() {
    let app = TestApp::spawn().await;
    let set = app.product("Set de regalo", 50_000, 2).await;
    let client = client();
    app.register(&client, "camila").await;
    app.add_to_cart(&client, &set).await;

    let order_id = checkout(&app, &client, false).await;

    let body = client
        .get(app.url(&format!("/orders/{order_id}")))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(body.contains("Gratis"));
    assert!(body.contains("$50.000"));
}

#[tokio::test]
async fn test_bad_address_keeps_the_cart() {
    let app = TestApp::spawn().await;
    let vela = app.product("Vela lavanda", 8_990, 5).await;
    let client = client();
    app.register(&client, "camila").await;
    app.add_to_cart(&client, &vela).await;

    let resp = client
        .post(app.url("/checkout"))
        .form(&[
            ("address_id", ""),
            ("full_name", "Camila Soto"),
            ("region", "atlantida"),
            ("payment_method", "webpay"),
        ])
        .send()
        .await
        .unwrap();

    assert!(resp.status().is_redirection());
    assert!(location(&resp).starts_with("/checkout?error="));
    assert_eq!(app.stock(&vela).await, 5);
}

#[tokio::test]
async fn test_cancel_restores_stock_once() {
    let app = TestApp::spawn().await;
    let vela = app.product("Vela lavanda", 8_990, 5).await;
    let client = client();
    app.register(&client, "camila").await;
    app.add_to_cart(&client, &vela).await;
    app.add_to_cart(&client, &vela).await;
    let order_id = checkout(&app, &client, false).await;
    assert_eq!(app.stock(&vela).await, 3);

    let resp = client
        .post(app.url(&format!("/orders/{order_id}/cancel")))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_redirection());
    assert!(location(&resp).starts_with(&format!("/orders/{order_id}?success=")));
    assert_eq!(app.stock(&vela).await, 5);

    let resp = client
        .post(app.url(&format!("/orders/{order_id}/cancel")))
        .send()
        .await
        .unwrap();
    assert!(location(&resp).starts_with(&format!("/orders/{order_id}?error=")));
    assert_eq!(app.stock(&vela).await, 5);

    let body = client
        .get(app.url(&format!("/orders/{order_id}")))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(body.contains("Cancelado"));
    assert!(!body.contains("Cancelar pedido"));
}

#[tokio::test]
async fn test_orders_are_private() {
    let app = TestApp::spawn().await;
    let vela = app.product("Vela lavanda", 8_990, 5).await;
    let owner = client();
    app.register(&owner, "camila").await;
    app.add_to_cart(&owner, &vela).await;
    let order_id = checkout(&app, &owner, false).await;

    let other = client();
    app.register(&other, "javiera").await;

    let resp = other
        .get(app.url(&format!("/orders/{order_id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = other
        .post(app.url(&format!("/orders/{order_id}/cancel")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.stock(&vela).await, 4);
}

#[tokio::test]
async fn test_reviews_show_after_approval() {
    let app = TestApp::spawn().await;
    let vela = app.product("Vela lavanda", 8_990, 5).await;
    let client = client();
    app.register(&client, "camila").await;
    let path = format!("/products/{}", vela.id);

    let resp = client
        .post(app.url(&format!("{path}/reviews")))
        .form(&[("calificacion", "5"), ("comentario", "Huele increíble")])
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_redirection());
    assert!(location(&resp).contains("success="));

    let page = client.get(app.url(&path)).send().await.unwrap().text().await.unwrap();
    assert!(!page.contains("Huele increíble"));

    let pending = app.store.pending_reviews().await.unwrap();
    assert_eq!(pending.len(), 1);
    ReviewService::new(app.store.as_ref())
        .approve(pending[0].id, true)
        .await
        .unwrap();

    let page = client.get(app.url(&path)).send().await.unwrap().text().await.unwrap();
    assert!(page.contains("Huele increíble"));

    // One review per customer and product.
    let resp = client
        .post(app.url(&format!("{path}/reviews")))
        .form(&[("calificacion", "3"), ("comentario", "Otra vez")])
        .send()
        .await
        .unwrap();
    assert!(location(&resp).contains("error="));
}
