//! Cart endpoints as driven by the cart script and by plain forms.

use reqwest::StatusCode;
use serde_json::Value;

use tienda_integration_tests::{TestApp, cart_line_ids, client, location};

#[tokio::test]
async fn test_guest_can_fill_a_cart() {
    let app = TestApp::spawn().await;
    let vela = app.product("Vela lavanda", 8_990, 10).await;
    let client = client();

    let first = app.add_to_cart(&client, &vela).await;
    assert_eq!(first["success"], true);
    assert_eq!(first["message"], "Vela lavanda agregado al carrito.");
    assert_eq!(first["total_items"], 1);

    let second = app.add_to_cart(&client, &vela).await;
    assert_eq!(second["total_items"], 2);
    assert_eq!(second["subtotal"], 17_980);
    assert_eq!(second["total"], 17_980);

    let count: Value = client
        .get(app.url("/cart/count"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(count["total_items"], 2);
}

#[tokio::test]
async fn test_carts_are_per_session() {
    let app = TestApp::spawn().await;
    let vela = app.product("Vela lavanda", 8_990, 10).await;

    app.add_to_cart(&client(), &vela).await;

    let count: Value = client()
        .get(app.url("/cart/count"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(count["total_items"], 0);
}

#[tokio::test]
async fn test_form_post_without_script_redirects() {
    let app = TestApp::spawn().await;
    let vela = app.product("Vela lavanda", 8_990, 10).await;

    let resp = client()
        .post(app.url(&format!("/cart/add/{}", vela.id)))
        .send()
        .await
        .unwrap();

    assert!(resp.status().is_redirection());
    assert!(location(&resp).starts_with("/products?success="));
}

#[tokio::test]
async fn test_out_of_stock_product_is_refused() {
    let app = TestApp::spawn().await;
    let agotada = app.product("Vela agotada", 8_990, 0).await;

    let resp = client()
        .post(app.url(&format!("/cart/add/{}", agotada.id)))
        .header("X-Requested-With", "XMLHttpRequest")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Producto agotado.");
}

#[tokio::test]
async fn test_update_and_remove_lines() {
    let app = TestApp::spawn().await;
    let vela = app.product("Vela lavanda", 8_990, 3).await;
    let jabon = app.product("Jabón de avena", 4_500, 10).await;
    let client = client();
    app.add_to_cart(&client, &vela).await;
    app.add_to_cart(&client, &jabon).await;

    let page = client
        .get(app.url("/cart"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    let lines = cart_line_ids(&page);
    assert_eq!(lines.len(), 2);

    let resp = client
        .post(app.url(&format!("/cart/update/{}", lines[0])))
        .header("X-Requested-With", "XMLHttpRequest")
        .form(&[("cantidad", "3")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["subtotal"], 26_970);
    assert_eq!(body["total"], 31_470);
    assert_eq!(body["total_items"], 4);

    // More than the stock is refused and leaves the line alone.
    let resp = client
        .post(app.url(&format!("/cart/update/{}", lines[0])))
        .form(&[("cantidad", "4")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Solo hay 3 unidades disponibles en stock.");

    let resp = client
        .post(app.url(&format!("/cart/update/{}", lines[0])))
        .form(&[("cantidad", "muchas")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = client
        .post(app.url(&format!("/cart/remove/{}", lines[1])))
        .header("X-Requested-With", "XMLHttpRequest")
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["total_items"], 3);
    assert_eq!(body["total"], 26_970);
}

#[tokio::test]
async fn test_lines_of_another_cart_are_off_limits() {
    let app = TestApp::spawn().await;
    let vela = app.product("Vela lavanda", 8_990, 10).await;
    let owner = client();
    app.add_to_cart(&owner, &vela).await;
    let page = owner
        .get(app.url("/cart"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    let line = cart_line_ids(&page)[0];

    let resp = client()
        .post(app.url(&format!("/cart/remove/{line}")))
        .header("X-Requested-With", "XMLHttpRequest")
        .send()
        .await
        .unwrap();

    assert!(resp.status().is_client_error());
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_empty_cart() {
    let app = TestApp::spawn().await;
    let vela = app.product("Vela lavanda", 8_990, 10).await;
    let client = client();
    app.add_to_cart(&client, &vela).await;

    let resp = client.post(app.url("/cart/empty")).send().await.unwrap();
    assert!(resp.status().is_redirection());

    let page = client
        .get(app.url("/cart"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(cart_line_ids(&page).is_empty());
    assert!(page.contains("Tu carrito está vacío."));
}
