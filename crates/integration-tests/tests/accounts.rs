//! Registration, login, profile and the address book.

use reqwest::{Client, StatusCode};

use tienda_integration_tests::{PASSWORD, TestApp, client, location};

async fn page(app: &TestApp, client: &Client, path: &str) -> String {
    client
        .get(app.url(path))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap()
}

/// Address ids in the order the address book lists them.
fn address_ids(html: &str) -> Vec<i32> {
    html.split("href=\"/addresses/")
        .skip(1)
        .filter_map(|rest| rest.split('/').next()?.parse().ok())
        .collect()
}

async fn add_address(app: &TestApp, client: &Client, street: &str, default: bool) {
    let mut form = vec![
        ("full_name", "Camila Soto"),
        ("phone", "+56 9 8765 4321"),
        ("street", street),
        ("comuna", "Providencia"),
        ("region", "metropolitana"),
    ];
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
async fn test_registration_logs_in_and_creates_profile() {
    let app = TestApp::spawn().await;
    let client = client();

    let resp = app.register(&client, "camila").await;
    assert!(resp.status().is_redirection());
    assert!(location(&resp).starts_with("/?success="));

    let resp = client.get(app.url("/account/profile")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.text().await.unwrap();
    assert!(body.contains("camila@correo.cl"));
    assert!(body.contains("value=\"Chile\""));
}

#[tokio::test]
async fn test_duplicate_username_is_reported_on_the_form() {
    let app = TestApp::spawn().await;
    app.register(&client(), "camila").await;

    let resp = app.register(&client(), "camila").await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.text().await.unwrap();
    assert!(body.contains("Ese nombre de usuario ya está en uso."));
    assert!(!body.contains(PASSWORD));
}

#[tokio::test]
async fn test_login_logout() {
    let app = TestApp::spawn().await;
    app.register(&client(), "camila").await;
    let client = client();

    let resp = client
        .post(app.url("/auth/login"))
        .form(&[("login", "camila"), ("password", "equivocada"), ("next", "/orders")])
        .send()
        .await
        .unwrap();
    assert!(location(&resp).starts_with("/auth/login?next=%2Forders&error="));

    // Email works as the login too, case-insensitively.
    let resp = client
        .post(app.url("/auth/login"))
        .form(&[("login", "CAMILA@correo.cl"), ("password", PASSWORD), ("next", "/orders")])
        .send()
        .await
        .unwrap();
    assert_eq!(location(&resp), "/orders");

    let resp = client.get(app.url("/orders")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    client.post(app.url("/auth/logout")).send().await.unwrap();
    let resp = client.get(app.url("/orders")).send().await.unwrap();
    assert!(resp.status().is_redirection());
    assert!(location(&resp).starts_with("/auth/login"));
}

#[tokio::test]
async fn test_login_ignores_offsite_next() {
    let app = TestApp::spawn().await;
    app.register(&client(), "camila").await;

    let resp = client()
        .post(app.url("/auth/login"))
        .form(&[("login", "camila"), ("password", PASSWORD), ("next", "//evil.example")])
        .send()
        .await
        .unwrap();

    assert_eq!(location(&resp), "/");
}

#[tokio::test]
async fn test_profile_update() {
    let app = TestApp::spawn().await;
    let client = client();
    app.register(&client, "camila").await;

    let resp = client
        .post(app.url("/account/profile"))
        .form(&[
            ("first_name", "Camila"),
            ("last_name", "Soto Díaz"),
            ("email", "camila.soto@correo.cl"),
            ("phone", "+56 9 1111 2222"),
            ("birth_date", "1990-04-12"),
            ("city", "Viña del Mar"),
            ("country", "Chile"),
        ])
        .send()
        .await
        .unwrap();
    assert!(location(&resp).starts_with("/account/profile?success="));

    let body = page(&app, &client, "/account/profile").await;
    assert!(body.contains("camila.soto@correo.cl"));
    assert!(body.contains("+56 9 1111 2222"));
    assert!(body.contains("1990-04-12"));
    assert!(body.contains("Viña del Mar"));

    let resp = client
        .post(app.url("/account/profile"))
        .form(&[("email", "camila.soto@correo.cl"), ("birth_date", "12/04/1990")])
        .send()
        .await
        .unwrap();
    assert!(location(&resp).starts_with("/account/profile?error="));
}

#[tokio::test]
async fn test_only_one_default_address() {
    let app = TestApp::spawn().await;
    let client = client();
    app.register(&client, "camila").await;

    add_address(&app, &client, "Los Leones 100", true).await;
    add_address(&app, &client, "Suecia 200", true).await;

    let body = page(&app, &client, "/addresses").await;
    assert_eq!(body.matches("Predeterminada</span>").count(), 1);
    // Default first.
    let suecia = body.find("Suecia 200").unwrap();
    let leones = body.find("Los Leones 100").unwrap();
    assert!(suecia < leones);

    let ids = address_ids(&body);
    let resp = client
        .post(app.url(&format!("/addresses/{}/default", ids[ids.len() - 1])))
        .send()
        .await
        .unwrap();
    assert!(location(&resp).starts_with("/addresses?success="));

    let body = page(&app, &client, "/addresses").await;
    assert_eq!(body.matches("Predeterminada</span>").count(), 1);
    assert!(body.find("Los Leones 100").unwrap() < body.find("Suecia 200").unwrap());
}

#[tokio::test]
async fn test_invalid_address_rerenders_form() {
    let app = TestApp::spawn().await;
    let client = client();
    app.register(&client, "camila").await;

    let resp = client
        .post(app.url("/addresses/new"))
        .form(&[("full_name", "Camila Soto"), ("street", "Suecia 200")])
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.text().await.unwrap();
    assert!(body.contains("value=\"Suecia 200\""));
    assert!(body.contains("flash-error"));
}

#[tokio::test]
async fn test_addresses_of_others_are_not_found() {
    let app = TestApp::spawn().await;
    let owner = client();
    app.register(&owner, "camila").await;
    add_address(&app, &owner, "Suecia 200", false).await;
    let ids = address_ids(&page(&app, &owner, "/addresses").await);

    let other = client();
    app.register(&other, "javiera").await;

    let resp = other
        .get(app.url(&format!("/addresses/{}/edit", ids[0])))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = other
        .post(app.url(&format!("/addresses/{}/delete", ids[0])))
        .send()
        .await
        .unwrap();
    assert!(location(&resp).starts_with("/addresses?error="));
    assert!(page(&app, &owner, "/addresses").await.contains("Suecia 200"));
}
