// =============
// tests/integration/route_tests.rs
// =============
//! HTTP API tests driven through `tower::ServiceExt::oneshot`.
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::test_utils::{wait_for_user, TestApp, CUSTOMER_EMAIL, OWNER_EMAIL, PASSWORD};
use santorini_admin::auth::{IdentityProvider, NOT_OWNER_MESSAGE};
use santorini_admin::routes::create_router;

fn router(app: &TestApp) -> Router {
    create_router(app.state.clone())
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Option<String>, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let location = response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, location, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn signed_in_owner() -> (TestApp, Router) {
    let app = TestApp::started().await;
    app.backend.seed_menu();
    app.backend.sign_in_with_password(OWNER_EMAIL, PASSWORD).await.unwrap();
    wait_for_user(app.gate(), app.owner).await;
    let router = router(&app);
    (app, router)
}

#[tokio::test]
async fn test_anonymous_request_redirects_to_login() {
    let app = TestApp::started().await;
    let router = router(&app);

    for uri in ["/", "/products", "/categories", "/navigation"] {
        let (status, location, _) = send(&router, get(uri)).await;
        assert_eq!(status, StatusCode::SEE_OTHER, "{uri}");
        assert_eq!(location.as_deref(), Some("/auth/login"));
    }
}

#[tokio::test]
async fn test_login_path_follows_settings() {
    let mut settings = santorini_admin::config::Settings::default();
    settings.routes.login_path = "/signin".into();
    let app = TestApp::with_settings(settings);
    app.state.start().await;

    let (status, location, _) = send(&router(&app), get("/products")).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location.as_deref(), Some("/signin"));
}

#[tokio::test]
async fn test_owner_login_then_browse() {
    let app = TestApp::started().await;
    app.backend.seed_menu();
    let router = router(&app);

    let (status, _, body) = send(
        &router,
        json_request("POST", "/auth/login", json!({ "email": OWNER_EMAIL, "password": PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["phase"], "granted");
    assert_eq!(body["account"]["name"], "Admin User");
    assert_eq!(body["account"]["email"], OWNER_EMAIL);

    let (status, _, body) = send(&router, get("/products")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 3);

    let (status, _, body) = send(&router, get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["overview"]["total_products"], 3);
    assert_eq!(body["overview"]["total_categories"], 2);
    assert_eq!(body["account"]["email"], OWNER_EMAIL);
}

#[tokio::test]
async fn test_customer_login_is_refused() {
    let app = TestApp::started().await;
    let router = router(&app);

    let (status, _, body) = send(
        &router,
        json_request("POST", "/auth/login", json!({ "email": CUSTOMER_EMAIL, "password": PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "AUTH_002");
    assert!(body["error"]["message"].as_str().unwrap().contains(NOT_OWNER_MESSAGE));

    tokio::time::sleep(Duration::from_millis(50)).await;
    let (_, _, session) = send(&router, get("/auth/session")).await;
    assert_eq!(session["phase"], "denied");
    assert!(session["user"].is_null());
}

#[tokio::test]
async fn test_bad_credentials_and_form_errors() {
    let app = TestApp::started().await;
    let router = router(&app);

    let (status, _, body) = send(
        &router,
        json_request("POST", "/auth/login", json!({ "email": OWNER_EMAIL, "password": "wrong" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "AUTH_001");

    let (status, _, body) = send(
        &router,
        json_request("POST", "/auth/login", json!({ "email": "owner", "password": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VAL_001");
}

#[tokio::test]
async fn test_customer_session_is_redirected_and_revoked_once() {
    let app = TestApp::started().await;
    let router = router(&app);
    app.backend.sign_in_with_password(CUSTOMER_EMAIL, PASSWORD).await.unwrap();

    let (status, location, _) = send(&router, get("/products")).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location.as_deref(), Some("/auth/login"));

    tokio::time::sleep(Duration::from_millis(50)).await;
    let (status, _, _) = send(&router, get("/products")).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(app.backend.sign_out_calls(), 1);
}

#[tokio::test]
async fn test_logout_converges_through_feed() {
    let (_app, router) = signed_in_owner().await;

    let (status, _, body) = send(&router, json_request("POST", "/auth/logout", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["phase"], "denied");

    let (status, _, _) = send(&router, get("/products")).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_create_and_edit_product() {
    let (app, router) = signed_in_owner().await;
    let (_, _, categories) = send(&router, get("/categories")).await;
    let category = categories
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["slug"] == "milk-tea")
        .unwrap()["id"]
        .clone();

    let payload = json!({
        "vietnamese_name": "Trà sữa khoai môn",
        "english_name": "Taro milk tea",
        "slug": "tra-sua-khoai-mon",
        "category_id": category,
        "base_price": 39000,
        "image": {
            "file_name": "taro.jpg",
            "content_type": "image/jpeg",
            "data": STANDARD.encode([0xFFu8, 0xD8, 0xFF, 0xE0]),
        }
    });
    let (status, _, saved) = send(&router, json_request("POST", "/products", payload)).await;
    assert_eq!(status, StatusCode::CREATED);
    let image_url = saved["image_url"].as_str().unwrap();
    assert!(image_url.contains("/products/milk-tea/"));
    assert!(image_url.ends_with(".jpg"));
    assert_eq!(app.backend.object_count(), 1);

    let id = saved["id"].as_str().unwrap();
    let (status, _, edit) = send(&router, get(&format!("/products/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(edit["form"]["english_name"], "Taro milk tea");
    assert_eq!(edit["form"]["image_url"], image_url);

    let mut form = edit["form"].clone();
    form["base_price"] = json!(42000);
    let (status, _, updated) =
        send(&router, json_request("PUT", &format!("/products/{id}"), form)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["image_url"], image_url);

    let (_, _, products) = send(&router, get("/products")).await;
    let row = products
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["id"] == id)
        .unwrap()
        .clone();
    assert_eq!(row["base_price"], 42000.0);
    assert_eq!(row["name"], "Trà sữa khoai môn");
}

#[tokio::test]
async fn test_invalid_product_lists_fields() {
    let (_app, router) = signed_in_owner().await;
    let payload = json!({
        "vietnamese_name": "T",
        "english_name": "",
        "slug": "Bad Slug",
        "category_id": null,
        "base_price": -1
    });
    let (status, _, body) = send(&router, json_request("POST", "/products", payload)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let fields: Vec<&str> = body["error"]["fields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["field"].as_str().unwrap())
        .collect();
    assert_eq!(
        fields,
        ["vietnamese_name", "english_name", "slug", "category_id", "base_price"]
    );
}

#[tokio::test]
async fn test_unknown_product_is_not_found() {
    let (_app, router) = signed_in_owner().await;
    let (status, _, body) =
        send(&router, get(&format!("/products/{}", uuid::Uuid::new_v4()))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NF_001");
}

#[tokio::test]
async fn test_navigation_and_refresh() {
    let (_app, router) = signed_in_owner().await;
    let (status, _, nav) = send(&router, get("/navigation")).await;
    assert_eq!(status, StatusCode::OK);
    let titles: Vec<&str> = nav
        .as_array()
        .unwrap()
        .iter()
        .flat_map(|g| g["items"].as_array().unwrap())
        .map(|i| i["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, ["Dashboard", "Products", "Invoice", "Users"]);

    let (status, _, _) =
        send(&router, json_request("POST", "/catalog/refresh", json!({}))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_session_endpoint_is_public() {
    let app = TestApp::started().await;
    let (status, _, body) = send(&router(&app), get("/auth/session")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["phase"], "denied");
    assert_eq!(body["loading"], false);
}
