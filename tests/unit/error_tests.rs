// =============
// tests/unit/error_tests.rs
// =============
//! Error codes, statuses and the JSON error body.
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::Value;

use santorini_admin::error::AppError;
use santorini_admin::validation::{FieldError, ValidationError};

async fn body_of(err: AppError) -> (StatusCode, Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[test]
fn test_codes_and_statuses() {
    let cases = [
        (AppError::Auth("x".into()), "AUTH_001", StatusCode::UNAUTHORIZED),
        (AppError::Forbidden("x".into()), "AUTH_002", StatusCode::FORBIDDEN),
        (
            AppError::LoginThrottled { retry_after_secs: 5 },
            "AUTH_003",
            StatusCode::TOO_MANY_REQUESTS,
        ),
        (AppError::NotFound("x".into()), "NF_001", StatusCode::NOT_FOUND),
        (
            AppError::Backend { status: 503, code: None, message: "down".into() },
            "BE_001",
            StatusCode::BAD_GATEWAY,
        ),
        (
            AppError::Validation(ValidationError::MissingPassword),
            "VAL_001",
            StatusCode::BAD_REQUEST,
        ),
        (AppError::Internal("x".into()), "INT_001", StatusCode::INTERNAL_SERVER_ERROR),
    ];
    for (err, code, status) in cases {
        assert_eq!(err.error_code(), code, "{err}");
        assert_eq!(err.status_code(), status, "{err}");
    }
}

#[test]
fn test_string_conversions_are_internal() {
    let err: AppError = "boom".into();
    assert_eq!(err.error_code(), "INT_001");
    let err: AppError = String::from("boom").into();
    assert_eq!(err.sanitized_message(), "An internal error occurred");
}

#[tokio::test]
async fn test_json_error_body() {
    let (status, body) = body_of(AppError::Forbidden("not an owner".into())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "AUTH_002");
    assert!(body["error"]["message"].as_str().unwrap().contains("not an owner"));
    assert!(body["error"].get("fields").is_none());
}

#[tokio::test]
async fn test_invalid_product_body_lists_fields() {
    let err = AppError::Validation(ValidationError::InvalidProduct(vec![
        FieldError { field: "slug", message: "Slug must not be empty" },
        FieldError { field: "base_price", message: "Base price must not be negative" },
    ]));
    let (status, body) = body_of(err).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let fields = body["error"]["fields"].as_array().unwrap();
    assert_eq!(fields.len(), 2);
    assert_eq!(fields[0]["field"], "slug");
    assert_eq!(fields[1]["message"], "Base price must not be negative");
}

#[tokio::test]
async fn test_staged_failure_keeps_source_status() {
    let err = AppError::Backend { status: 409, code: Some("23505".into()), message: "dup".into() };
    let staged = AppError::SaveFailed { stage: "Create product failed", source: Box::new(err) };
    assert_eq!(staged.error_code(), "CAT_001");
    let (status, body) = body_of(staged).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .starts_with("Create product failed"));
}
