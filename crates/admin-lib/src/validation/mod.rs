// ============================
// crates/admin-lib/src/validation/mod.rs
// ============================
//! Input validation for the login form and the product form.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;
use thiserror::Error;

use crate::catalog::{ImageUpload, ProductDraft};

const MIN_NAME_CHARS: usize = 2;
const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321 SMTP limit

static EMAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap());
static SLUG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").unwrap());

/// A single rejected form field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

/// Possible validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("Password is required")]
    MissingPassword,

    #[error("Invalid product: {}", summarize(.0))]
    InvalidProduct(Vec<FieldError>),

    #[error("Invalid image: {0}")]
    InvalidImage(String),
}

fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validate a login email
pub fn validate_email(email: &str) -> ValidationResult<&str> {
    let email = email.trim();
    if email.is_empty() || email.len() > MAX_EMAIL_LENGTH || !EMAIL_REGEX.is_match(email) {
        return Err(ValidationError::InvalidEmail(email.to_string()));
    }
    Ok(email)
}

/// Validate the login form
pub fn validate_credentials<'a>(email: &'a str, password: &str) -> ValidationResult<&'a str> {
    let email = validate_email(email)?;
    if password.is_empty() {
        return Err(ValidationError::MissingPassword);
    }
    Ok(email)
}

fn long_enough(name: &str) -> bool {
    name.trim().chars().count() >= MIN_NAME_CHARS
}

/// Validate the product form, reporting every failing field
pub fn validate_product(draft: &ProductDraft) -> ValidationResult<()> {
    let mut errors = Vec::new();

    if !long_enough(&draft.vietnamese_name) {
        errors.push(FieldError {
            field: "vietnamese_name",
            message: "Vietnamese name must be at least 2 characters",
        });
    }
    if !long_enough(&draft.english_name) {
        errors.push(FieldError {
            field: "english_name",
            message: "English name must be at least 2 characters",
        });
    }
    if draft.slug.is_empty() {
        errors.push(FieldError { field: "slug", message: "Slug must not be empty" });
    } else if !SLUG_REGEX.is_match(&draft.slug) {
        errors.push(FieldError {
            field: "slug",
            message: "Slug may only contain lowercase letters, digits and single dashes",
        });
    }
    if draft.category_id.is_none() {
        errors.push(FieldError { field: "category_id", message: "Please choose a category" });
    }
    if !draft.base_price.is_finite() || draft.base_price < 0.0 {
        errors.push(FieldError {
            field: "base_price",
            message: "Base price must not be negative",
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::InvalidProduct(errors))
    }
}

/// Validate an attached product image against the size limit
pub fn validate_image(image: &ImageUpload, max_bytes: usize) -> ValidationResult<()> {
    if image.bytes.is_empty() {
        return Err(ValidationError::InvalidImage("file is empty".to_string()));
    }
    if image.bytes.len() > max_bytes {
        return Err(ValidationError::InvalidImage(format!(
            "file is {} bytes, the limit is {max_bytes}",
            image.bytes.len()
        )));
    }
    if !image.content_type.starts_with("image/") {
        return Err(ValidationError::InvalidImage(format!(
            "unsupported content type {}",
            image.content_type
        )));
    }
    if image.extension().is_none() {
        return Err(ValidationError::InvalidImage(format!(
            "file name {} has no extension",
            image.file_name
        )));
    }
    Ok(())
}
