// ================
// common/src/lib.rs
// ================
//! Common types shared between the admin console library, its binary and
//! the test suite. Everything here mirrors a row or payload of the hosted
//! backend, so the serde names follow the backend's snake_case columns.

pub mod auth;
pub mod catalog;

pub use auth::{AuthEvent, Identity, Profile, Role, Session, UserId};
pub use catalog::{
    Category, CategoryId, Locale, ProductDetail, ProductId, ProductRow, ProductSummary,
    ProductTranslation, UNCATEGORIZED,
};
