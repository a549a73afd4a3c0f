// ============================
// crates/admin-lib/src/storage.rs
// ============================
//! Storage abstractions over the hosted backend: profiles, the catalog
//! tables and the object store.
use async_trait::async_trait;

use crate::error::AppError;
use santorini_common::{
    Category, Locale, Profile, ProductDetail, ProductId, ProductRow, ProductSummary,
    ProductTranslation, UserId,
};

/// Lookup from identity to profile
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Zero-or-one profile for the user. A missing row is `Ok(None)`.
    async fn get_by_user_id(&self, id: UserId) -> Result<Option<Profile>, AppError>;
}

/// Catalog persistence
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Categories, newest first, named in `locale`
    async fn list_categories(&self, locale: Locale) -> Result<Vec<Category>, AppError>;

    /// Products, newest first, named and categorised in `locale`
    async fn list_products(&self, locale: Locale) -> Result<Vec<ProductSummary>, AppError>;

    /// A single product with all of its translations
    async fn get_product(&self, id: ProductId) -> Result<Option<ProductDetail>, AppError>;

    /// Insert a product and return its generated id
    async fn insert_product(&self, row: &ProductRow) -> Result<ProductId, AppError>;

    /// Overwrite the product's columns. `NotFound` when no row matched.
    async fn update_product(&self, id: ProductId, row: &ProductRow) -> Result<(), AppError>;

    /// Insert or replace translations, unique on `(product_id, locale)`
    async fn upsert_translations(&self, rows: &[ProductTranslation]) -> Result<(), AppError>;
}

/// Binary object storage with public URLs
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` at `path` inside `bucket`. Existing objects are not overwritten.
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), AppError>;

    /// Public retrieval URL of an uploaded object
    fn public_url(&self, bucket: &str, path: &str) -> String;
}
