// ============================
// crates/admin-lib/src/catalog/service.rs
// ============================
//! Catalog queries and the product save workflow.
use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use serde::Serialize;
use tracing::{info, warn};

use super::cache::QueryCache;
use super::form::{ImageUpload, ProductDraft};
use super::upload::{object_file_name, object_path};
use crate::config::CatalogSettings;
use crate::error::AppError;
use crate::metrics::{IMAGE_UPLOADED, PRODUCT_SAVED};
use crate::storage::{CatalogStore, ObjectStore};
use crate::validation;
use santorini_common::{Category, CategoryId, Locale, ProductDetail, ProductId, ProductSummary};

pub const UPLOAD_FAILED: &str = "Upload product image failed";
pub const CREATE_FAILED: &str = "Create product failed";
pub const UPDATE_FAILED: &str = "Update product failed";
pub const TRANSLATIONS_FAILED: &str = "Save product translations failed";

/// Result of a successful save
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavedProduct {
    pub id: ProductId,
    pub image_url: Option<String>,
    pub created: bool,
}

pub struct CatalogService {
    store: Arc<dyn CatalogStore>,
    objects: Arc<dyn ObjectStore>,
    settings: CatalogSettings,
    categories: QueryCache<Vec<Category>>,
    products: QueryCache<Vec<ProductSummary>>,
}

impl CatalogService {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        objects: Arc<dyn ObjectStore>,
        settings: CatalogSettings,
    ) -> Self {
        let stale_time = std::time::Duration::from_secs(settings.stale_time_secs);
        Self {
            store,
            objects,
            settings,
            categories: QueryCache::new(stale_time),
            products: QueryCache::new(stale_time),
        }
    }

    pub fn locale(&self) -> Locale {
        self.settings.locale
    }

    pub async fn categories(&self) -> Result<Vec<Category>, AppError> {
        let locale = self.settings.locale;
        self.categories
            .get_or_fetch(&format!("categories:{locale}"), || self.store.list_categories(locale))
            .await
    }

    pub async fn products(&self) -> Result<Vec<ProductSummary>, AppError> {
        let locale = self.settings.locale;
        self.products
            .get_or_fetch(&format!("products:{locale}"), || self.store.list_products(locale))
            .await
    }

    pub async fn product(&self, id: ProductId) -> Result<ProductDetail, AppError> {
        self.store
            .get_product(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("product {id}")))
    }

    /// The edit form for an existing product
    pub async fn edit_form(&self, id: ProductId) -> Result<ProductDraft, AppError> {
        Ok(ProductDraft::from_detail(&self.product(id).await?))
    }

    /// Drop every cached list
    pub fn refresh(&self) {
        self.categories.invalidate_all();
        self.products.invalidate_all();
    }

    /// Create (`existing = None`) or update a product: upload the attached
    /// image, write the product row, then upsert both translations.
    pub async fn save_product(
        &self,
        existing: Option<ProductId>,
        draft: &ProductDraft,
        image: Option<ImageUpload>,
    ) -> Result<SavedProduct, AppError> {
        validation::validate_product(draft)?;
        if let Some(image) = &image {
            validation::validate_image(image, self.settings.max_image_bytes)?;
        }

        let image_url = match image {
            Some(image) => Some(self.upload_image(draft.category_id, image).await?),
            None => draft.image_url.clone(),
        };

        let row = draft
            .to_row(image_url.clone())
            .ok_or_else(|| AppError::Internal("validated draft lost its category".into()))?;

        let (id, created) = match existing {
            Some(id) => {
                self.store
                    .update_product(id, &row)
                    .await
                    .map_err(|e| e.at_stage(UPDATE_FAILED))?;
                (id, false)
            }
            None => {
                let id = self
                    .store
                    .insert_product(&row)
                    .await
                    .map_err(|e| e.at_stage(CREATE_FAILED))?;
                (id, true)
            }
        };

        self.store
            .upsert_translations(&draft.translations(id))
            .await
            .map_err(|e| e.at_stage(TRANSLATIONS_FAILED))?;

        self.products.invalidate_all();
        counter!(PRODUCT_SAVED, "op" => if created { "create" } else { "update" }).increment(1);
        info!(%id, slug = %draft.slug, created, "product saved");
        Ok(SavedProduct { id, image_url, created })
    }

    /// Store the image under the category's folder and return its public URL
    async fn upload_image(
        &self,
        category_id: Option<CategoryId>,
        image: ImageUpload,
    ) -> Result<String, AppError> {
        let folder = self.category_folder(category_id).await;
        let extension = image.extension().unwrap_or_else(|| "bin".to_string());
        let file_name = {
            let mut rng = rand::rng();
            object_file_name(Utc::now().timestamp_millis(), &extension, &mut rng)
        };
        let path = object_path(&folder, &file_name);
        let bucket = &self.settings.image_bucket;

        self.objects
            .upload(bucket, &path, image.bytes, &image.content_type)
            .await
            .map_err(|e| e.at_stage(UPLOAD_FAILED))?;

        counter!(IMAGE_UPLOADED).increment(1);
        Ok(self.objects.public_url(bucket, &path))
    }

    /// Slug of the selected category, or the configured fallback folder
    async fn category_folder(&self, category_id: Option<CategoryId>) -> String {
        let slug = match self.categories().await {
            Ok(categories) => categories
                .into_iter()
                .find(|c| Some(c.id) == category_id)
                .map(|c| c.slug),
            Err(err) => {
                warn!(error = %err, "could not resolve category for image folder");
                None
            }
        };
        slug.unwrap_or_else(|| self.settings.fallback_category_slug.clone())
    }
}
