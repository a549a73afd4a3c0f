//! Product form model and its mapping to and from stored rows.
use serde::{Deserialize, Serialize};

use santorini_common::{
    CategoryId, Locale, ProductDetail, ProductId, ProductRow, ProductTranslation,
};

fn default_active() -> bool {
    true
}

/// Everything the product form edits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDraft {
    pub vietnamese_name: String,
    pub english_name: String,
    pub slug: String,
    pub category_id: Option<CategoryId>,
    pub base_price: f64,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub vietnamese_description: Option<String>,
    #[serde(default)]
    pub english_description: Option<String>,
    /// Image already stored for the product; replaced when a new file is attached
    #[serde(default)]
    pub image_url: Option<String>,
}

impl Default for ProductDraft {
    fn default() -> Self {
        Self {
            vietnamese_name: String::new(),
            english_name: String::new(),
            slug: String::new(),
            category_id: None,
            base_price: 0.0,
            active: true,
            vietnamese_description: None,
            english_description: None,
            image_url: None,
        }
    }
}

impl ProductDraft {
    /// Prefill the form from a stored product
    pub fn from_detail(detail: &ProductDetail) -> Self {
        let vi = detail.translation(Locale::Vi);
        let en = detail.translation(Locale::En);
        Self {
            vietnamese_name: vi.map(|t| t.name.clone()).unwrap_or_default(),
            english_name: en.map(|t| t.name.clone()).unwrap_or_default(),
            slug: detail.slug.clone(),
            category_id: detail.category_id,
            base_price: detail.base_price,
            active: detail.is_active,
            vietnamese_description: vi.and_then(|t| t.description.clone()),
            english_description: en.and_then(|t| t.description.clone()),
            image_url: detail.image_url.clone(),
        }
    }

    /// Columns for the `products` table. Call after validation: a draft
    /// without a category yields `None`.
    pub fn to_row(&self, image_url: Option<String>) -> Option<ProductRow> {
        Some(ProductRow {
            base_price: self.base_price,
            image_url,
            category_id: self.category_id?,
            is_active: self.active,
            slug: self.slug.clone(),
        })
    }

    /// The `vi` and `en` translation rows
    pub fn translations(&self, product_id: ProductId) -> Vec<ProductTranslation> {
        vec![
            ProductTranslation {
                product_id,
                locale: Locale::Vi,
                name: self.vietnamese_name.trim().to_string(),
                description: non_blank(&self.vietnamese_description),
            },
            ProductTranslation {
                product_id,
                locale: Locale::En,
                name: self.english_name.trim().to_string(),
                description: non_blank(&self.english_description),
            },
        ]
    }
}

fn non_blank(text: &Option<String>) -> Option<String> {
    text.as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// A file attached to the product form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    /// Lowercased text after the last dot of the file name
    pub fn extension(&self) -> Option<String> {
        let (stem, ext) = self.file_name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_lowercase())
    }
}
