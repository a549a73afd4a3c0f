//! Catalog rows: categories, products and their per-locale translations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub type ProductId = Uuid;
pub type CategoryId = Uuid;

/// Label used when a product's category has no translation in the locale
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Content locale. The storefront is bilingual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    Vi,
    En,
}

impl Locale {
    pub const ALL: [Locale; 2] = [Locale::Vi, Locale::En];

    pub fn as_str(self) -> &'static str {
        match self {
            Locale::Vi => "vi",
            Locale::En => "en",
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vi" => Ok(Locale::Vi),
            "en" => Ok(Locale::En),
            other => Err(format!("unsupported locale: {other}")),
        }
    }
}

/// Category as listed in the console, name resolved for one locale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub slug: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Product list row with name, description and category label resolved for
/// one locale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub id: ProductId,
    pub slug: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub category_id: Option<CategoryId>,
    pub category: String,
    pub base_price: f64,
    #[serde(default)]
    pub image_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Writable columns of the `products` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRow {
    pub base_price: f64,
    pub image_url: Option<String>,
    pub category_id: CategoryId,
    pub is_active: bool,
    pub slug: String,
}

/// One row of `product_translations`, unique on `(product_id, locale)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductTranslation {
    pub product_id: ProductId,
    pub locale: Locale,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// A single product with every translation, used by the edit form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDetail {
    pub id: ProductId,
    pub slug: String,
    pub category_id: Option<CategoryId>,
    pub base_price: f64,
    #[serde(default)]
    pub image_url: Option<String>,
    pub is_active: bool,
    #[serde(default)]
    pub translations: Vec<ProductTranslation>,
}

impl ProductDetail {
    pub fn translation(&self, locale: Locale) -> Option<&ProductTranslation> {
        self.translations.iter().find(|t| t.locale == locale)
    }
}
