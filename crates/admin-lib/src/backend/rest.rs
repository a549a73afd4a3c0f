//! Profile and catalog stores over the hosted REST interface.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header, Method};
use serde::Deserialize;
use tracing::debug;

use super::HostedClient;
use crate::error::AppError;
use crate::storage::{CatalogStore, ProfileStore};
use santorini_common::{
    Category, CategoryId, Locale, Profile, ProductDetail, ProductId, ProductRow, ProductSummary,
    ProductTranslation, UserId, UNCATEGORIZED,
};

/// Ask for a single JSON object instead of an array
const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";
/// Error code for "zero rows where one was requested"
const NO_ROWS: &str = "PGRST116";

fn single_or_none<T>(result: Result<T, AppError>) -> Result<Option<T>, AppError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.backend_code() == Some(NO_ROWS) => Ok(None),
        Err(err) => Err(err),
    }
}

pub struct HostedProfiles {
    client: HostedClient,
}

impl HostedProfiles {
    pub fn new(client: HostedClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProfileStore for HostedProfiles {
    async fn get_by_user_id(&self, id: UserId) -> Result<Option<Profile>, AppError> {
        let request = self
            .client
            .request(Method::GET, &format!("/rest/v1/profiles?id=eq.{id}&select=*"))
            .header(header::ACCEPT, SINGLE_OBJECT);
        let result = match self.client.send(request).await {
            Ok(response) => response.json::<Profile>().await.map_err(AppError::from),
            Err(err) => Err(err),
        };
        single_or_none(result)
    }
}

#[derive(Debug, Deserialize)]
struct NameRecord {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CategoryRecord {
    id: CategoryId,
    slug: String,
    #[serde(default)]
    image_url: Option<String>,
    created_at: DateTime<Utc>,
    #[serde(default)]
    category_translations: Vec<NameRecord>,
}

impl From<CategoryRecord> for Category {
    fn from(record: CategoryRecord) -> Self {
        Category {
            id: record.id,
            slug: record.slug,
            name: record.category_translations.into_iter().next().and_then(|t| t.name),
            image_url: record.image_url,
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddedCategory {
    #[serde(default)]
    category_translations: Vec<NameRecord>,
}

#[derive(Debug, Deserialize)]
struct ProductRecord {
    id: ProductId,
    slug: String,
    base_price: f64,
    #[serde(default)]
    image_url: Option<String>,
    is_active: bool,
    #[serde(default)]
    category_id: Option<CategoryId>,
    created_at: DateTime<Utc>,
    #[serde(default)]
    product_translations: Vec<NameRecord>,
    #[serde(default)]
    categories: Option<EmbeddedCategory>,
}

impl From<ProductRecord> for ProductSummary {
    fn from(record: ProductRecord) -> Self {
        let translation = record.product_translations.into_iter().next();
        let category = record
            .categories
            .and_then(|c| c.category_translations.into_iter().next())
            .and_then(|t| t.name)
            .unwrap_or_else(|| UNCATEGORIZED.to_string());
        ProductSummary {
            id: record.id,
            slug: record.slug,
            name: translation.as_ref().and_then(|t| t.name.clone()),
            description: translation.and_then(|t| t.description),
            category_id: record.category_id,
            category,
            base_price: record.base_price,
            image_url: record.image_url,
            is_active: record.is_active,
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DetailRecord {
    id: ProductId,
    slug: String,
    base_price: f64,
    #[serde(default)]
    image_url: Option<String>,
    is_active: bool,
    #[serde(default)]
    category_id: Option<CategoryId>,
    #[serde(default)]
    product_translations: Vec<ProductTranslation>,
}

impl From<DetailRecord> for ProductDetail {
    fn from(record: DetailRecord) -> Self {
        ProductDetail {
            id: record.id,
            slug: record.slug,
            category_id: record.category_id,
            base_price: record.base_price,
            image_url: record.image_url,
            is_active: record.is_active,
            translations: record.product_translations,
        }
    }
}

#[derive(Debug, Deserialize)]
struct IdRecord {
    id: ProductId,
}

fn categories_query(locale: Locale) -> String {
    format!(
        "/rest/v1/categories?select=id,slug,image_url,created_at,category_translations(name,locale)\
         &category_translations.locale=eq.{locale}&order=created_at.desc"
    )
}

fn products_query(locale: Locale) -> String {
    format!(
        "/rest/v1/products?select=id,slug,base_price,image_url,is_active,category_id,created_at,\
         product_translations(name,description,locale),\
         categories(id,slug,category_translations(name,locale))\
         &product_translations.locale=eq.{locale}\
         &categories.category_translations.locale=eq.{locale}\
         &order=created_at.desc"
    )
}

fn product_query(id: ProductId) -> String {
    format!(
        "/rest/v1/products?id=eq.{id}&select=id,slug,base_price,image_url,is_active,category_id,\
         product_translations(product_id,locale,name,description)"
    )
}

pub struct HostedCatalog {
    client: HostedClient,
}

impl HostedCatalog {
    pub fn new(client: HostedClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CatalogStore for HostedCatalog {
    async fn list_categories(&self, locale: Locale) -> Result<Vec<Category>, AppError> {
        let request = self.client.request(Method::GET, &categories_query(locale));
        let records: Vec<CategoryRecord> = self.client.send_json(request).await?;
        debug!(count = records.len(), %locale, "categories fetched");
        Ok(records.into_iter().map(Category::from).collect())
    }

    async fn list_products(&self, locale: Locale) -> Result<Vec<ProductSummary>, AppError> {
        let request = self.client.request(Method::GET, &products_query(locale));
        let records: Vec<ProductRecord> = self.client.send_json(request).await?;
        debug!(count = records.len(), %locale, "products fetched");
        Ok(records.into_iter().map(ProductSummary::from).collect())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<ProductDetail>, AppError> {
        let request = self
            .client
            .request(Method::GET, &product_query(id))
            .header(header::ACCEPT, SINGLE_OBJECT);
        let result = match self.client.send(request).await {
            Ok(response) => response.json::<DetailRecord>().await.map_err(AppError::from),
            Err(err) => Err(err),
        };
        Ok(single_or_none(result)?.map(ProductDetail::from))
    }

    async fn insert_product(&self, row: &ProductRow) -> Result<ProductId, AppError> {
        let request = self
            .client
            .request(Method::POST, "/rest/v1/products?select=id")
            .header("Prefer", "return=representation")
            .header(header::ACCEPT, SINGLE_OBJECT)
            .json(row);
        let response = self.client.send(request).await?;
        Ok(response.json::<IdRecord>().await?.id)
    }

    async fn update_product(&self, id: ProductId, row: &ProductRow) -> Result<(), AppError> {
        let request = self
            .client
            .request(Method::PATCH, &format!("/rest/v1/products?id=eq.{id}&select=id"))
            .header("Prefer", "return=representation")
            .json(row);
        let updated: Vec<IdRecord> = self.client.send_json(request).await?;
        if updated.is_empty() {
            return Err(AppError::NotFound(format!("product {id}")));
        }
        Ok(())
    }

    async fn upsert_translations(&self, rows: &[ProductTranslation]) -> Result<(), AppError> {
        let request = self
            .client
            .request(Method::POST, "/rest/v1/product_translations?on_conflict=product_id,locale")
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(rows);
        self.client.send(request).await?;
        Ok(())
    }
}
