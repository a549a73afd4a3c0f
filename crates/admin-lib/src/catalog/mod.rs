//! Product and category management.

pub mod cache;
pub mod form;
pub mod service;
pub mod upload;

pub use cache::QueryCache;
pub use form::{ImageUpload, ProductDraft};
pub use service::{CatalogService, SavedProduct};
