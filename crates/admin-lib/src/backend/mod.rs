// ============================
// crates/admin-lib/src/backend/mod.rs
// ============================
//! Backend adapters: the hosted HTTP services and the in-memory stand-in.
pub mod identity;
pub mod memory;
pub mod objects;
pub mod rest;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use reqwest::{header, Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::auth::provider::IdentityProvider;
use crate::auth::session_cache::SessionCache;
use crate::config::Settings;
use crate::error::AppError;
use crate::storage::{CatalogStore, ObjectStore, ProfileStore};

pub use identity::HostedIdentity;
pub use memory::MemoryBackend;
pub use objects::HostedObjects;
pub use rest::{HostedCatalog, HostedProfiles};

/// Shared HTTP client for the hosted backend. Every request carries the
/// `apikey` header and a bearer token: the signed-in user's access token
/// when there is one, else the anon key.
#[derive(Clone)]
pub struct HostedClient {
    http: Client,
    base_url: String,
    anon_key: String,
    access_token: Arc<RwLock<Option<String>>>,
}

impl HostedClient {
    pub fn new(settings: &Settings) -> Result<Self, AppError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.backend.request_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: settings.backend_url().to_string(),
            anon_key: settings.backend.anon_key.clone(),
            access_token: Arc::new(RwLock::new(None)),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Token used for subsequent requests; `None` falls back to the anon key
    pub fn set_access_token(&self, token: Option<String>) {
        *self.access_token.write() = token;
    }

    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let bearer = self
            .access_token
            .read()
            .clone()
            .unwrap_or_else(|| self.anon_key.clone());
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }

    /// Request authenticated with an explicit token instead of the shared one
    pub fn request_as(&self, method: Method, path: &str, token: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
    }

    /// Send and turn error statuses into `AppError::Backend`
    pub async fn send(&self, request: RequestBuilder) -> Result<Response, AppError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        debug!(status = status.as_u16(), %body, "backend returned an error");
        Err(error_from_body(status.as_u16(), &body))
    }

    pub async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, AppError> {
        let response = self.send(request.header(header::ACCEPT, "application/json")).await?;
        Ok(response.json::<T>().await?)
    }
}

/// Build an error from a failed response body. The auth, REST and storage
/// services each name their fields differently.
pub(crate) fn error_from_body(status: u16, body: &str) -> AppError {
    let json: serde_json::Value = serde_json::from_str(body).unwrap_or_default();
    let field = |names: &[&str]| {
        names.iter().find_map(|name| match json.get(*name) {
            Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(serde_json::Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
    };

    let code = field(&["code", "error_code", "error"]);
    let message = field(&["message", "msg", "error_description"])
        .or_else(|| code.clone())
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                format!("HTTP {status}")
            } else {
                body.trim().to_string()
            }
        });

    AppError::Backend { status, code, message }
}

/// One handle per backend concern
#[derive(Clone)]
pub struct Backend {
    pub identity: Arc<dyn IdentityProvider>,
    pub profiles: Arc<dyn ProfileStore>,
    pub catalog: Arc<dyn CatalogStore>,
    pub objects: Arc<dyn ObjectStore>,
}

impl Backend {
    /// Adapters for the hosted services. Starts the session refresher, so
    /// it must run inside a tokio runtime.
    pub fn hosted(settings: &Settings) -> Result<Self, AppError> {
        let client = HostedClient::new(settings)?;
        let cache = SessionCache::new(settings.session.cache_path.clone());
        let identity = HostedIdentity::start(client.clone(), cache, &settings.session);
        Ok(Self {
            identity: Arc::new(identity),
            profiles: Arc::new(HostedProfiles::new(client.clone())),
            catalog: Arc::new(HostedCatalog::new(client.clone())),
            objects: Arc::new(HostedObjects::new(client)),
        })
    }

    pub fn memory(backend: Arc<MemoryBackend>) -> Self {
        Self {
            identity: backend.clone(),
            profiles: backend.clone(),
            catalog: backend.clone(),
            objects: backend,
        }
    }
}
