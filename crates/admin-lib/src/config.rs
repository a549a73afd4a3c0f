// ============================
// crates/admin-lib/src/config.rs
// ============================
//! Configuration management.
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Result};
use figment::{
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};

use santorini_common::Locale;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Hosted backend endpoint and keys
    pub backend: BackendSettings,
    /// Session persistence and refresh
    pub session: SessionSettings,
    /// Local HTTP API
    pub server: ServerSettings,
    /// Route paths used by the owner guard
    pub routes: RouteSettings,
    /// Catalog queries and image upload
    pub catalog: CatalogSettings,
    /// Login throttling
    pub login: LoginSettings,
    /// Log level
    pub log_level: String,
    /// `text` or `json`
    pub log_format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    /// Project URL, e.g. `https://xyz.supabase.co`
    pub url: String,
    /// Public anon key sent as `apikey`
    pub anon_key: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// File the signed-in session is persisted to between runs
    pub cache_path: PathBuf,
    /// Refresh this many seconds before the access token expires
    pub refresh_margin_secs: u64,
    /// Wait before retrying a refresh that failed on transport
    pub refresh_retry_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind_addr: SocketAddr,
    /// How long the owner guard waits for the gate to finish loading
    pub gate_wait_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteSettings {
    pub login_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSettings {
    pub locale: Locale,
    /// Cached list queries are served for this long before refetching
    pub stale_time_secs: u64,
    pub image_bucket: String,
    /// Upload folder used when the selected category cannot be resolved
    pub fallback_category_slug: String,
    pub max_image_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginSettings {
    pub max_attempts: u32,
    pub lockout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend: BackendSettings::default(),
            session: SessionSettings::default(),
            server: ServerSettings::default(),
            routes: RouteSettings::default(),
            catalog: CatalogSettings::default(),
            login: LoginSettings::default(),
            log_level: "info".to_string(),
            log_format: "text".to_string(),
        }
    }
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            anon_key: String::new(),
            request_timeout_secs: 15,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            cache_path: PathBuf::from(".santorini/session.json"),
            refresh_margin_secs: 60,
            refresh_retry_secs: 30,
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            gate_wait_secs: 10,
        }
    }
}

impl Default for RouteSettings {
    fn default() -> Self {
        Self { login_path: "/auth/login".to_string() }
    }
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            locale: Locale::Vi,
            stale_time_secs: 60,
            image_bucket: "products".to_string(),
            fallback_category_slug: "fruit-tea".to_string(),
            max_image_bytes: 5 * 1024 * 1024, // 5MB
        }
    }
}

impl Default for LoginSettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            lockout_secs: 5 * 60,
        }
    }
}

impl Settings {
    /// Load settings from the default file names and `SANTORINI_*` env vars
    pub fn load() -> Result<Self> {
        Self::from_figment(
            Figment::from(Serialized::defaults(Settings::default()))
                .merge(Toml::file("santorini.toml"))
                .merge(Yaml::file("santorini.yaml"))
                .merge(Json::file("santorini.json")),
        )
    }

    /// Load settings from an explicit TOML file, env vars still win
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_figment(
            Figment::from(Serialized::defaults(Settings::default()))
                .merge(Toml::file(path.as_ref())),
        )
    }

    fn from_figment(figment: Figment) -> Result<Self> {
        let settings: Settings = figment
            .merge(Env::prefixed("SANTORINI_").split("__"))
            .extract()?;
        Ok(settings)
    }

    /// Reject settings the console cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.backend.url.trim().is_empty() {
            bail!("backend.url must be set");
        }
        if !self.backend.url.starts_with("http://") && !self.backend.url.starts_with("https://") {
            bail!("backend.url must be an http(s) URL");
        }
        if self.backend.anon_key.trim().is_empty() {
            bail!("backend.anon_key must be set");
        }
        self.validate_local()
    }

    /// Checks that do not involve the hosted backend (offline mode)
    pub fn validate_local(&self) -> Result<()> {
        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            bail!("invalid log level: {}", self.log_level);
        }
        if self.log_format != "text" && self.log_format != "json" {
            bail!("log_format must be `text` or `json`");
        }
        if self.catalog.stale_time_secs == 0 {
            bail!("catalog.stale_time_secs must be greater than zero");
        }
        if self.catalog.max_image_bytes == 0 {
            bail!("catalog.max_image_bytes must be greater than zero");
        }
        if !self.routes.login_path.starts_with('/') {
            bail!("routes.login_path must be an absolute path");
        }
        if self.login.max_attempts == 0 {
            bail!("login.max_attempts must be greater than zero");
        }
        Ok(())
    }

    pub fn backend_url(&self) -> &str {
        self.backend.url.trim_end_matches('/')
    }

    pub fn stale_time(&self) -> Duration {
        Duration::from_secs(self.catalog.stale_time_secs)
    }

    pub fn refresh_margin(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.session.refresh_margin_secs as i64)
    }
}
