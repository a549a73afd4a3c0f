// ============================
// crates/admin-lib/src/lib.rs
// ============================
//! Core of the Santorini admin console: the session gate, the hosted
//! backend adapters, the catalog workflows and the local HTTP API.

pub mod auth;
pub mod backend;
pub mod catalog;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod storage;
pub mod validation;

use std::sync::Arc;
use std::time::Duration;

use crate::auth::{LoginFlow, LoginThrottle, SessionGate};
use crate::backend::Backend;
use crate::catalog::CatalogService;
use crate::config::Settings;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Session gate; the single source of truth for who is signed in
    pub gate: SessionGate,
    /// Explicit login with the owner check
    pub login: Arc<LoginFlow>,
    /// Catalog queries and saves
    pub catalog: Arc<CatalogService>,
    /// Settings
    pub settings: Arc<Settings>,
}

impl AppState {
    /// Wire the gate, login flow and catalog service to `backend`. The gate
    /// is constructed but not started; see [`AppState::start`].
    pub fn new(backend: Backend, settings: Settings) -> Self {
        let gate = SessionGate::new(backend.identity.clone(), backend.profiles.clone());
        let login = Arc::new(LoginFlow::new(
            backend.identity.clone(),
            backend.profiles.clone(),
            LoginThrottle::from_settings(&settings.login),
        ));
        let catalog = Arc::new(CatalogService::new(
            backend.catalog,
            backend.objects,
            settings.catalog.clone(),
        ));
        Self { gate, login, catalog, settings: Arc::new(settings) }
    }

    /// Start the gate and wait for its first decision
    pub async fn start(&self) {
        let lockout = Duration::from_secs(self.settings.login.lockout_secs.max(1));
        self.login.start_throttle_cleanup(lockout);
        self.gate.start().await;
    }

    /// Release the gate's feed subscription and stop background tasks
    pub fn shutdown(&self) {
        self.login.stop_throttle_cleanup();
        self.gate.dispose();
    }
}
