//! Explicit owner login: credentials, then a direct role check.
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::provider::IdentityProvider;
use super::throttle::LoginThrottle;
use crate::error::AppError;
use crate::metrics::{LOGIN_FAILED, LOGIN_SUCCEEDED, LOGIN_THROTTLED};
use crate::storage::ProfileStore;
use crate::validation;
use santorini_common::Session;

pub const NOT_OWNER_MESSAGE: &str = "Your account is not allowed to access the admin dashboard";

/// Login form handler
pub struct LoginFlow {
    identity: Arc<dyn IdentityProvider>,
    profiles: Arc<dyn ProfileStore>,
    throttle: LoginThrottle,
    cleanup: Mutex<Option<JoinHandle<()>>>,
}

impl LoginFlow {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        profiles: Arc<dyn ProfileStore>,
        throttle: LoginThrottle,
    ) -> Self {
        Self { identity, profiles, throttle, cleanup: Mutex::new(None) }
    }

    /// Prune the failed-login table every `every`. Only the first call
    /// spawns a task.
    pub fn start_throttle_cleanup(&self, every: Duration) {
        let mut cleanup = self.cleanup.lock();
        if cleanup.is_none() {
            *cleanup = Some(self.throttle.spawn_cleanup(every));
        }
    }

    pub fn stop_throttle_cleanup(&self) {
        if let Some(task) = self.cleanup.lock().take() {
            task.abort();
        }
    }

    /// Sign in and insist on the owner role. A non-owner session is signed
    /// out again before the error is returned.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AppError> {
        let email = validation::validate_credentials(email, password)?;

        if let Some(remaining) = self.throttle.locked_for(email) {
            counter!(LOGIN_THROTTLED).increment(1);
            return Err(AppError::LoginThrottled { retry_after_secs: remaining.as_secs().max(1) });
        }

        let session = match self.identity.sign_in_with_password(email, password).await {
            Ok(session) => session,
            Err(err) => {
                counter!(LOGIN_FAILED, "reason" => "credentials").increment(1);
                if matches!(err, AppError::Auth(_)) {
                    self.throttle.record_failure(email);
                }
                warn!(%email, error = %err, "login rejected");
                return Err(err);
            }
        };

        let profile = match self.profiles.get_by_user_id(session.user_id()).await {
            Ok(profile) => profile,
            Err(err) => {
                warn!(%email, error = %err, "profile lookup failed during login");
                None
            }
        };

        if !profile.as_ref().is_some_and(|p| p.role.is_owner()) {
            counter!(LOGIN_FAILED, "reason" => "role").increment(1);
            warn!(%email, role = ?profile.map(|p| p.role), "non-owner login refused");
            if let Err(err) = self.identity.sign_out().await {
                warn!(%email, error = %err, "sign-out after refused login failed");
            }
            return Err(AppError::Forbidden(NOT_OWNER_MESSAGE.to_string()));
        }

        self.throttle.record_success(email);
        counter!(LOGIN_SUCCEEDED).increment(1);
        info!(%email, "owner signed in");
        Ok(session)
    }
}
