//! Identity provider over the hosted auth service: password and refresh
//! grants, a file-backed session cache and a background refresher.
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use metrics::counter;
use parking_lot::Mutex;
use reqwest::Method;
use serde::Deserialize;
use tokio::sync::{Mutex as AsyncMutex, Notify, OnceCell};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::HostedClient;
use crate::auth::provider::{AuthFeed, IdentityProvider, Subscription};
use crate::auth::session_cache::SessionCache;
use crate::config::SessionSettings;
use crate::error::AppError;
use crate::metrics::{SESSION_REFRESHED, SESSION_REFRESH_FAILED};
use santorini_common::{AuthEvent, Identity, Session, UserId};

#[derive(Debug, Deserialize)]
struct UserRecord {
    id: UserId,
    #[serde(default)]
    email: Option<String>,
}

/// Body of a successful `/auth/v1/token` grant
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: UserRecord,
}

impl TokenResponse {
    fn into_session(self, now: DateTime<Utc>) -> Session {
        let expires_at = self
            .expires_at
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .unwrap_or_else(|| now + chrono::Duration::seconds(self.expires_in.unwrap_or(3600)));
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            token_type: self.token_type.unwrap_or_else(|| "bearer".to_string()),
            expires_at,
            user: Identity { id: self.user.id, email: self.user.email },
        }
    }
}

/// Credential errors come back as 400/401 from the token endpoint
fn credential_error(err: AppError) -> AppError {
    match err {
        AppError::Backend { status: 400 | 401, message, .. } => AppError::Auth(message),
        other => other,
    }
}

/// The current session plus a counter bumped on every install or clear.
/// A refresh only lands if the counter has not moved since it started.
#[derive(Debug, Default)]
struct SessionSlot {
    session: Option<Session>,
    generation: u64,
}

struct IdentityInner {
    client: HostedClient,
    cache: SessionCache,
    feed: AuthFeed,
    current: Mutex<SessionSlot>,
    /// Serializes installs and clears together with their cache writes
    transition: AsyncMutex<()>,
    loaded: OnceCell<()>,
    margin: chrono::Duration,
    retry: Duration,
    wake: Arc<Notify>,
}

pub struct HostedIdentity {
    inner: Arc<IdentityInner>,
    refresher: Mutex<Option<JoinHandle<()>>>,
}

impl HostedIdentity {
    /// Build the provider and spawn its refresher task
    pub fn start(client: HostedClient, cache: SessionCache, settings: &SessionSettings) -> Self {
        let inner = Arc::new(IdentityInner {
            client,
            cache,
            feed: AuthFeed::new(),
            current: Mutex::new(SessionSlot::default()),
            transition: AsyncMutex::new(()),
            loaded: OnceCell::new(),
            margin: chrono::Duration::seconds(settings.refresh_margin_secs as i64),
            retry: Duration::from_secs(settings.refresh_retry_secs.max(1)),
            wake: Arc::new(Notify::new()),
        });
        let refresher = tokio::spawn(run_refresher(Arc::downgrade(&inner)));
        Self { inner, refresher: Mutex::new(Some(refresher)) }
    }
}

impl Drop for HostedIdentity {
    fn drop(&mut self) {
        if let Some(task) = self.refresher.get_mut().take() {
            task.abort();
        }
    }
}

impl IdentityInner {
    /// Pull the persisted session into memory, once
    async fn ensure_loaded(&self) {
        self.loaded
            .get_or_init(|| async {
                match self.cache.load().await {
                    Ok(Some(session)) => {
                        debug!(user = %session.user_id(), "persisted session loaded");
                        if !session.is_expired_at(Utc::now()) {
                            self.client.set_access_token(Some(session.access_token.clone()));
                        }
                        let mut slot = self.current.lock();
                        slot.session = Some(session);
                        slot.generation += 1;
                    }
                    Ok(None) => {}
                    Err(err) => warn!(error = %err, "could not read session cache"),
                }
            })
            .await;
    }

    fn current(&self) -> Option<Session> {
        self.current.lock().session.clone()
    }

    fn current_with_generation(&self) -> (Option<Session>, u64) {
        let slot = self.current.lock();
        (slot.session.clone(), slot.generation)
    }

    /// Take the slot for a new session or a sign-out. With `expected` set,
    /// fails if anything was installed or cleared since that generation.
    fn claim_slot(&self, session: Option<Session>, expected: Option<u64>) -> bool {
        let mut slot = self.current.lock();
        if expected.is_some_and(|generation| generation != slot.generation) {
            return false;
        }
        slot.session = session;
        slot.generation += 1;
        true
    }

    /// Make `session` current, persist it and publish `event`. Returns
    /// `false` when `expected` is stale and nothing changed.
    async fn install(
        &self,
        session: Session,
        event: fn(Session) -> AuthEvent,
        expected: Option<u64>,
    ) -> bool {
        let _transition = self.transition.lock().await;
        if !self.claim_slot(Some(session.clone()), expected) {
            return false;
        }
        self.client.set_access_token(Some(session.access_token.clone()));
        if let Err(err) = self.cache.store(&session).await {
            warn!(error = %err, "could not persist session");
        }
        self.wake.notify_one();
        self.feed.emit(event(session));
        true
    }

    /// Drop the session, its cache file and publish `SignedOut`. Same
    /// `expected` rule as [`IdentityInner::install`].
    async fn clear(&self, expected: Option<u64>) -> bool {
        let _transition = self.transition.lock().await;
        if !self.claim_slot(None, expected) {
            return false;
        }
        self.client.set_access_token(None);
        if let Err(err) = self.cache.clear().await {
            warn!(error = %err, "could not clear session cache");
        }
        self.wake.notify_one();
        self.feed.emit(AuthEvent::SignedOut);
        true
    }

    async fn token_grant(&self, grant_type: &str, body: serde_json::Value) -> Result<Session, AppError> {
        let request = self
            .client
            .request(Method::POST, &format!("/auth/v1/token?grant_type={grant_type}"))
            .json(&body);
        let response: TokenResponse = self.client.send_json(request).await.map_err(credential_error)?;
        Ok(response.into_session(Utc::now()))
    }

    /// Time until the current session should be refreshed; `None` when
    /// signed out
    fn refresh_due_in(&self) -> Option<Duration> {
        self.current
            .lock()
            .session
            .as_ref()
            .map(|s| s.refresh_due_in(self.margin, Utc::now()))
    }

    /// Refresh the current session. Rejected refresh tokens sign the user
    /// out; transport failures are returned for a later retry. A result that
    /// arrives after a sign-out or a new sign-in is dropped.
    async fn refresh(&self) -> Result<(), AppError> {
        let (Some(session), generation) = self.current_with_generation() else {
            return Ok(());
        };
        let body = serde_json::json!({ "refresh_token": session.refresh_token });
        match self.token_grant("refresh_token", body).await {
            Ok(refreshed) => {
                let user = refreshed.user_id();
                let expires_at = refreshed.expires_at;
                if self.install(refreshed, AuthEvent::TokenRefreshed, Some(generation)).await {
                    counter!(SESSION_REFRESHED).increment(1);
                    info!(%user, %expires_at, "session refreshed");
                } else {
                    counter!(SESSION_REFRESH_FAILED, "reason" => "superseded").increment(1);
                    debug!(%user, "session changed during refresh, result dropped");
                }
                Ok(())
            }
            Err(AppError::Auth(message)) => {
                counter!(SESSION_REFRESH_FAILED, "reason" => "rejected").increment(1);
                if self.clear(Some(generation)).await {
                    warn!(user = %session.user_id(), %message, "refresh token rejected, signed out");
                }
                Ok(())
            }
            Err(err) => {
                counter!(SESSION_REFRESH_FAILED, "reason" => "transport").increment(1);
                Err(err)
            }
        }
    }
}

async fn run_refresher(weak: Weak<IdentityInner>) {
    if let Some(inner) = weak.upgrade() {
        inner.ensure_loaded().await;
    }
    loop {
        let (due_in, wake, retry) = {
            let Some(inner) = weak.upgrade() else { break };
            (inner.refresh_due_in(), inner.wake.clone(), inner.retry)
        };

        match due_in {
            None => {
                wake.notified().await;
                continue;
            }
            Some(wait) if !wait.is_zero() => {
                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    _ = wake.notified() => continue,
                }
            }
            Some(_) => {}
        }

        let Some(inner) = weak.upgrade() else { break };
        if inner.refresh_due_in().is_some_and(|d| !d.is_zero()) {
            // replaced while we slept
            continue;
        }
        if let Err(err) = inner.refresh().await {
            warn!(error = %err, retry_in = ?retry, "session refresh failed");
            drop(inner);
            tokio::select! {
                _ = tokio::time::sleep(retry) => {}
                _ = wake.notified() => {}
            }
        }
    }
    debug!("session refresher stopped");
}

#[async_trait]
impl IdentityProvider for HostedIdentity {
    async fn current_session(&self) -> Result<Option<Session>, AppError> {
        self.inner.ensure_loaded().await;
        // an expired session is left to the refresher, which publishes the
        // replacement on the feed
        Ok(self.inner.current().filter(|s| !s.is_expired_at(Utc::now())))
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AppError> {
        self.inner.ensure_loaded().await;
        let body = serde_json::json!({ "email": email, "password": password });
        let session = self.inner.token_grant("password", body).await?;
        info!(user = %session.user_id(), "signed in");
        self.inner.install(session.clone(), AuthEvent::SignedIn, None).await;
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), AppError> {
        self.inner.ensure_loaded().await;
        if let Some(session) = self.inner.current() {
            let request = self
                .inner
                .client
                .request_as(Method::POST, "/auth/v1/logout", &session.access_token);
            // the local session goes regardless of what the server says
            if let Err(err) = self.inner.client.send(request).await {
                warn!(error = %err, "remote logout failed");
            }
        }
        self.inner.clear(None).await;
        info!("signed out");
        Ok(())
    }

    fn subscribe(&self) -> Subscription {
        self.inner.feed.subscribe()
    }
}
