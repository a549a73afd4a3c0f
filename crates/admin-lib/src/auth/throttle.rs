// ============================
// crates/admin-lib/src/auth/throttle.rs
// ============================
//! Lockout for repeated failed logins, keyed by email.

use dashmap::DashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::LoginSettings;

/// Entry in the attempts map
#[derive(Debug, Clone)]
struct AttemptEntry {
    /// Consecutive failed attempts
    failed_attempts: u32,
    /// When the lockout expires, if locked out
    lockout_expiry: Option<Instant>,
    last_failure: Instant,
}

impl AttemptEntry {
    /// Neither locked out nor failed within the last `window`
    fn is_stale(&self, now: Instant, window: Duration) -> bool {
        match self.lockout_expiry {
            Some(expiry) => now >= expiry,
            None => now.duration_since(self.last_failure) >= window,
        }
    }
}

fn prune(attempts: &DashMap<String, AttemptEntry>, window: Duration) -> usize {
    let now = Instant::now();
    let before = attempts.len();
    attempts.retain(|_, entry| !entry.is_stale(now, window));
    before - attempts.len()
}

/// Failed-login throttle
#[derive(Debug, Clone)]
pub struct LoginThrottle {
    attempts: Arc<DashMap<String, AttemptEntry>>,
    max_attempts: u32,
    lockout_duration: Duration,
}

impl Default for LoginThrottle {
    fn default() -> Self {
        Self::from_settings(&LoginSettings::default())
    }
}

fn key(email: &str) -> String {
    email.trim().to_lowercase()
}

impl LoginThrottle {
    pub fn new(max_attempts: u32, lockout_duration: Duration) -> Self {
        Self {
            attempts: Arc::new(DashMap::new()),
            max_attempts,
            lockout_duration,
        }
    }

    pub fn from_settings(settings: &LoginSettings) -> Self {
        Self::new(settings.max_attempts, Duration::from_secs(settings.lockout_secs))
    }

    /// Remaining lockout for `email`, `None` when a login may be attempted
    pub fn locked_for(&self, email: &str) -> Option<Duration> {
        let now = Instant::now();
        let entry = self.attempts.get(&key(email))?;
        let expiry = entry.lockout_expiry?;
        (now < expiry).then(|| expiry - now)
    }

    pub fn record_failure(&self, email: &str) {
        let now = Instant::now();
        let mut entry = self.attempts.entry(key(email)).or_insert_with(|| AttemptEntry {
            failed_attempts: 0,
            lockout_expiry: None,
            last_failure: now,
        });

        // an expired lockout or an old failure starts a fresh window
        if entry.is_stale(now, self.lockout_duration) {
            entry.failed_attempts = 0;
            entry.lockout_expiry = None;
        }

        entry.last_failure = now;
        entry.failed_attempts += 1;
        if entry.failed_attempts >= self.max_attempts {
            entry.lockout_expiry = Some(now + self.lockout_duration);
            warn!(email = %key(email), "login locked out after repeated failures");
        }
    }

    pub fn record_success(&self, email: &str) {
        self.attempts.remove(&key(email));
    }

    /// Drop expired lockouts and failures older than the lockout window
    pub fn cleanup(&self) -> usize {
        prune(&self.attempts, self.lockout_duration)
    }

    /// Run [`LoginThrottle::cleanup`] every `every` until the throttle is dropped
    pub fn spawn_cleanup(&self, every: Duration) -> JoinHandle<()> {
        let attempts: Weak<DashMap<String, AttemptEntry>> = Arc::downgrade(&self.attempts);
        let window = self.lockout_duration;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(attempts) = attempts.upgrade() else { break };
                let removed = prune(&attempts, window);
                if removed > 0 {
                    debug!(removed, remaining = attempts.len(), "login throttle cleaned up");
                }
            }
        })
    }
}
