//! Authentication types: sessions, identities, profiles and the events the
//! identity provider publishes on its feed.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of an authenticated user
pub type UserId = Uuid;

/// The authenticated user behind a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
}

/// Credential bundle issued by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Absolute expiry of `access_token`
    #[serde(with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,
    pub user: Identity,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl Session {
    pub fn identity(&self) -> &Identity {
        &self.user
    }

    pub fn user_id(&self) -> UserId {
        self.user.id
    }

    /// Whether the access token has expired at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Time left until the token should be refreshed, given a safety margin.
    /// Zero when the refresh is already due.
    pub fn refresh_due_in(&self, margin: Duration, now: DateTime<Utc>) -> std::time::Duration {
        (self.expires_at - margin - now)
            .to_std()
            .unwrap_or(std::time::Duration::ZERO)
    }
}

/// Authorization tag stored on a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Customer,
    /// Any role string this console does not know about. Never admitted.
    #[serde(other)]
    Unknown,
}

impl Role {
    pub fn is_owner(self) -> bool {
        matches!(self, Role::Owner)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Customer => "customer",
            Role::Unknown => "unknown",
        }
    }
}

/// Application-level record keyed by the identity id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    pub role: Role,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub full_name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

fn null_as_empty<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl Profile {
    /// Take the email from the identity, which the profiles table does not
    /// reliably carry. A stored email is kept only when the identity has none.
    #[must_use]
    pub fn with_email(mut self, email: Option<String>) -> Self {
        if email.is_some() {
            self.email = email;
        }
        self
    }
}

/// Lifecycle event delivered on the identity provider's feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(Session),
    TokenRefreshed(Session),
    SignedOut,
}

impl AuthEvent {
    pub fn session(&self) -> Option<&Session> {
        match self {
            AuthEvent::SignedIn(s) | AuthEvent::TokenRefreshed(s) => Some(s),
            AuthEvent::SignedOut => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AuthEvent::SignedIn(_) => "signed_in",
            AuthEvent::TokenRefreshed(_) => "token_refreshed",
            AuthEvent::SignedOut => "signed_out",
        }
    }
}
