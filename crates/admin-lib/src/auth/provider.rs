//! Identity provider contract and its change feed.
use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::warn;

use crate::error::AppError;
use santorini_common::{AuthEvent, Session};

/// Feed buffer; a listener that falls this far behind skips events
pub(crate) const FEED_CAPACITY: usize = 64;

/// Issues sessions and publishes their lifecycle
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Last persisted session from the local cache. Never touches the network.
    async fn current_session(&self) -> Result<Option<Session>, AppError>;

    /// Exchange credentials for a session. Publishes `SignedIn` on success.
    async fn sign_in_with_password(&self, email: &str, password: &str)
        -> Result<Session, AppError>;

    /// Invalidate the current session. Publishes `SignedOut`.
    async fn sign_out(&self) -> Result<(), AppError>;

    /// Subscribe to the change feed
    fn subscribe(&self) -> Subscription;
}

/// Sending half of the change feed, owned by a provider implementation
#[derive(Debug, Clone)]
pub struct AuthFeed {
    tx: broadcast::Sender<AuthEvent>,
}

impl Default for AuthFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthFeed {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(FEED_CAPACITY);
        Self { tx }
    }

    /// Deliver an event to every live subscription, in emission order
    pub fn emit(&self, event: AuthEvent) {
        // no subscribers is fine: nobody is listening yet
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription { rx: self.tx.subscribe() }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Receiving half of the change feed
#[derive(Debug)]
pub struct Subscription {
    rx: broadcast::Receiver<AuthEvent>,
}

/// What a subscription yields
#[derive(Debug, Clone, PartialEq)]
pub enum FeedItem {
    Event(AuthEvent),
    /// The subscriber fell behind and `missed` events were dropped; its
    /// view of the session may be out of date
    Lagged { missed: u64 },
}

impl Subscription {
    /// Next event or lag notice, or `None` once the provider is gone
    pub async fn recv(&mut self) -> Option<FeedItem> {
        match self.rx.recv().await {
            Ok(event) => Some(FeedItem::Event(event)),
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!(missed, "auth feed subscriber lagged, events skipped");
                Some(FeedItem::Lagged { missed })
            }
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }

    /// Next event, skipping lag notices, or `None` once the provider is gone
    pub async fn next(&mut self) -> Option<AuthEvent> {
        loop {
            match self.recv().await? {
                FeedItem::Event(event) => return Some(event),
                FeedItem::Lagged { .. } => continue,
            }
        }
    }

    /// Stop receiving events
    pub fn unsubscribe(self) {
        drop(self.rx);
    }
}
