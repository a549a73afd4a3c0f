// ============================
// crates/admin-lib/src/auth/gate.rs
// ============================
//! Session gate: owns the session, resolves the caller's role and publishes
//! an admit/deny decision.
//!
//! The gate starts in a loading phase, reads the persisted session once,
//! then follows the identity provider's feed. Profile fetches run detached
//! from the feed listener; each one carries a ticket naming the identity it
//! was issued for, and its result is committed only while that ticket is
//! still the one the gate is waiting on.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use metrics::counter;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::decision::{AuthSnapshot, GatePhase};
use super::provider::{FeedItem, IdentityProvider};
use crate::error::AppError;
use crate::metrics::{
    GATE_FORCED_SIGN_OUT, GATE_TRANSITION, PROFILE_FETCH, PROFILE_FETCH_DISCARDED,
    PROFILE_FETCH_FAILED,
};
use crate::storage::ProfileStore;
use santorini_common::{AuthEvent, Profile, Session, UserId};

/// Identifies one profile fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FetchTicket {
    seq: u64,
    user: UserId,
}

#[derive(Debug, Default)]
struct GateState {
    session: Option<Session>,
    profile: Option<Profile>,
    initializing: bool,
    /// Fetch the current identity is waiting on
    pending: Option<FetchTicket>,
    next_seq: u64,
    /// Feed events applied so far
    epoch: u64,
    /// Identity a forced sign-out has already been issued for
    revoked: Option<UserId>,
}

impl GateState {
    fn issue_ticket(&mut self, user: UserId) -> FetchTicket {
        self.next_seq += 1;
        let ticket = FetchTicket { seq: self.next_seq, user };
        self.pending = Some(ticket);
        ticket
    }

    fn current_user(&self) -> Option<UserId> {
        self.session.as_ref().map(Session::user_id)
    }

    fn snapshot(&self) -> AuthSnapshot {
        AuthSnapshot {
            session: self.session.clone(),
            profile: self.profile.clone(),
            loading: self.initializing || self.pending.is_some(),
        }
    }

    /// Claim the forced sign-out for the current identity if its profile
    /// carries a non-owner role. Returns the identity at most once.
    fn claim_revocation(&mut self) -> Option<UserId> {
        let user = self.current_user()?;
        let profile = self.profile.as_ref()?;
        if profile.role.is_owner() || self.revoked == Some(user) {
            return None;
        }
        self.revoked = Some(user);
        Some(user)
    }
}

struct GateInner {
    identity: Arc<dyn IdentityProvider>,
    profiles: Arc<dyn ProfileStore>,
    state: Mutex<GateState>,
    snapshot_tx: watch::Sender<AuthSnapshot>,
    started: AtomicBool,
    mounted: AtomicBool,
    listener: Mutex<Option<JoinHandle<()>>>,
}

/// Process-wide authentication gate. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct SessionGate {
    inner: Arc<GateInner>,
}

impl SessionGate {
    pub fn new(identity: Arc<dyn IdentityProvider>, profiles: Arc<dyn ProfileStore>) -> Self {
        let (snapshot_tx, _) = watch::channel(AuthSnapshot::initial());
        let state = GateState { initializing: true, ..GateState::default() };
        Self {
            inner: Arc::new(GateInner {
                identity,
                profiles,
                state: Mutex::new(state),
                snapshot_tx,
                started: AtomicBool::new(false),
                mounted: AtomicBool::new(true),
                listener: Mutex::new(None),
            }),
        }
    }

    /// Subscribe to the feed and resolve the persisted session. Only the
    /// first call does anything; later calls return immediately.
    pub async fn start(&self) {
        if !self.inner.is_mounted() || self.inner.started.swap(true, Ordering::SeqCst) {
            return;
        }

        // subscribe before reading the cache so no event slips between them
        let mut subscription = self.inner.identity.subscribe();
        let weak: Weak<GateInner> = Arc::downgrade(&self.inner);
        let listener = tokio::spawn(async move {
            while let Some(item) = subscription.recv().await {
                let Some(inner) = weak.upgrade() else { break };
                if !inner.is_mounted() {
                    break;
                }
                match item {
                    FeedItem::Event(event) => inner.handle_event(event),
                    FeedItem::Lagged { missed } => inner.resync(missed).await,
                }
            }
            subscription.unsubscribe();
            debug!("auth feed listener stopped");
        });
        *self.inner.listener.lock() = Some(listener);

        self.inner.initialize().await;
    }

    /// Current state
    pub fn snapshot(&self) -> AuthSnapshot {
        self.inner.snapshot_tx.borrow().clone()
    }

    /// Change notifications; the receiver always holds the latest snapshot
    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.inner.snapshot_tx.subscribe()
    }

    /// Wait until the gate is out of its loading phase
    pub async fn ready(&self) -> AuthSnapshot {
        let mut rx = self.subscribe();
        let result = rx.wait_for(|s| !s.loading).await.map(|s| s.clone());
        // the sender lives as long as `self`, so the channel cannot close here
        result.unwrap_or_else(|_| self.snapshot())
    }

    /// Ask the provider to end the session. State converges when the
    /// provider's `SignedOut` event arrives on the feed.
    pub async fn sign_out(&self) -> Result<(), AppError> {
        info!("sign-out requested");
        self.inner.identity.sign_out().await
    }

    /// Sign out a session whose profile carries a non-owner role, unless
    /// that was already done for this identity
    pub async fn revoke_if_not_owner(&self) {
        self.inner.revoke_if_not_owner().await;
    }

    /// Stop following the feed. Fetches still in flight are discarded when
    /// they resolve; the published snapshot no longer changes.
    pub fn dispose(&self) {
        if !self.inner.mounted.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(listener) = self.inner.listener.lock().take() {
            listener.abort();
        }
        info!("session gate disposed");
    }

    pub fn is_disposed(&self) -> bool {
        !self.inner.is_mounted()
    }
}

impl GateInner {
    fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    async fn initialize(self: &Arc<Self>) {
        let epoch_at_start = self.state.lock().epoch;

        let cached = match self.identity.current_session().await {
            Ok(session) => session,
            Err(err) => {
                warn!(error = %err, "could not read persisted session");
                None
            }
        };
        if !self.is_mounted() {
            return;
        }

        let fetch = {
            let mut st = self.state.lock();
            if st.epoch != epoch_at_start {
                // the feed already delivered something newer
                debug!("feed overtook initialization, cached session ignored");
                None
            } else if let Some(session) = cached {
                let email = session.user.email.clone();
                let ticket = st.issue_ticket(session.user_id());
                st.session = Some(session);
                st.profile = None;
                Some((ticket, email))
            } else {
                None
            }
        };
        self.publish();

        if let Some((ticket, email)) = fetch {
            let profile = self.fetch_profile(ticket.user, email).await;
            self.commit_profile(ticket, profile).await;
        }

        if !self.is_mounted() {
            return;
        }
        self.state.lock().initializing = false;
        self.publish();
        info!(phase = ?self.snapshot_tx.borrow().phase(), "session gate initialized");
    }

    fn handle_event(self: &Arc<Self>, event: AuthEvent) {
        debug!(event = event.kind(), "auth feed event");
        let fetch = {
            let mut st = self.state.lock();
            st.epoch += 1;
            match event {
                AuthEvent::SignedOut => {
                    st.session = None;
                    st.profile = None;
                    st.pending = None;
                    st.revoked = None;
                    None
                }
                AuthEvent::SignedIn(session) | AuthEvent::TokenRefreshed(session) => {
                    let previous = st.current_user();
                    let user = session.user_id();
                    let email = session.user.email.clone();
                    st.session = Some(session);
                    if previous == Some(user) {
                        None
                    } else {
                        st.profile = None;
                        Some((st.issue_ticket(user), email))
                    }
                }
            }
        };
        self.publish();

        if let Some((ticket, email)) = fetch {
            let inner = Arc::clone(self);
            tokio::spawn(async move {
                let profile = inner.fetch_profile(ticket.user, email).await;
                inner.commit_profile(ticket, profile).await;
            });
        }
    }

    /// Rebuild state from the provider after the feed dropped events. The
    /// profile is fetched again even for the same identity, since a skipped
    /// sign-out and sign-in may have changed it.
    async fn resync(self: &Arc<Self>, missed: u64) {
        let current = match self.identity.current_session().await {
            Ok(session) => session,
            Err(err) => {
                warn!(error = %err, "could not re-read session after feed lag");
                None
            }
        };
        if !self.is_mounted() {
            return;
        }
        info!(missed, signed_in = current.is_some(), "resyncing session gate after feed lag");
        let fetch = {
            let mut st = self.state.lock();
            st.epoch += 1;
            match current {
                Some(session) => {
                    let user = session.user_id();
                    let email = session.user.email.clone();
                    if st.revoked != Some(user) {
                        st.revoked = None;
                    }
                    st.session = Some(session);
                    st.profile = None;
                    Some((st.issue_ticket(user), email))
                }
                None => {
                    st.session = None;
                    st.profile = None;
                    st.pending = None;
                    st.revoked = None;
                    None
                }
            }
        };
        self.publish();

        if let Some((ticket, email)) = fetch {
            let inner = Arc::clone(self);
            tokio::spawn(async move {
                let profile = inner.fetch_profile(ticket.user, email).await;
                inner.commit_profile(ticket, profile).await;
            });
        }
    }

    /// Profile lookup. Misses and failures both come back as `None`.
    async fn fetch_profile(&self, user: UserId, email: Option<String>) -> Option<Profile> {
        counter!(PROFILE_FETCH).increment(1);
        match self.profiles.get_by_user_id(user).await {
            Ok(Some(profile)) => Some(profile.with_email(email)),
            Ok(None) => {
                debug!(%user, "no profile for user");
                None
            }
            Err(err) => {
                counter!(PROFILE_FETCH_FAILED).increment(1);
                warn!(%user, error = %err, "profile fetch failed, treating as no profile");
                None
            }
        }
    }

    async fn commit_profile(self: &Arc<Self>, ticket: FetchTicket, profile: Option<Profile>) {
        if !self.is_mounted() {
            counter!(PROFILE_FETCH_DISCARDED).increment(1);
            return;
        }
        {
            let mut st = self.state.lock();
            if st.pending != Some(ticket) || st.current_user() != Some(ticket.user) {
                counter!(PROFILE_FETCH_DISCARDED).increment(1);
                debug!(user = %ticket.user, seq = ticket.seq, "stale profile fetch discarded");
                return;
            }
            st.pending = None;
            st.profile = profile;
        }
        self.publish();
        self.revoke_if_not_owner().await;
    }

    async fn revoke_if_not_owner(&self) {
        if !self.is_mounted() {
            return;
        }
        let Some(user) = self.state.lock().claim_revocation() else {
            return;
        };
        counter!(GATE_FORCED_SIGN_OUT).increment(1);
        warn!(%user, "profile is not an owner, signing the session out");
        if let Err(err) = self.identity.sign_out().await {
            warn!(%user, error = %err, "forced sign-out failed");
        }
    }

    fn publish(&self) {
        if !self.is_mounted() {
            return;
        }
        // hold the state lock while sending so snapshots go out in order
        let st = self.state.lock();
        let next = st.snapshot();
        let previous = self.snapshot_tx.send_replace(next);
        let phase = self.snapshot_tx.borrow().phase();
        if previous.phase() != phase {
            counter!(GATE_TRANSITION, "phase" => phase_label(phase)).increment(1);
            debug!(from = ?previous.phase(), to = ?phase, "gate phase changed");
        }
    }
}

impl Drop for GateInner {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.get_mut().take() {
            listener.abort();
        }
    }
}

fn phase_label(phase: GatePhase) -> &'static str {
    match phase {
        GatePhase::Loading => "loading",
        GatePhase::Granted => "granted",
        GatePhase::Denied => "denied",
    }
}
