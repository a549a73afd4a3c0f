//! Authorization decision and the snapshot the gate publishes.
use serde::Serialize;

use santorini_common::{Identity, Profile, Session};

/// Outcome of the owner check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Granted,
    Denied,
}

/// Granted iff a session is present and its profile carries the owner role
pub fn decide(session: Option<&Session>, profile: Option<&Profile>) -> Decision {
    match (session, profile) {
        (Some(_), Some(p)) if p.role.is_owner() => Decision::Granted,
        _ => Decision::Denied,
    }
}

/// What the presentation layer should show
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GatePhase {
    Loading,
    Granted,
    Denied,
}

/// Point-in-time view of the gate
#[derive(Debug, Clone, PartialEq)]
pub struct AuthSnapshot {
    pub session: Option<Session>,
    pub profile: Option<Profile>,
    /// True while initializing or while a profile fetch for the current
    /// identity is outstanding
    pub loading: bool,
}

impl AuthSnapshot {
    pub(crate) fn initial() -> Self {
        Self { session: None, profile: None, loading: true }
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.session.as_ref().map(Session::identity)
    }

    pub fn decision(&self) -> Decision {
        decide(self.session.as_ref(), self.profile.as_ref())
    }

    /// Never `Granted` while loading
    pub fn phase(&self) -> GatePhase {
        if self.loading {
            return GatePhase::Loading;
        }
        match self.decision() {
            Decision::Granted => GatePhase::Granted,
            Decision::Denied => GatePhase::Denied,
        }
    }

    pub fn is_granted(&self) -> bool {
        self.phase() == GatePhase::Granted
    }
}
