//! Route-level view of the gate: render, redirect to login, or wait.
use serde::Serialize;

use super::decision::{AuthSnapshot, GatePhase};

const FALLBACK_NAME: &str = "Admin User";

/// Account details shown in the console header
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountCard {
    pub name: String,
    pub email: String,
    /// Empty when the profile has no avatar; clients render initials
    pub avatar: String,
}

impl AccountCard {
    pub fn from_snapshot(snapshot: &AuthSnapshot) -> Self {
        let profile = snapshot.profile.as_ref();
        let name = profile
            .map(|p| p.full_name.trim())
            .filter(|n| !n.is_empty())
            .unwrap_or(FALLBACK_NAME)
            .to_string();
        let email = profile
            .and_then(|p| p.email.clone())
            .or_else(|| snapshot.identity().and_then(|i| i.email.clone()))
            .unwrap_or_default();
        let avatar = profile.and_then(|p| p.avatar_url.clone()).unwrap_or_default();
        Self { name, email, avatar }
    }
}

/// What a protected route should do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// Gate still loading; show a spinner, decide nothing
    Loading,
    /// Send the caller to the login page. `revoke` is set when the session
    /// belongs to a non-owner and must be signed out as well.
    Redirect { location: String, revoke: bool },
    /// Owner: render the protected subtree
    Render(AccountCard),
}

pub fn route_decision(snapshot: &AuthSnapshot, login_path: &str) -> RouteDecision {
    match snapshot.phase() {
        GatePhase::Loading => RouteDecision::Loading,
        GatePhase::Granted => RouteDecision::Render(AccountCard::from_snapshot(snapshot)),
        GatePhase::Denied => {
            let revoke = snapshot.session.is_some()
                && snapshot.profile.as_ref().is_some_and(|p| !p.role.is_owner());
            RouteDecision::Redirect { location: login_path.to_string(), revoke }
        }
    }
}
