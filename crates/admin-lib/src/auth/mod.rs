// ============================
// crates/admin-lib/src/auth/mod.rs
// ============================
//! Authentication module.

pub mod decision;
pub mod gate;
pub mod login;
pub mod provider;
pub mod route;
pub mod session_cache;
pub mod throttle;

pub use decision::{decide, AuthSnapshot, Decision, GatePhase};
pub use gate::SessionGate;
pub use login::{LoginFlow, NOT_OWNER_MESSAGE};
pub use provider::{AuthFeed, FeedItem, IdentityProvider, Subscription};
pub use route::{route_decision, AccountCard, RouteDecision};
pub use session_cache::SessionCache;
pub use throttle::LoginThrottle;
