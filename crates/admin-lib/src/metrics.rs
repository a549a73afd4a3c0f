// ==============
// crates/admin-lib/src/metrics.rs

//! Central place for metric keys
pub const GATE_TRANSITION: &str = "gate.transition";
pub const GATE_FORCED_SIGN_OUT: &str = "gate.forced_sign_out";
pub const PROFILE_FETCH: &str = "profile.fetch";
pub const PROFILE_FETCH_FAILED: &str = "profile.fetch_failed";
pub const PROFILE_FETCH_DISCARDED: &str = "profile.fetch_discarded";
pub const SESSION_REFRESHED: &str = "session.refreshed";
pub const SESSION_REFRESH_FAILED: &str = "session.refresh_failed";
pub const LOGIN_SUCCEEDED: &str = "login.succeeded";
pub const LOGIN_FAILED: &str = "login.failed";
pub const LOGIN_THROTTLED: &str = "login.throttled";
pub const CATALOG_CACHE_HIT: &str = "catalog.cache_hit";
pub const CATALOG_CACHE_MISS: &str = "catalog.cache_miss";
pub const PRODUCT_SAVED: &str = "catalog.product_saved";
pub const IMAGE_UPLOADED: &str = "catalog.image_uploaded";
