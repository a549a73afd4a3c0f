// crates/admin-lib/src/middleware/mod.rs

//! Middleware for the admin HTTP API.

pub mod guard;

pub use guard::require_owner;
