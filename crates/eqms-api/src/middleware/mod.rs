//! API Middleware
//!
//! Middleware layers for authentication and request context.

pub mod auth;

pub use auth::{extract_token, require_auth, resolve_session, AuthUser, SESSION_COOKIE};
