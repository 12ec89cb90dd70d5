//! Route handlers, grouped by resource

pub mod analytics;
pub mod auth;
pub mod comments;
pub mod email;
pub mod events;
pub mod sbus;
pub mod sla_configs;
pub mod system;
pub mod tickets;
pub mod tier_assignments;
pub mod users;

use eqms_control::{Action, Ownership};

use crate::error::ApiResult;
use crate::middleware::AuthUser;

/// Require a permission that is not tied to a particular ticket
pub(crate) fn require(user: &AuthUser, action: Action) -> ApiResult<()> {
    user.actor().require(action, Ownership::none())?;
    Ok(())
}

/// Trim an optional text field, mapping blank input to `None`
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
