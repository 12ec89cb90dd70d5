use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use eqms_control::{EmailTemplate, SlaCountdown};
use eqms_db::entities::{sbu, sla_config, ticket, ticket_comment, tier_assignment, user, user_profile};
use eqms_db::{SbuStatus, Tier, TicketPriority, TicketStatus, UserRole};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Error code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
    /// Number of connected event stream subscribers
    pub event_subscribers: usize,
}

/// Public authentication settings
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthConfig {
    /// Name of the session cookie set by the callback
    pub cookie_name: String,
    /// Expected token issuer, if enforced
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
}

/// Query for the auth provider redirect
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AuthCallbackQuery {
    /// Session token issued by the auth provider
    pub token: String,
}

/// `?id=` selector used by PUT/DELETE on collection routes
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct IdQuery {
    pub id: Uuid,
}

// ============================================================
// Tickets
// ============================================================

/// Ticket with its live SLA countdown
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Ticket {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub status: TicketStatus,
    pub priority: TicketPriority,
    pub sbu_id: Uuid,
    pub created_by: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<Uuid>,
    /// Minutes allotted for the current status
    pub sla_time: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Countdown computed at response time
    pub sla: SlaCountdown,
}

impl Ticket {
    pub fn from_model(model: ticket::Model, sla: SlaCountdown) -> Self {
        Self {
            id: model.id,
            title: model.title,
            description: model.description,
            status: model.status,
            priority: model.priority,
            sbu_id: model.sbu_id,
            created_by: model.created_by,
            assigned_to: model.assigned_to,
            sla_time: model.sla_time,
            resolution: model.resolution,
            card_number: model.card_number,
            module: model.module,
            account_number: model.account_number,
            query_type: model.query_type,
            created_at: model.created_at,
            updated_at: model.updated_at,
            sla,
        }
    }
}

/// Paginated ticket list
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TicketList {
    pub tickets: Vec<Ticket>,
    /// Total matching tickets
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Ticket list filters
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct TicketListQuery {
    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
    pub sbu_id: Option<Uuid>,
    /// Zero-based page (default: 0)
    pub page: Option<u64>,
    /// Page size (default: 50, max: 200)
    pub per_page: Option<u64>,
}

/// Create ticket request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateTicketRequest {
    pub title: String,
    pub description: String,
    pub priority: TicketPriority,
    pub sbu_id: Uuid,
    #[serde(default)]
    pub card_number: Option<String>,
    #[serde(default)]
    pub module: Option<String>,
    #[serde(default)]
    pub account_number: Option<String>,
    #[serde(default)]
    pub query_type: Option<String>,
}

/// Partial ticket update
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateTicketRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub card_number: Option<String>,
    pub module: Option<String>,
    pub account_number: Option<String>,
    pub query_type: Option<String>,
    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
    pub assigned_to: Option<Uuid>,
    pub resolution: Option<String>,
}

/// Status change request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    pub ticket_id: Uuid,
    pub status: TicketStatus,
    /// Required when resolving
    #[serde(default)]
    pub resolution: Option<String>,
}

/// Priority change request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdatePriorityRequest {
    pub ticket_id: Uuid,
    pub priority: TicketPriority,
}

/// SLA countdown for a single ticket
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TicketSla {
    pub ticket_id: Uuid,
    pub status: TicketStatus,
    pub sla: SlaCountdown,
    /// `HH:MM:SS`, or `--:--:--` when the clock is not running
    pub display: String,
    /// Status the ticket will move to when the clock runs out
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escalates_to: Option<TicketStatus>,
}

// ============================================================
// Comments
// ============================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Comment {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub author_id: Uuid,
    pub body: String,
    pub is_internal: bool,
    pub created_at: DateTime<Utc>,
}

impl From<ticket_comment::Model> for Comment {
    fn from(m: ticket_comment::Model) -> Self {
        Self {
            id: m.id,
            ticket_id: m.ticket_id,
            author_id: m.author_id,
            body: m.body,
            is_internal: m.is_internal,
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateCommentRequest {
    pub body: String,
    /// Only visible to staff
    #[serde(default)]
    pub is_internal: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CommentList {
    pub comments: Vec<Comment>,
    pub total: usize,
}

// ============================================================
// SBUs
// ============================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Sbu {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: SbuStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<sbu::Model> for Sbu {
    fn from(m: sbu::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            description: m.description,
            status: m.status,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SbuList {
    pub sbus: Vec<Sbu>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateSbuRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<SbuStatus>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateSbuRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<SbuStatus>,
}

// ============================================================
// SLA configs
// ============================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SlaConfig {
    pub id: Uuid,
    pub sbu_id: Uuid,
    pub ticket_status: TicketStatus,
    /// Minutes allotted to the status
    pub sla_time: i32,
    /// Seconds before expiry at which the countdown warns
    pub warning_threshold: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Owning SBU (included on create and update)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sbu: Option<Sbu>,
}

impl SlaConfig {
    pub fn from_model(m: sla_config::Model, sbu: Option<sbu::Model>) -> Self {
        Self {
            id: m.id,
            sbu_id: m.sbu_id,
            ticket_status: m.ticket_status,
            sla_time: m.sla_time,
            warning_threshold: m.warning_threshold,
            created_at: m.created_at,
            updated_at: m.updated_at,
            sbu: sbu.map(Sbu::from),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SlaConfigList {
    pub configs: Vec<SlaConfig>,
    pub total: usize,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct SlaConfigQuery {
    pub sbu_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateSlaConfigRequest {
    pub sbu_id: Uuid,
    /// `open` is accepted for `new`
    pub ticket_status: TicketStatus,
    pub sla_time: i32,
    #[serde(default)]
    pub warning_threshold: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateSlaConfigRequest {
    pub ticket_status: Option<TicketStatus>,
    pub sla_time: Option<i32>,
    pub warning_threshold: Option<i32>,
}

// ============================================================
// Tier assignments
// ============================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TierAssignment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub sbu_id: Uuid,
    pub tier: Tier,
    pub created_at: DateTime<Utc>,
}

impl From<tier_assignment::Model> for TierAssignment {
    fn from(m: tier_assignment::Model) -> Self {
        Self {
            id: m.id,
            user_id: m.user_id,
            sbu_id: m.sbu_id,
            tier: m.tier,
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TierAssignmentList {
    pub assignments: Vec<TierAssignment>,
    pub total: usize,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct TierAssignmentQuery {
    pub sbu_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
}

/// Place a user on a tier; replaces any existing tier for the same SBU
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateTierAssignmentRequest {
    pub user_id: Uuid,
    pub sbu_id: Uuid,
    pub tier: Tier,
}

// ============================================================
// Users
// ============================================================

/// User with profile attributes
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub is_active: bool,
    pub role: UserRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sbu_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sign_in_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn from_models(account: user::Model, profile: Option<user_profile::Model>) -> Self {
        let (role, full_name, phone, sbu_id, avatar_url) = match profile {
            Some(p) => (p.role, p.full_name, p.phone, p.sbu_id, p.avatar_url),
            None => (UserRole::User, None, None, None, None),
        };

        Self {
            id: account.id,
            email: account.email,
            is_active: account.is_active,
            role,
            full_name,
            phone,
            sbu_id,
            avatar_url,
            created_at: account.created_at,
            last_sign_in_at: account.last_sign_in_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserList {
    pub users: Vec<User>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateUserRequest {
    pub email: String,
    pub role: UserRole,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub sbu_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateUserRequest {
    pub role: Option<UserRole>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub sbu_id: Option<Uuid>,
    pub avatar_url: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UserSearchQuery {
    /// Matches email or full name
    pub q: Option<String>,
    pub role: Option<UserRole>,
    pub sbu_id: Option<Uuid>,
}

// ============================================================
// Email and analytics
// ============================================================

/// Send a templated email about a ticket
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SendEmailRequest {
    pub to: Vec<String>,
    pub template: EmailTemplate,
    pub ticket_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EmailAccepted {
    pub queued: usize,
}

/// Ticket counts for dashboards
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AnalyticsSummary {
    pub total: u64,
    pub by_status: BTreeMap<String, u64>,
    pub by_priority: BTreeMap<String, u64>,
    /// Tickets whose SLA clock has run out
    pub breached: u64,
    /// Tickets inside their warning window
    pub warning: u64,
}
