//! Ticket entity: a query submitted to an SBU and tracked under SLA

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::tier_assignment::Tier;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// Lifecycle status of a ticket
///
/// The wire value `open` is accepted as an alias of `new`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "snake_case")]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum TicketStatus {
    /// Submitted, not yet picked up
    #[sea_orm(string_value = "new")]
    #[serde(alias = "open")]
    New,

    /// Assigned to an agent or manager
    #[sea_orm(string_value = "assigned")]
    Assigned,

    /// Being worked on
    #[sea_orm(string_value = "in_progress")]
    InProgress,

    /// SLA breached once, handled by tier 1
    #[sea_orm(string_value = "escalated_tier1")]
    EscalatedTier1,

    /// Handled by tier 2
    #[sea_orm(string_value = "escalated_tier2")]
    EscalatedTier2,

    /// Handled by tier 3 (escalation ceiling)
    #[sea_orm(string_value = "escalated_tier3")]
    EscalatedTier3,

    /// Resolved with a resolution note
    #[sea_orm(string_value = "resolved")]
    Resolved,

    /// Closed by an administrator
    #[sea_orm(string_value = "closed")]
    Closed,
}

impl TicketStatus {
    pub const ALL: [TicketStatus; 8] = [
        TicketStatus::New,
        TicketStatus::Assigned,
        TicketStatus::InProgress,
        TicketStatus::EscalatedTier1,
        TicketStatus::EscalatedTier2,
        TicketStatus::EscalatedTier3,
        TicketStatus::Resolved,
        TicketStatus::Closed,
    ];

    /// Statuses the escalation sweep looks at
    pub const ESCALATING: [TicketStatus; 3] = [
        TicketStatus::New,
        TicketStatus::EscalatedTier1,
        TicketStatus::EscalatedTier2,
    ];

    /// Next status when the SLA for this status is breached
    ///
    /// `escalated_tier3` is the ceiling; paused statuses never escalate.
    pub fn next_escalation(&self) -> Option<TicketStatus> {
        match self {
            TicketStatus::New => Some(TicketStatus::EscalatedTier1),
            TicketStatus::EscalatedTier1 => Some(TicketStatus::EscalatedTier2),
            TicketStatus::EscalatedTier2 => Some(TicketStatus::EscalatedTier3),
            TicketStatus::EscalatedTier3
            | TicketStatus::Assigned
            | TicketStatus::InProgress
            | TicketStatus::Resolved
            | TicketStatus::Closed => None,
        }
    }

    /// Statuses for which the SLA clock is not displayed or enforced
    pub fn is_paused(&self) -> bool {
        matches!(
            self,
            TicketStatus::Assigned
                | TicketStatus::InProgress
                | TicketStatus::Resolved
                | TicketStatus::Closed
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TicketStatus::Resolved | TicketStatus::Closed)
    }

    /// Roster tier responsible for an escalated status
    pub fn escalation_tier(&self) -> Option<Tier> {
        match self {
            TicketStatus::EscalatedTier1 => Some(Tier::Tier1),
            TicketStatus::EscalatedTier2 => Some(Tier::Tier2),
            TicketStatus::EscalatedTier3 => Some(Tier::Tier3),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::New => "new",
            TicketStatus::Assigned => "assigned",
            TicketStatus::InProgress => "in_progress",
            TicketStatus::EscalatedTier1 => "escalated_tier1",
            TicketStatus::EscalatedTier2 => "escalated_tier2",
            TicketStatus::EscalatedTier3 => "escalated_tier3",
            TicketStatus::Resolved => "resolved",
            TicketStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "new" | "open" => Ok(TicketStatus::New),
            "assigned" => Ok(TicketStatus::Assigned),
            "in_progress" => Ok(TicketStatus::InProgress),
            "escalated_tier1" => Ok(TicketStatus::EscalatedTier1),
            "escalated_tier2" => Ok(TicketStatus::EscalatedTier2),
            "escalated_tier3" => Ok(TicketStatus::EscalatedTier3),
            "resolved" => Ok(TicketStatus::Resolved),
            "closed" => Ok(TicketStatus::Closed),
            _ => Err(format!("Invalid ticket status: {}", s)),
        }
    }
}

/// Ticket priority
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "lowercase")]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum TicketPriority {
    #[sea_orm(string_value = "low")]
    Low,
    #[sea_orm(string_value = "medium")]
    Medium,
    #[sea_orm(string_value = "high")]
    High,
    #[sea_orm(string_value = "urgent")]
    Urgent,
}

impl TicketPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketPriority::Low => "low",
            TicketPriority::Medium => "medium",
            TicketPriority::High => "high",
            TicketPriority::Urgent => "urgent",
        }
    }
}

impl fmt::Display for TicketPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tickets")]
pub struct Model {
    /// Ticket UUID (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub title: String,

    #[sea_orm(column_type = "Text")]
    pub description: String,

    pub status: TicketStatus,

    pub priority: TicketPriority,

    /// Owning business unit
    pub sbu_id: Uuid,

    /// User who submitted the ticket
    pub created_by: Uuid,

    /// Agent or manager currently handling the ticket
    pub assigned_to: Option<Uuid>,

    /// Minutes allotted for the current status
    pub sla_time: i32,

    /// Resolution note, required when resolving
    #[sea_orm(column_type = "Text", nullable)]
    pub resolution: Option<String>,

    pub card_number: Option<String>,

    pub module: Option<String>,

    pub account_number: Option<String>,

    pub query_type: Option<String>,

    pub created_at: ChronoDateTimeUtc,

    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Ticket belongs to an SBU
    #[sea_orm(
        belongs_to = "super::sbu::Entity",
        from = "Column::SbuId",
        to = "super::sbu::Column::Id",
        on_update = "Cascade",
        on_delete = "Restrict"
    )]
    Sbu,

    /// Ticket was created by a user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::CreatedBy",
        to = "super::user::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Creator,

    /// Ticket is assigned to a user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::AssignedTo",
        to = "super::user::Column::Id",
        on_update = "Cascade",
        on_delete = "SetNull"
    )]
    Assignee,

    /// Ticket has comments
    #[sea_orm(has_many = "super::ticket_comment::Entity")]
    Comments,
}

impl Related<super::sbu::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sbu.def()
    }
}

impl Related<super::ticket_comment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_open_alias() {
        let status: TicketStatus = serde_json::from_str("\"open\"").unwrap();
        assert_eq!(status, TicketStatus::New);
        assert_eq!("open".parse::<TicketStatus>().unwrap(), TicketStatus::New);
    }

    #[test]
    fn test_status_wire_format() {
        for status in TicketStatus::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }

    #[test]
    fn test_next_escalation_chain() {
        assert_eq!(
            TicketStatus::New.next_escalation(),
            Some(TicketStatus::EscalatedTier1)
        );
        assert_eq!(
            TicketStatus::EscalatedTier1.next_escalation(),
            Some(TicketStatus::EscalatedTier2)
        );
        assert_eq!(
            TicketStatus::EscalatedTier2.next_escalation(),
            Some(TicketStatus::EscalatedTier3)
        );
        assert_eq!(TicketStatus::EscalatedTier3.next_escalation(), None);

        for status in TicketStatus::ALL.iter().filter(|s| s.is_paused()) {
            assert_eq!(status.next_escalation(), None);
        }
    }

    #[test]
    fn test_escalating_set_matches_successors() {
        for status in TicketStatus::ALL {
            assert_eq!(
                TicketStatus::ESCALATING.contains(&status),
                status.next_escalation().is_some()
            );
        }
    }

    #[test]
    fn test_status_rejects_unknown() {
        assert!("pending".parse::<TicketStatus>().is_err());
        assert!(serde_json::from_str::<TicketStatus>("\"pending\"").is_err());
    }
}
