//! SLA config entity: minutes allotted to a ticket status within an SBU
//!
//! At most one row exists per `(sbu_id, ticket_status)`; the migration
//! enforces it with a unique index.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::ticket::TicketStatus;

/// Warning threshold applied when a config is created without one
pub const DEFAULT_WARNING_THRESHOLD_SECS: i32 = 300;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sla_configs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub sbu_id: Uuid,

    pub ticket_status: TicketStatus,

    /// Minutes allotted before the status is breached
    pub sla_time: i32,

    /// Remaining seconds below which a countdown is flagged as a warning
    pub warning_threshold: i32,

    pub created_at: ChronoDateTimeUtc,

    pub updated_at: ChronoDateTimeUtc,
}

impl Model {
    /// Allotment in seconds (negative values clamp to zero)
    pub fn allotted_seconds(&self) -> u64 {
        u64::try_from(self.sla_time).unwrap_or(0) * 60
    }

    pub fn warning_threshold_seconds(&self) -> u64 {
        u64::try_from(self.warning_threshold).unwrap_or(0)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::sbu::Entity",
        from = "Column::SbuId",
        to = "super::sbu::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Sbu,
}

impl Related<super::sbu::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sbu.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
