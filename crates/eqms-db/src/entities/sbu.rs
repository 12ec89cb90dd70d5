//! SBU (strategic business unit) entity: the organisational partition that
//! owns an SLA policy and a tier roster

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// Whether an SBU accepts new tickets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "lowercase")]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum SbuStatus {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "inactive")]
    Inactive,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sbus")]
pub struct Model {
    /// SBU UUID (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Display name (unique)
    #[sea_orm(unique)]
    pub name: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    pub status: SbuStatus,

    pub created_at: ChronoDateTimeUtc,

    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::ticket::Entity")]
    Tickets,

    #[sea_orm(has_many = "super::sla_config::Entity")]
    SlaConfigs,

    #[sea_orm(has_many = "super::tier_assignment::Entity")]
    TierAssignments,
}

impl Related<super::ticket::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tickets.def()
    }
}

impl Related<super::sla_config::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SlaConfigs.def()
    }
}

impl Related<super::tier_assignment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TierAssignments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
