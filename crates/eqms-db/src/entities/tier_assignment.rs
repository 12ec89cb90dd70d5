//! Tier assignment entity: places a user on a tier of an SBU roster
//!
//! A user holds at most one tier per SBU (unique `(user_id, sbu_id)`).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// Escalation tier within an SBU
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "lowercase")]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum Tier {
    #[sea_orm(string_value = "tier1")]
    Tier1,
    #[sea_orm(string_value = "tier2")]
    Tier2,
    #[sea_orm(string_value = "tier3")]
    Tier3,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Tier1 => f.write_str("tier1"),
            Tier::Tier2 => f.write_str("tier2"),
            Tier::Tier3 => f.write_str("tier3"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tier_assignments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub user_id: Uuid,

    pub sbu_id: Uuid,

    pub tier: Tier,

    pub created_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    User,

    #[sea_orm(
        belongs_to = "super::sbu::Entity",
        from = "Column::SbuId",
        to = "super::sbu::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Sbu,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::sbu::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sbu.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
