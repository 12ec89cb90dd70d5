//! User profile entity: role and contact attributes

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// User role in the system
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "lowercase")]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum UserRole {
    /// System administrator with full access
    #[sea_orm(string_value = "admin")]
    Admin,

    /// Manages an SBU's tickets and policy
    #[sea_orm(string_value = "manager")]
    Manager,

    /// Works tickets assigned to them
    #[sea_orm(string_value = "agent")]
    Agent,

    /// Submits tickets
    #[sea_orm(string_value = "user")]
    User,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Manager => "manager",
            UserRole::Agent => "agent",
            UserRole::User => "user",
        }
    }

    /// Agents and managers may hold ticket assignments
    pub fn is_assignable(&self) -> bool {
        matches!(self, UserRole::Agent | UserRole::Manager)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(UserRole::Admin),
            "manager" => Ok(UserRole::Manager),
            "agent" => Ok(UserRole::Agent),
            "user" => Ok(UserRole::User),
            _ => Err(format!("Invalid user role: {}", s)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_profiles")]
pub struct Model {
    /// Owning user (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: Uuid,

    pub full_name: Option<String>,

    pub role: UserRole,

    pub phone: Option<String>,

    /// Home SBU (optional)
    pub sbu_id: Option<Uuid>,

    /// Avatar URL in external object storage
    pub avatar_url: Option<String>,

    pub created_at: ChronoDateTimeUtc,

    pub updated_at: ChronoDateTimeUtc,
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
        on_delete = "SetNull"
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
