//! User entity: identity mirrored from the external auth provider

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// User UUID (same id as the auth provider's subject)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// User email (unique)
    #[sea_orm(unique)]
    pub email: String,

    /// Whether the user account is active
    pub is_active: bool,

    /// When the user account was created
    pub created_at: ChronoDateTimeUtc,

    /// Last time a session for this user was accepted
    pub last_sign_in_at: Option<ChronoDateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// User has one profile
    #[sea_orm(has_one = "super::user_profile::Entity")]
    Profile,

    /// User sits on SBU tiers
    #[sea_orm(has_many = "super::tier_assignment::Entity")]
    TierAssignments,
}

impl Related<super::user_profile::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Profile.def()
    }
}

impl Related<super::tier_assignment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TierAssignments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
