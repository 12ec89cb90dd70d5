//! Initial schema: organisation, identity, tickets and SLA policy

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ============================================================
        // 1. sbus
        // ============================================================
        manager
            .create_table(
                Table::create()
                    .table(Sbu::Table)
                    .if_not_exists()
                    .col(uuid(Sbu::Id).primary_key())
                    .col(string_len(Sbu::Name, 255).not_null().unique_key())
                    .col(text_null(Sbu::Description))
                    .col(string_len(Sbu::Status, 16).not_null().default("active"))
                    .col(
                        timestamp_with_time_zone(Sbu::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(Sbu::UpdatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // ============================================================
        // 2. users
        // ============================================================
        manager
            .create_table(
                Table::create()
                    .table(User::Table)
                    .if_not_exists()
                    .col(uuid(User::Id).primary_key())
                    .col(string_len(User::Email, 255).not_null().unique_key())
                    .col(boolean(User::IsActive).not_null().default(true))
                    .col(
                        timestamp_with_time_zone(User::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(timestamp_with_time_zone_null(User::LastSignInAt))
                    .to_owned(),
            )
            .await?;

        // ============================================================
        // 3. user_profiles
        // ============================================================
        manager
            .create_table(
                Table::create()
                    .table(UserProfile::Table)
                    .if_not_exists()
                    .col(uuid(UserProfile::UserId).primary_key())
                    .col(string_len_null(UserProfile::FullName, 255))
                    .col(string_len(UserProfile::Role, 32).not_null().default("user"))
                    .col(string_len_null(UserProfile::Phone, 64))
                    .col(uuid_null(UserProfile::SbuId))
                    .col(string_null(UserProfile::AvatarUrl))
                    .col(
                        timestamp_with_time_zone(UserProfile::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(UserProfile::UpdatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_profiles_user_id")
                            .from(UserProfile::Table, UserProfile::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_profiles_sbu_id")
                            .from(UserProfile::Table, UserProfile::SbuId)
                            .to(Sbu::Table, Sbu::Id)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_user_profiles_role")
                    .table(UserProfile::Table)
                    .col(UserProfile::Role)
                    .to_owned(),
            )
            .await?;

        // ============================================================
        // 4. tickets
        // ============================================================
        manager
            .create_table(
                Table::create()
                    .table(Ticket::Table)
                    .if_not_exists()
                    .col(uuid(Ticket::Id).primary_key())
                    .col(string_len(Ticket::Title, 255).not_null())
                    .col(text(Ticket::Description).not_null())
                    .col(string_len(Ticket::Status, 32).not_null().default("new"))
                    .col(
                        string_len(Ticket::Priority, 16)
                            .not_null()
                            .default("medium"),
                    )
                    .col(uuid(Ticket::SbuId).not_null())
                    .col(uuid(Ticket::CreatedBy).not_null())
                    .col(uuid_null(Ticket::AssignedTo))
                    .col(integer(Ticket::SlaTime).not_null().default(0))
                    .col(text_null(Ticket::Resolution))
                    .col(string_len_null(Ticket::CardNumber, 64))
                    .col(string_len_null(Ticket::Module, 128))
                    .col(string_len_null(Ticket::AccountNumber, 64))
                    .col(string_len_null(Ticket::QueryType, 128))
                    .col(
                        timestamp_with_time_zone(Ticket::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(Ticket::UpdatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tickets_sbu_id")
                            .from(Ticket::Table, Ticket::SbuId)
                            .to(Sbu::Table, Sbu::Id)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tickets_created_by")
                            .from(Ticket::Table, Ticket::CreatedBy)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tickets_assigned_to")
                            .from(Ticket::Table, Ticket::AssignedTo)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // The escalation sweep filters on status and orders by creation time
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_tickets_status_created_at")
                    .table(Ticket::Table)
                    .col(Ticket::Status)
                    .col(Ticket::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_tickets_sbu_id")
                    .table(Ticket::Table)
                    .col(Ticket::SbuId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_tickets_assigned_to")
                    .table(Ticket::Table)
                    .col(Ticket::AssignedTo)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_tickets_created_by")
                    .table(Ticket::Table)
                    .col(Ticket::CreatedBy)
                    .to_owned(),
            )
            .await?;

        // ============================================================
        // 5. sla_configs
        // ============================================================
        manager
            .create_table(
                Table::create()
                    .table(SlaConfig::Table)
                    .if_not_exists()
                    .col(uuid(SlaConfig::Id).primary_key())
                    .col(uuid(SlaConfig::SbuId).not_null())
                    .col(string_len(SlaConfig::TicketStatus, 32).not_null())
                    .col(integer(SlaConfig::SlaTime).not_null())
                    .col(
                        timestamp_with_time_zone(SlaConfig::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(SlaConfig::UpdatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_sla_configs_sbu_id")
                            .from(SlaConfig::Table, SlaConfig::SbuId)
                            .to(Sbu::Table, Sbu::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_sla_configs_sbu_status")
                    .table(SlaConfig::Table)
                    .col(SlaConfig::SbuId)
                    .col(SlaConfig::TicketStatus)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ============================================================
        // 6. tier_assignments
        // ============================================================
        manager
            .create_table(
                Table::create()
                    .table(TierAssignment::Table)
                    .if_not_exists()
                    .col(uuid(TierAssignment::Id).primary_key())
                    .col(uuid(TierAssignment::UserId).not_null())
                    .col(uuid(TierAssignment::SbuId).not_null())
                    .col(string_len(TierAssignment::Tier, 16).not_null())
                    .col(
                        timestamp_with_time_zone(TierAssignment::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tier_assignments_user_id")
                            .from(TierAssignment::Table, TierAssignment::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tier_assignments_sbu_id")
                            .from(TierAssignment::Table, TierAssignment::SbuId)
                            .to(Sbu::Table, Sbu::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_tier_assignments_user_sbu")
                    .table(TierAssignment::Table)
                    .col(TierAssignment::UserId)
                    .col(TierAssignment::SbuId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_tier_assignments_sbu_tier")
                    .table(TierAssignment::Table)
                    .col(TierAssignment::SbuId)
                    .col(TierAssignment::Tier)
                    .to_owned(),
            )
            .await?;

        // ============================================================
        // 7. ticket_comments
        // ============================================================
        manager
            .create_table(
                Table::create()
                    .table(TicketComment::Table)
                    .if_not_exists()
                    .col(uuid(TicketComment::Id).primary_key())
                    .col(uuid(TicketComment::TicketId).not_null())
                    .col(uuid(TicketComment::AuthorId).not_null())
                    .col(text(TicketComment::Body).not_null())
                    .col(boolean(TicketComment::IsInternal).not_null().default(false))
                    .col(
                        timestamp_with_time_zone(TicketComment::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ticket_comments_ticket_id")
                            .from(TicketComment::Table, TicketComment::TicketId)
                            .to(Ticket::Table, Ticket::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ticket_comments_author_id")
                            .from(TicketComment::Table, TicketComment::AuthorId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_ticket_comments_ticket_id")
                    .table(TicketComment::Table)
                    .col(TicketComment::TicketId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop tables in reverse order (respecting foreign keys)
        manager
            .drop_table(Table::drop().table(TicketComment::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(TierAssignment::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(SlaConfig::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Ticket::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(UserProfile::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(User::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Sbu::Table).to_owned())
            .await?;

        Ok(())
    }
}

// ============================================================
// Table identifiers
// ============================================================

#[derive(DeriveIden)]
enum Sbu {
    #[sea_orm(iden = "sbus")]
    Table,
    Id,
    Name,
    Description,
    Status,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum User {
    #[sea_orm(iden = "users")]
    Table,
    Id,
    Email,
    IsActive,
    CreatedAt,
    LastSignInAt,
}

#[derive(DeriveIden)]
enum UserProfile {
    #[sea_orm(iden = "user_profiles")]
    Table,
    UserId,
    FullName,
    Role,
    Phone,
    SbuId,
    AvatarUrl,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Ticket {
    #[sea_orm(iden = "tickets")]
    Table,
    Id,
    Title,
    Description,
    Status,
    Priority,
    SbuId,
    CreatedBy,
    AssignedTo,
    SlaTime,
    Resolution,
    CardNumber,
    Module,
    AccountNumber,
    QueryType,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum SlaConfig {
    #[sea_orm(iden = "sla_configs")]
    Table,
    Id,
    SbuId,
    TicketStatus,
    SlaTime,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum TierAssignment {
    #[sea_orm(iden = "tier_assignments")]
    Table,
    Id,
    UserId,
    SbuId,
    Tier,
    CreatedAt,
}

#[derive(DeriveIden)]
enum TicketComment {
    #[sea_orm(iden = "ticket_comments")]
    Table,
    Id,
    TicketId,
    AuthorId,
    Body,
    IsInternal,
    CreatedAt,
}
