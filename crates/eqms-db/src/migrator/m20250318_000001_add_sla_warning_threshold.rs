//! Migration to add warning_threshold column to sla_configs table
//! Countdowns below this many seconds are flagged as a warning

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .alter_table(
                Table::alter()
                    .table(SlaConfigs::Table)
                    .add_column(
                        ColumnDef::new(SlaConfigs::WarningThreshold)
                            .integer()
                            .not_null()
                            .default(300),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .alter_table(
                Table::alter()
                    .table(SlaConfigs::Table)
                    .drop_column(SlaConfigs::WarningThreshold)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum SlaConfigs {
    Table,
    WarningThreshold,
}
