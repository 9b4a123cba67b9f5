use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.create_table(
            Table::create()
                .table(SyncSettings::Table)
                .if_not_exists()
                .col(
                    ColumnDef::new(SyncSettings::Id)
                        .integer()
                        .not_null()
                        .auto_increment()
                        .primary_key()
                )
                .col(ColumnDef::new(SyncSettings::UserId).integer().not_null().unique_key())
                .col(ColumnDef::new(SyncSettings::IsEnabled).boolean().not_null().default(true))
                .col(
                    ColumnDef::new(SyncSettings::BalanceSyncInterval)
                        .integer()
                        .not_null()
                        .default(15)
                )
                .col(
                    ColumnDef::new(SyncSettings::DepositCheckInterval)
                        .integer()
                        .not_null()
                        .default(5)
                )
                .col(ColumnDef::new(SyncSettings::StartTime).string_len(8).not_null().default("00:00"))
                .col(ColumnDef::new(SyncSettings::EndTime).string_len(8).not_null().default("23:59"))
                .col(ColumnDef::new(SyncSettings::RetryCount).integer().not_null().default(3))
                .col(
                    ColumnDef::new(SyncSettings::NotifyOnError)
                        .boolean()
                        .not_null()
                        .default(false)
                )
                .col(
                    ColumnDef::new(SyncSettings::CreatedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                        .default(Expr::current_timestamp())
                )
                .col(
                    ColumnDef::new(SyncSettings::UpdatedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                        .default(Expr::current_timestamp())
                )
                .foreign_key(
                    ForeignKey::create()
                        .name("fk_sync_settings_user")
                        .from(SyncSettings::Table, SyncSettings::UserId)
                        .to(Users::Table, Users::Id)
                        .on_delete(ForeignKeyAction::Cascade)
                )
                .to_owned()
        ).await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(SyncSettings::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum SyncSettings {
    Table,
    Id,
    UserId,
    IsEnabled,
    BalanceSyncInterval,
    DepositCheckInterval,
    StartTime,
    EndTime,
    RetryCount,
    NotifyOnError,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
}
