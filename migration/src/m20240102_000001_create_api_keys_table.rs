use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.create_table(
            Table::create()
                .table(ApiKeys::Table)
                .if_not_exists()
                .col(
                    ColumnDef::new(ApiKeys::Id).integer().not_null().auto_increment().primary_key()
                )
                .col(ColumnDef::new(ApiKeys::UserId).integer().not_null())
                .col(ColumnDef::new(ApiKeys::Name).string_len(100).not_null())
                .col(ColumnDef::new(ApiKeys::AccessKey).text().not_null())
                .col(ColumnDef::new(ApiKeys::SecretKey).text().not_null())
                .col(ColumnDef::new(ApiKeys::BtcWalletAddress).text().null())
                .col(ColumnDef::new(ApiKeys::EthWalletAddress).text().null())
                .col(
                    ColumnDef::new(ApiKeys::CryptocurrencyType)
                        .string_len(10)
                        .not_null()
                        .default("btc")
                )
                .col(ColumnDef::new(ApiKeys::IsActive).boolean().not_null().default(true))
                .col(ColumnDef::new(ApiKeys::LastCheckedAt).timestamp_with_time_zone().null())
                .col(ColumnDef::new(ApiKeys::DepositCursorAt).timestamp_with_time_zone().null())
                .col(
                    ColumnDef::new(ApiKeys::CreatedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                        .default(Expr::current_timestamp())
                )
                .col(
                    ColumnDef::new(ApiKeys::UpdatedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                        .default(Expr::current_timestamp())
                )
                .foreign_key(
                    ForeignKey::create()
                        .name("fk_api_keys_user")
                        .from(ApiKeys::Table, ApiKeys::UserId)
                        .to(Users::Table, Users::Id)
                        .on_delete(ForeignKeyAction::Cascade)
                )
                .to_owned()
        ).await?;

        manager.create_index(
            Index::create()
                .name("idx_api_keys_is_active")
                .table(ApiKeys::Table)
                .col(ApiKeys::IsActive)
                .to_owned()
        ).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(ApiKeys::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum ApiKeys {
    Table,
    Id,
    UserId,
    Name,
    AccessKey,
    SecretKey,
    BtcWalletAddress,
    EthWalletAddress,
    CryptocurrencyType,
    IsActive,
    LastCheckedAt,
    DepositCursorAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
}
