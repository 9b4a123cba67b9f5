use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.create_table(
            Table::create()
                .table(Transactions::Table)
                .if_not_exists()
                .col(
                    ColumnDef::new(Transactions::Id)
                        .integer()
                        .not_null()
                        .auto_increment()
                        .primary_key()
                )
                .col(ColumnDef::new(Transactions::UserId).integer().not_null())
                .col(ColumnDef::new(Transactions::ApiKeyId).integer().not_null())
                .col(ColumnDef::new(Transactions::Type).string_len(20).not_null())
                .col(ColumnDef::new(Transactions::Status).string_len(20).not_null())
                .col(ColumnDef::new(Transactions::DepositId).string().null())
                .col(ColumnDef::new(Transactions::DepositAmount).string_len(50).null())
                .col(ColumnDef::new(Transactions::PurchaseId).string().null())
                .col(ColumnDef::new(Transactions::PurchaseAmount).string_len(50).null())
                .col(ColumnDef::new(Transactions::PurchaseRate).string_len(50).null())
                .col(ColumnDef::new(Transactions::TransferId).string().null())
                .col(ColumnDef::new(Transactions::TransferAmount).string_len(50).null())
                .col(ColumnDef::new(Transactions::WalletAddress).string().null())
                .col(ColumnDef::new(Transactions::ErrorMessage).text().null())
                .col(ColumnDef::new(Transactions::RawData).text().null())
                .col(
                    ColumnDef::new(Transactions::CreatedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                        .default(Expr::current_timestamp())
                )
                .col(
                    ColumnDef::new(Transactions::UpdatedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                        .default(Expr::current_timestamp())
                )
                .foreign_key(
                    ForeignKey::create()
                        .name("fk_transactions_api_key")
                        .from(Transactions::Table, Transactions::ApiKeyId)
                        .to(ApiKeys::Table, ApiKeys::Id)
                        .on_delete(ForeignKeyAction::Cascade)
                )
                .foreign_key(
                    ForeignKey::create()
                        .name("fk_transactions_user")
                        .from(Transactions::Table, Transactions::UserId)
                        .to(Users::Table, Users::Id)
                        .on_delete(ForeignKeyAction::Cascade)
                )
                .to_owned()
        ).await?;

        // Deposit dedupe lookups
        manager.create_index(
            Index::create()
                .name("idx_transactions_api_key_deposit")
                .table(Transactions::Table)
                .col(Transactions::ApiKeyId)
                .col(Transactions::DepositId)
                .to_owned()
        ).await?;

        manager.create_index(
            Index::create()
                .name("idx_transactions_created_at")
                .table(Transactions::Table)
                .col(Transactions::CreatedAt)
                .to_owned()
        ).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Transactions::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum Transactions {
    Table,
    Id,
    UserId,
    ApiKeyId,
    Type,
    Status,
    DepositId,
    DepositAmount,
    PurchaseId,
    PurchaseAmount,
    PurchaseRate,
    TransferId,
    TransferAmount,
    WalletAddress,
    ErrorMessage,
    RawData,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ApiKeys {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
}
