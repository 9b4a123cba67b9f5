use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.create_table(
            Table::create()
                .table(Balances::Table)
                .if_not_exists()
                .col(
                    ColumnDef::new(Balances::Id).integer().not_null().auto_increment().primary_key()
                )
                .col(ColumnDef::new(Balances::ApiKeyId).integer().not_null())
                .col(ColumnDef::new(Balances::Jpy).string_len(50).not_null().default("0"))
                .col(ColumnDef::new(Balances::Btc).string_len(50).not_null().default("0"))
                .col(ColumnDef::new(Balances::Eth).string_len(50).not_null().default("0"))
                .col(ColumnDef::new(Balances::JpyReserved).string_len(50).not_null().default("0"))
                .col(ColumnDef::new(Balances::BtcReserved).string_len(50).not_null().default("0"))
                .col(ColumnDef::new(Balances::EthReserved).string_len(50).not_null().default("0"))
                .col(ColumnDef::new(Balances::LastCheckedAt).timestamp_with_time_zone().not_null())
                .col(
                    ColumnDef::new(Balances::CreatedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                        .default(Expr::current_timestamp())
                )
                .col(
                    ColumnDef::new(Balances::UpdatedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                        .default(Expr::current_timestamp())
                )
                .foreign_key(
                    ForeignKey::create()
                        .name("fk_balances_api_key")
                        .from(Balances::Table, Balances::ApiKeyId)
                        .to(ApiKeys::Table, ApiKeys::Id)
                        .on_delete(ForeignKeyAction::Cascade)
                )
                .to_owned()
        ).await?;

        // One cached snapshot per credential; the upsert conflicts on this.
        manager.create_index(
            Index::create()
                .name("idx_balances_api_key_id")
                .table(Balances::Table)
                .col(Balances::ApiKeyId)
                .unique()
                .to_owned()
        ).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Balances::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum Balances {
    Table,
    Id,
    ApiKeyId,
    Jpy,
    Btc,
    Eth,
    JpyReserved,
    BtcReserved,
    EthReserved,
    LastCheckedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ApiKeys {
    Table,
    Id,
}
