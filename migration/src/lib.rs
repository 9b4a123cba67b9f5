pub use sea_orm_migration::prelude::*;

mod m20240101_000001_create_users_table;
mod m20240102_000001_create_api_keys_table;
mod m20240103_000001_create_balances_table;
mod m20240104_000001_create_transactions_table;
mod m20240105_000001_create_sync_settings_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_users_table::Migration),
            Box::new(m20240102_000001_create_api_keys_table::Migration),
            Box::new(m20240103_000001_create_balances_table::Migration),
            Box::new(m20240104_000001_create_transactions_table::Migration),
            Box::new(m20240105_000001_create_sync_settings_table::Migration)
        ]
    }
}
