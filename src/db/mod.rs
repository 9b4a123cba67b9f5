use chrono::{ DateTime, Utc };
use sea_orm::{
    entity::prelude::*,
    sea_query::{ Expr, Func, SimpleExpr },
    ConnectionTrait,
    DatabaseConnection,
    QueryOrder,
};

use crate::error::{ AppError, Result };

pub mod entity;
pub use entity::*;

mod ledger_repository;
pub use ledger_repository::{ LedgerEntry, LedgerOwner, LedgerRepository };

mod balance_repository;
pub use balance_repository::BalanceRepository;

pub struct CredentialRepository {
    db: DatabaseConnection,
}

impl CredentialRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn find_active(&self) -> Result<Vec<entity::api_key::Model>> {
        let credentials = entity::api_key::Entity
            ::find()
            .filter(entity::api_key::Column::IsActive.eq(true))
            .order_by_asc(entity::api_key::Column::Id)
            .all(&self.db).await?;

        Ok(credentials)
    }

    /// Active credential by id; `None` when missing or deactivated.
    pub async fn find_active_by_id(&self, id: i32) -> Result<Option<entity::api_key::Model>> {
        let credential = entity::api_key::Entity
            ::find_by_id(id)
            .filter(entity::api_key::Column::IsActive.eq(true))
            .one(&self.db).await?;

        Ok(credential)
    }

    /// Record a settlement pass: both the check time and the new deposit cursor.
    pub async fn mark_checked<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: i32,
        checked_at: DateTime<Utc>,
        deposit_cursor: DateTime<Utc>
    ) -> Result<()> {
        self.update_checked(conn, id, checked_at, Expr::value(deposit_cursor)).await
    }

    /// Record a balance sync. The deposit cursor is left alone once set; a
    /// credential that has never been settled gets `seed` so the advanced
    /// `last_checked_at` cannot hide deposits from settlement.
    pub async fn mark_balance_checked<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: i32,
        checked_at: DateTime<Utc>,
        seed: DateTime<Utc>
    ) -> Result<()> {
        let cursor = Func::coalesce([
            Expr::col(entity::api_key::Column::DepositCursorAt).into(),
            Expr::value(seed),
        ]);

        self.update_checked(conn, id, checked_at, cursor.into()).await
    }

    async fn update_checked<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: i32,
        checked_at: DateTime<Utc>,
        deposit_cursor: SimpleExpr
    ) -> Result<()> {
        let result = entity::api_key::Entity
            ::update_many()
            .col_expr(entity::api_key::Column::LastCheckedAt, Expr::value(checked_at))
            .col_expr(entity::api_key::Column::DepositCursorAt, deposit_cursor)
            .col_expr(entity::api_key::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(entity::api_key::Column::Id.eq(id))
            .exec(conn).await?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound(format!("Credential {} not found", id)));
        }

        Ok(())
    }
}
