use chrono::{ DateTime, Utc };
use sea_orm::{ sea_query::OnConflict, ConnectionTrait, EntityTrait, Set };

use crate::db::entity::{ balance, Balance };
use crate::error::Result;
use crate::exchange::BalanceSnapshot;

/// Writes the per-credential balance cache. Stateless; callers pass the
/// connection or transaction to write through.
pub struct BalanceRepository;

impl BalanceRepository {
    /// Overwrite the credential's cached balance in a single statement.
    pub async fn upsert<C: ConnectionTrait>(
        &self,
        conn: &C,
        api_key_id: i32,
        snapshot: &BalanceSnapshot,
        checked_at: DateTime<Utc>
    ) -> Result<()> {
        let now = Utc::now();

        let row = balance::ActiveModel {
            api_key_id: Set(api_key_id),
            jpy: Set(snapshot.jpy.to_string()),
            btc: Set(snapshot.btc.to_string()),
            eth: Set(snapshot.eth.to_string()),
            jpy_reserved: Set(snapshot.jpy_reserved.to_string()),
            btc_reserved: Set(snapshot.btc_reserved.to_string()),
            eth_reserved: Set(snapshot.eth_reserved.to_string()),
            last_checked_at: Set(checked_at),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        Balance::insert(row)
            .on_conflict(
                OnConflict::column(balance::Column::ApiKeyId)
                    .update_columns([
                        balance::Column::Jpy,
                        balance::Column::Btc,
                        balance::Column::Eth,
                        balance::Column::JpyReserved,
                        balance::Column::BtcReserved,
                        balance::Column::EthReserved,
                        balance::Column::LastCheckedAt,
                        balance::Column::UpdatedAt,
                    ])
                    .to_owned()
            )
            .exec(conn).await?;

        Ok(())
    }
}
