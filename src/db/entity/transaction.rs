use sea_orm::entity::prelude::*;
use serde::{ Deserialize, Serialize };

/// Append-only settlement ledger entry.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    pub api_key_id: i32,
    #[sea_orm(column_name = "type")]
    pub tx_type: String,
    pub status: String,
    pub deposit_id: Option<String>,
    pub deposit_amount: Option<String>,
    pub purchase_id: Option<String>,
    pub purchase_amount: Option<String>,
    pub purchase_rate: Option<String>,
    pub transfer_id: Option<String>,
    pub transfer_amount: Option<String>,
    pub wallet_address: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub error_message: Option<String>,
    /// JSON text of the exchange response or structured error.
    #[sea_orm(column_type = "Text", nullable)]
    pub raw_data: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::api_key::Entity",
        from = "Column::ApiKeyId",
        to = "super::api_key::Column::Id"
    )]
    ApiKey,
}

impl Related<super::api_key::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ApiKey.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
