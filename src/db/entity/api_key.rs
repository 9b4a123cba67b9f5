use sea_orm::entity::prelude::*;
use serde::{ Deserialize, Serialize };

/// A tenant's exchange credential. Key material and wallet addresses are
/// stored encrypted.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "api_keys")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    pub name: String,
    #[serde(skip_serializing)]
    #[sea_orm(column_type = "Text")]
    pub access_key: String,
    #[serde(skip_serializing)]
    #[sea_orm(column_type = "Text")]
    pub secret_key: String,
    #[serde(skip_serializing)]
    #[sea_orm(column_type = "Text", nullable)]
    pub btc_wallet_address: Option<String>,
    #[serde(skip_serializing)]
    #[sea_orm(column_type = "Text", nullable)]
    pub eth_wallet_address: Option<String>,
    pub cryptocurrency_type: String, // "btc" or "eth"
    pub is_active: bool,
    pub last_checked_at: Option<DateTimeUtc>,
    /// Confirmation-time watermark for deposit settlement.
    pub deposit_cursor_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
    #[sea_orm(has_many = "super::transaction::Entity")]
    Transaction,
    #[sea_orm(has_one = "super::balance::Entity")]
    Balance,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transaction.def()
    }
}

impl Related<super::balance::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Balance.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
