pub mod user;
pub mod api_key;
pub mod balance;
pub mod transaction;
pub mod sync_setting;

pub use user::Entity as User;
pub use api_key::Entity as ApiKey;
pub use balance::Entity as Balance;
pub use transaction::Entity as Transaction;
pub use sync_setting::Entity as SyncSetting;
