pub mod settings_service;
pub mod settlement_service;
pub mod balance_sync_service;
pub mod fanout;

pub use settings_service::{ ActiveWindow, SettingsService, SystemSettings };
pub use settlement_service::{ SettlementService, SettlementSummary };
pub use balance_sync_service::{ BalanceSyncService, BalanceSyncSummary };
pub use fanout::{ CredentialOutcome, FanOutReport };
