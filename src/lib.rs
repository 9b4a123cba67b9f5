pub mod config;
pub mod enums;
pub mod error;
pub mod crypto;
pub mod db;
pub mod exchange;
pub mod services;
pub mod jobs;
pub mod scheduler;
pub mod reconfig;
pub mod api;

pub use config::Config;
pub use enums::{ AssetKind, JobFamily, TxStatus, TxType };
pub use error::{ AppError, Result };
