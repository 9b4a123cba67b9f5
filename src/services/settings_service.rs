use std::time::Duration;

use chrono::{ Local, NaiveTime, Timelike };
use sea_orm::{ ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter };

use crate::db::entity::{ sync_setting, user };
use crate::error::Result;

const DEFAULT_DEPOSIT_CHECK_MINUTES: u64 = 5;
const DEFAULT_BALANCE_SYNC_MINUTES: u64 = 15;
const DEFAULT_RETRY_COUNT: u32 = 3;

/// Daily window during which automated processing is permitted.
///
/// Compared at minute precision with both ends inclusive. A window whose start
/// is after its end spans midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl Default for ActiveWindow {
    fn default() -> Self {
        Self {
            start: NaiveTime::MIN,
            end: NaiveTime::from_hms_opt(23, 59, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

impl ActiveWindow {
    pub fn parse(start: &str, end: &str) -> Option<Self> {
        Some(Self {
            start: parse_time_of_day(start)?,
            end: parse_time_of_day(end)?,
        })
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        let time = to_minute(time);
        let (start, end) = (to_minute(self.start), to_minute(self.end));

        if start <= end {
            start <= time && time <= end
        } else {
            time >= start || time <= end
        }
    }
}

fn parse_time_of_day(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .ok()
}

fn to_minute(time: NaiveTime) -> NaiveTime {
    NaiveTime::from_hms_opt(time.hour(), time.minute(), 0).unwrap_or(time)
}

/// Scheduler-facing view of the owner's SyncSetting.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemSettings {
    pub is_enabled: bool,
    pub deposit_check_interval: Duration,
    pub balance_sync_interval: Duration,
    /// Total attempts per job, never below one.
    pub retry_count: u32,
    pub active_window: ActiveWindow,
    pub notify_on_error: bool,
}

impl Default for SystemSettings {
    fn default() -> Self {
        Self {
            is_enabled: true,
            deposit_check_interval: Duration::from_secs(DEFAULT_DEPOSIT_CHECK_MINUTES * 60),
            balance_sync_interval: Duration::from_secs(DEFAULT_BALANCE_SYNC_MINUTES * 60),
            retry_count: DEFAULT_RETRY_COUNT,
            active_window: ActiveWindow::default(),
            notify_on_error: false,
        }
    }
}

impl From<&sync_setting::Model> for SystemSettings {
    fn from(row: &sync_setting::Model) -> Self {
        let active_window = ActiveWindow::parse(&row.start_time, &row.end_time).unwrap_or_else(|| {
            tracing::warn!(
                start = %row.start_time,
                end = %row.end_time,
                "Unparseable active window, using 00:00-23:59"
            );
            ActiveWindow::default()
        });

        Self {
            is_enabled: row.is_enabled,
            deposit_check_interval: minutes(row.deposit_check_interval),
            balance_sync_interval: minutes(row.balance_sync_interval),
            retry_count: row.retry_count.max(1) as u32,
            active_window,
            notify_on_error: row.notify_on_error,
        }
    }
}

fn minutes(value: i32) -> Duration {
    Duration::from_secs((value.max(1) as u64) * 60)
}

/// Where the owner's settings were found.
#[derive(Debug, Clone, PartialEq)]
enum OwnerSettings {
    NoOwner,
    NoSettings,
    Found(sync_setting::Model),
}

/// Reads the SyncSetting of the configured owner user.
pub struct SettingsService {
    db: DatabaseConnection,
    owner_username: String,
}

impl SettingsService {
    pub fn new(db: DatabaseConnection, owner_username: impl Into<String>) -> Self {
        Self {
            db,
            owner_username: owner_username.into(),
        }
    }

    async fn load_owner_settings(&self) -> Result<OwnerSettings> {
        let owner = user::Entity
            ::find()
            .filter(user::Column::Username.eq(self.owner_username.as_str()))
            .one(&self.db).await?;

        let Some(owner) = owner else {
            return Ok(OwnerSettings::NoOwner);
        };

        let row = sync_setting::Entity
            ::find()
            .filter(sync_setting::Column::UserId.eq(owner.id))
            .one(&self.db).await?;

        Ok(match row {
            Some(row) => OwnerSettings::Found(row),
            None => OwnerSettings::NoSettings,
        })
    }

    /// Settings used to (re)build the schedule. Falls back to defaults when the
    /// owner or the settings row is missing, or when the read fails.
    pub async fn system_settings(&self) -> SystemSettings {
        match self.load_owner_settings().await {
            Ok(OwnerSettings::Found(row)) => SystemSettings::from(&row),
            Ok(OwnerSettings::NoOwner) => {
                tracing::warn!(owner = %self.owner_username, "Settings owner not found, using defaults");
                SystemSettings::default()
            }
            Ok(OwnerSettings::NoSettings) => {
                tracing::warn!(owner = %self.owner_username, "No sync settings stored, using defaults");
                SystemSettings::default()
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to read sync settings, using defaults");
                SystemSettings::default()
            }
        }
    }

    pub async fn is_within_active_hours(&self) -> Result<bool> {
        self.is_active_at(Local::now().time()).await
    }

    /// Active-hours gate evaluated at a given local time of day.
    pub async fn is_active_at(&self, time: NaiveTime) -> Result<bool> {
        Ok(match self.load_owner_settings().await? {
            OwnerSettings::NoOwner => true,
            OwnerSettings::NoSettings => false,
            OwnerSettings::Found(row) => {
                let settings = SystemSettings::from(&row);
                settings.is_enabled && settings.active_window.contains(time)
            }
        })
    }
}
