use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use redis::Client;

use crate::error::Result;
use crate::scheduler::{ SchedulePlan, Scheduler };

pub const DEFAULT_SETTINGS_CHANNEL: &str = "settings:updated";

const INITIAL_RECONNECT_DELAY: Duration = Duration::from_secs(1);
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(60);

/// Listens for settings-changed notifications and rebuilds the schedule on each.
pub struct SettingsListener {
    client: Client,
    channel: String,
    scheduler: Arc<Scheduler>,
}

impl SettingsListener {
    pub fn new(redis_url: &str, channel: impl Into<String>, scheduler: Arc<Scheduler>) -> Result<Self> {
        Ok(Self {
            client: Client::open(redis_url)?,
            channel: channel.into(),
            scheduler,
        })
    }

    /// Subscribe forever, reconnecting with capped exponential delay.
    pub async fn run(self) {
        let mut failures = 0u32;
        let mut resubscribing = false;

        loop {
            match self.listen(&mut failures, resubscribing).await {
                Ok(()) => tracing::warn!(channel = %self.channel, "Settings subscription ended"),
                Err(e) => tracing::error!(channel = %self.channel, error = %e, "Settings subscription failed"),
            }
            resubscribing = true;

            failures = failures.saturating_add(1);
            let delay = reconnect_delay(failures);
            tracing::info!(delay_secs = delay.as_secs(), "Reconnecting to settings channel");
            tokio::time::sleep(delay).await;
        }
    }

    async fn listen(&self, failures: &mut u32, resubscribing: bool) -> Result<()> {
        let conn = self.client.get_async_connection().await?;
        let mut pubsub = conn.into_pubsub();
        pubsub.subscribe(&self.channel).await?;

        *failures = 0;
        tracing::info!(channel = %self.channel, "Subscribed to settings channel");

        // The startup schedule is built before the first attempt
        if resubscribing {
            on_resubscribed(&self.scheduler, &self.channel).await;
        }

        let mut messages = pubsub.on_message();
        while let Some(msg) = messages.next().await {
            let payload: String = msg.get_payload().unwrap_or_default();
            apply_settings_change(&self.scheduler, &payload).await;
        }

        Ok(())
    }
}

/// Payload is informational only; every message triggers a full rebuild.
pub async fn apply_settings_change(scheduler: &Scheduler, payload: &str) -> SchedulePlan {
    tracing::info!(payload = %payload, "Settings changed, rebuilding schedule");
    scheduler.rebuild().await
}

/// Notifications published while disconnected are lost, so a fresh
/// subscription reloads the settings instead of waiting for the next message.
pub async fn on_resubscribed(scheduler: &Scheduler, channel: &str) -> SchedulePlan {
    tracing::info!(channel = %channel, "Resubscribed to settings channel, rebuilding schedule");
    scheduler.rebuild().await
}

/// 1s, 2s, 4s ... capped at 60s.
pub fn reconnect_delay(failures: u32) -> Duration {
    let exponent = failures.saturating_sub(1).min(16);
    INITIAL_RECONNECT_DELAY.saturating_mul(1 << exponent).min(MAX_RECONNECT_DELAY)
}
