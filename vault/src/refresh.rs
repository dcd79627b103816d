//! Periodic key refresh
//!
//! The vault never starts timers on its own. Hosts that run for longer than
//! a single operation spawn this task to re-read the key source.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::key_provider::KeyProvider;

/// How often the configured key is re-read
pub const KEY_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Refresh `provider` every `period` until `shutdown` is cancelled
pub fn spawn_key_refresh(
    provider: Arc<KeyProvider>,
    period: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = interval_at(Instant::now() + period, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    let provider = Arc::clone(&provider);
                    if let Err(e) = tokio::task::spawn_blocking(move || provider.refresh()).await {
                        tracing::warn!(error = %e, "Key refresh task failed");
                    }
                }
                _ = shutdown.cancelled() => {
                    tracing::debug!("Key refresh stopped");
                    break;
                }
            }
        }
    })
}
