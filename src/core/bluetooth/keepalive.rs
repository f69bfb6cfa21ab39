//! Heartbeat writer that keeps idle printer links from being dropped.

use std::sync::{Arc, Weak};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::backend::BleLink;
use crate::core::bluetooth::manager::SessionSlot;
use crate::core::bluetooth::types::CharacteristicRef;

/// One heartbeat loop bound to one session generation.
pub struct KeepAliveMonitor {
    pub(crate) link: Arc<dyn BleLink>,
    pub(crate) characteristic: CharacteristicRef,
    pub(crate) heartbeat: Vec<u8>,
    pub(crate) interval: Duration,
    pub(crate) generation: u64,
    pub(crate) slot: Weak<SessionSlot>,
    pub(crate) write_gate: Arc<Mutex<()>>,
    pub(crate) cancel: CancellationToken,
}

impl KeepAliveMonitor {
    /// Start the keepalive timer. The first heartbeat fires one interval
    /// after start.
    pub fn start(self) -> JoinHandle<()> {
        info!(
            "Keepalive timer started with interval of {} seconds",
            self.interval.as_secs()
        );
        tokio::spawn(async move { self.run().await })
    }

    async fn run(self) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("Keepalive stopped.");
                    return;
                }
                _ = ticker.tick() => {}
            }

            let Some(slot) = self.slot.upgrade() else {
                return;
            };
            if slot.generation() != self.generation {
                // A reconnect installed a newer session with its own heartbeat
                info!("Session {} replaced, stopping its keepalive.", self.generation);
                return;
            }
            drop(slot);

            // A print in progress already keeps the link busy
            let Ok(_gate) = self.write_gate.try_lock() else {
                debug!("Write in progress, skipping heartbeat");
                continue;
            };

            match self.link.write(&self.characteristic, &self.heartbeat).await {
                Ok(()) => debug!("Sending keepalive signal to {}", self.link.peripheral().id),
                Err(e) => warn!("Failed to send keepalive (ignored): {}", e),
            }
        }
    }
}
