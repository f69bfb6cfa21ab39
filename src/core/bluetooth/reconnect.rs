//! Restores the saved printer without user interaction.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info, warn};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::manager::PrinterManager;
use crate::core::bluetooth::types::{ConnectionSession, ErrorPolicy, SessionEvent};
use crate::error::{PrinterError, PrinterResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    Restored(ConnectionSession),
    /// Nothing saved, nothing to do
    NoSavedPrinter,
    AlreadyConnected,
    /// Another attempt is running; this call did nothing
    InFlight,
    /// The attempt failed and the policy kept it away from the user.
    /// The app stays "disconnected, printer known".
    Failed(PrinterError),
}

pub struct ReconnectionSupervisor {
    manager: Arc<PrinterManager>,
    in_flight: AtomicBool,
}

struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl ReconnectionSupervisor {
    pub fn new(manager: Arc<PrinterManager>) -> Self {
        Self {
            manager,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// One bounded connect-by-identity attempt to the saved printer.
    /// With `ErrorPolicy::Suppress` failures are logged and reported as
    /// `RestoreOutcome::Failed`; with `Surface` they are returned.
    pub async fn restore(&self, policy: ErrorPolicy) -> PrinterResult<RestoreOutcome> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Reconnect already in flight, ignoring request.");
            return Ok(RestoreOutcome::InFlight);
        }
        let _guard = InFlightGuard(&self.in_flight);

        match self.manager.restore_saved().await {
            Ok(outcome) => Ok(outcome),
            Err(e) if policy.suppress_user_facing_errors() => {
                warn!("Automatic printer reconnect failed: {}", e);
                Ok(RestoreOutcome::Failed(e))
            }
            Err(e) => Err(e),
        }
    }

    /// Runs an unattended restore each time the manager reports a lost link.
    pub fn watch_lost_sessions(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let supervisor = self.clone();
        let mut events = self.manager.subscribe();
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = cancel.cancelled() => return,
                    event = events.recv() => event,
                };
                match event {
                    Ok(SessionEvent::Lost(peripheral)) => {
                        info!("Link to {} lost, trying to restore it.", peripheral.id);
                        // Suppress never returns Err
                        let _ = supervisor.restore(ErrorPolicy::Suppress).await;
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        debug!("Session watcher skipped {} event(s)", skipped);
                    }
                    Err(RecvError::Closed) => return,
                }
            }
        })
    }
}
