//! Periodic order scan. Runs where BLE is off limits, so it only queues
//! order ids; the foreground prints them.

use std::fmt;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use log::{error, info, warn};

use crate::core::orders::OrderStore;
use crate::error::{PrinterError, PrinterResult};
use crate::storage::PrinterStore;

/// What one invocation reports back to the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundFetchResult {
    NewData,
    NoData,
    Failed,
}

impl fmt::Display for BackgroundFetchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NewData => "new-data",
            Self::NoData => "no-data",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// `Idle -> Scanning -> {Queued, NoNewWork, Failed} -> Idle`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Scanning,
    Queued,
    NoNewWork,
    Failed,
}

impl ScanState {
    pub fn fetch_result(&self) -> Option<BackgroundFetchResult> {
        match self {
            Self::Queued => Some(BackgroundFetchResult::NewData),
            Self::NoNewWork => Some(BackgroundFetchResult::NoData),
            Self::Failed => Some(BackgroundFetchResult::Failed),
            Self::Idle | Self::Scanning => None,
        }
    }
}

/// Something the scheduler can invoke periodically.
#[async_trait]
pub trait BackgroundTask: Send + Sync {
    async fn run(&self) -> BackgroundFetchResult;
}

pub struct BackgroundScanTask {
    store: PrinterStore,
    orders: Arc<dyn OrderStore>,
    state: Mutex<ScanState>,
    last_outcome: Mutex<Option<ScanState>>,
}

impl BackgroundScanTask {
    pub fn new(store: PrinterStore, orders: Arc<dyn OrderStore>) -> Self {
        Self {
            store,
            orders,
            state: Mutex::new(ScanState::Idle),
            last_outcome: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ScanState {
        *self.state.lock().unwrap()
    }

    /// Terminal state of the most recent run.
    pub fn last_outcome(&self) -> Option<ScanState> {
        *self.last_outcome.lock().unwrap()
    }

    async fn scan(&self) -> PrinterResult<ScanState> {
        let config = self.store.load_config().await?;
        if !config.auto_print_enabled {
            info!("Auto-print disabled, nothing to scan.");
            return Ok(ScanState::NoNewWork);
        }

        let eligible: Vec<String> = self
            .orders
            .orders_awaiting_print()
            .await?
            .into_iter()
            .map(|order| order.id)
            .collect();

        let added = self.store.enqueue_pending(&eligible).await?;
        if added.is_empty() {
            info!("{} order(s) awaiting print, none new.", eligible.len());
            Ok(ScanState::NoNewWork)
        } else {
            info!("Queued {} new order(s) for printing: {:?}", added.len(), added);
            Ok(ScanState::Queued)
        }
    }
}

#[async_trait]
impl BackgroundTask for BackgroundScanTask {
    async fn run(&self) -> BackgroundFetchResult {
        *self.state.lock().unwrap() = ScanState::Scanning;

        let outcome = match self.scan().await {
            Ok(state) => state,
            Err(PrinterError::BackgroundRestricted) => {
                warn!("Background execution restricted by the OS.");
                ScanState::Failed
            }
            Err(e) => {
                error!("Background order scan failed: {}", e);
                ScanState::Failed
            }
        };

        *self.last_outcome.lock().unwrap() = Some(outcome);
        *self.state.lock().unwrap() = ScanState::Idle;
        outcome.fetch_result().unwrap_or(BackgroundFetchResult::Failed)
    }
}
