//! Application state management
//! Everything that must outlive a single screen lives here: the printer
//! session, the reconnect supervisor and the background scheduler.

use std::sync::Arc;

use anyhow::Result;
use log::info;
use tokio::sync::OnceCell;

use crate::core::background::{BackgroundScanTask, BackgroundScheduler};
use crate::core::bluetooth::{BleAdapter, ErrorPolicy, PrinterManager, ReconnectionSupervisor, RestoreOutcome};
use crate::core::orders::{OrderStore, ReceiptSource};
use crate::core::printing::ForegroundPrinter;
use crate::storage::{KeyValueStore, PrinterStore};

/// Global application state
pub struct AppState {
    pub manager: Arc<PrinterManager>,
    pub store: PrinterStore,
    pub supervisor: Arc<ReconnectionSupervisor>,
    pub scheduler: BackgroundScheduler,
    pub printer: Arc<ForegroundPrinter>,
    pub scan_task: Arc<BackgroundScanTask>,
    startup_restore: OnceCell<RestoreOutcome>,
}

impl AppState {
    /// Wires the components together around one store and one adapter.
    pub async fn new(
        adapter: Arc<dyn BleAdapter>,
        kv: Arc<dyn KeyValueStore>,
        orders: Arc<dyn OrderStore>,
        receipts: Arc<dyn ReceiptSource>,
    ) -> Result<Self> {
        let store = PrinterStore::new(kv);
        let config = store.load_config().await?;

        info!("Initializing PrinterManager...");
        let manager = Arc::new(PrinterManager::new(adapter, store.clone(), &config));
        let supervisor = Arc::new(ReconnectionSupervisor::new(manager.clone()));
        let printer = Arc::new(ForegroundPrinter::new(manager.clone(), store.clone(), receipts));
        let scan_task = Arc::new(BackgroundScanTask::new(store.clone(), orders));

        Ok(Self {
            manager,
            store,
            supervisor,
            scheduler: BackgroundScheduler::new(),
            printer,
            scan_task,
            startup_restore: OnceCell::new(),
        })
    }

    /// Startup restore of the saved printer. Runs once per process; later
    /// calls return the first outcome.
    pub async fn activate(&self) -> RestoreOutcome {
        self.startup_restore
            .get_or_init(|| async {
                info!("App activated, restoring saved printer.");
                // Suppress turns every failure into an outcome
                self.supervisor
                    .restore(ErrorPolicy::Suppress)
                    .await
                    .unwrap_or_else(RestoreOutcome::Failed)
            })
            .await
            .clone()
    }

    /// Foreground teardown. The saved printer stays on record.
    pub async fn shutdown(&self) {
        self.scheduler.shutdown();
        self.manager.shutdown().await;
        info!("Application state shut down.");
    }
}
