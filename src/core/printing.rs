//! Foreground printing
//! Consumer side of the background handoff: drains `orders_to_print`
//! through the printer manager while the app is active.

use std::collections::HashSet;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::{PrintJob, PrinterManager};
use crate::core::orders::ReceiptSource;
use crate::error::{PrinterError, PrinterResult};
use crate::storage::PrinterStore;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub printed: Vec<String>,
    /// Already printed earlier; dropped from the queue
    pub skipped: Vec<String>,
    /// Put back for a later drain
    pub requeued: Vec<String>,
}

pub struct ForegroundPrinter {
    manager: Arc<PrinterManager>,
    store: PrinterStore,
    receipts: Arc<dyn ReceiptSource>,
    draining: Mutex<()>,
    /// Sent, but `mark_printed` failed. Never sent again by this process.
    unrecorded: StdMutex<HashSet<String>>,
}

impl ForegroundPrinter {
    pub fn new(manager: Arc<PrinterManager>, store: PrinterStore, receipts: Arc<dyn ReceiptSource>) -> Self {
        Self {
            manager,
            store,
            receipts,
            draining: Mutex::new(()),
            unrecorded: StdMutex::new(HashSet::new()),
        }
    }

    /// Renders, prints and marks a single order. Already printed orders
    /// are not printed again.
    pub async fn print_order(&self, order_id: &str) -> PrinterResult<bool> {
        if self.unrecorded.lock().unwrap().contains(order_id) {
            info!("Order {} already printed, recording it again.", order_id);
            self.record_printed(order_id).await;
            return Ok(false);
        }
        if self.store.is_printed(order_id).await? {
            info!("Order {} already printed, skipping.", order_id);
            return Ok(false);
        }
        let config = self.store.load_config().await?;
        let receipt = self.receipts.receipt_for(order_id).await?;
        let job = PrintJob::from_receipt(&receipt, &config);

        self.manager.send(&job).await?;
        info!("Order {} printed.", order_id);
        self.record_printed(order_id).await;
        Ok(true)
    }

    /// The paper is out once `send` returned, so a storage failure here
    /// must not turn into a retry.
    async fn record_printed(&self, order_id: &str) {
        match self.store.mark_printed(order_id).await {
            Ok(()) => {
                self.unrecorded.lock().unwrap().remove(order_id);
            }
            Err(e) => {
                error!("Order {} printed but not recorded: {}", order_id, e);
                self.unrecorded.lock().unwrap().insert(order_id.to_string());
            }
        }
    }

    /// Prints everything queued by the background scan. Stops at the first
    /// lost link and puts the rest back.
    pub async fn drain_pending(&self) -> PrinterResult<DrainReport> {
        let _draining = self.draining.lock().await;
        let mut report = DrainReport::default();

        if !self.manager.is_connected().await {
            debug!("No live printer session, leaving the queue for later.");
            return Ok(report);
        }

        // Refuse to drain against a history that cannot be read
        self.store.printed_orders().await?;

        let pending = self.store.take_pending().await?;
        if pending.is_empty() {
            return Ok(report);
        }
        info!("Draining {} queued order(s)", pending.len());

        let mut queue = pending.into_iter();
        while let Some(order_id) = queue.next() {
            // The queue is only a hint; the printed set decides
            match self.print_order(&order_id).await {
                Ok(true) => report.printed.push(order_id),
                Ok(false) => report.skipped.push(order_id),
                Err(PrinterError::Disconnected) => {
                    warn!("Printer disconnected while draining, requeueing the rest.");
                    report.requeued.push(order_id);
                    report.requeued.extend(queue.by_ref());
                    break;
                }
                Err(e) => {
                    warn!("Order {} not printed: {}", order_id, e);
                    report.requeued.push(order_id);
                }
            }
        }

        if !report.requeued.is_empty() {
            self.store.enqueue_pending(&report.requeued).await?;
        }
        Ok(report)
    }

    /// Drains periodically until `cancel` fires.
    pub fn spawn(self: &Arc<Self>, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let printer = self.clone();
        tokio::spawn(async move {
            loop {
                match printer.drain_pending().await {
                    Ok(report) if !report.printed.is_empty() => {
                        info!("Printed {} queued order(s)", report.printed.len())
                    }
                    Ok(_) => {}
                    Err(e) => warn!("Draining the print queue failed: {}", e),
                }
                tokio::select! {
                    _ = sleep(interval) => {}
                    _ = cancel.cancelled() => return,
                }
            }
        })
    }
}
