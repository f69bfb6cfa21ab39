//! Background order scanning
//! Producer side of the background -> foreground handoff through the
//! persisted `orders_to_print` queue.

mod scan_task;
mod scheduler;

pub use scan_task::{BackgroundFetchResult, BackgroundScanTask, BackgroundTask, ScanState};
pub use scheduler::{BackgroundScheduler, BackgroundTaskOptions};
