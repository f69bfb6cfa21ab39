//! UI commands
//! Thin wrappers the UI layer calls. Errors come back as display strings.

use log::info;
use serde::Serialize;

use crate::config::PrinterConfig;
use crate::core::bluetooth::{
    ConnectionSession, ErrorPolicy, PeripheralHandle, PrintJob, ReceiptPayload, RestoreOutcome,
    SavedPrinterRecord,
};
use crate::error::PrinterError;
use crate::state::AppState;

/// Snapshot shown on the printer settings screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrinterStatus {
    pub connected: bool,
    pub printer: Option<PeripheralHandle>,
    pub saved_printer: Option<SavedPrinterRecord>,
    pub reconnecting: bool,
    pub pending_orders: usize,
}

fn user_message(err: PrinterError) -> String {
    match err {
        PrinterError::Disconnected => {
            "Printer disconnected. Reconnect it from the printer settings.".to_string()
        }
        other => other.to_string(),
    }
}

/// Scans for printers in range
///
/// # Returns
/// The peers found during one scan window, also kept as connect candidates
pub async fn scan_printers(state: &AppState) -> Result<Vec<PeripheralHandle>, String> {
    state.manager.scan().await.map_err(user_message)
}

/// Ends a running scan early. Safe to call when no scan is running.
pub fn stop_scan(state: &AppState) {
    state.manager.stop_scan();
}

/// Connects to a printer and remembers it for later sessions
///
/// # Arguments
/// * `device_id` - The platform identifier returned by `scan_printers`
pub async fn connect_printer(
    state: &AppState,
    device_id: &str,
) -> Result<ConnectionSession, String> {
    state
        .manager
        .connect_by_id(device_id)
        .await
        .map_err(user_message)
}

/// Disconnects and forgets the saved printer
pub async fn disconnect_printer(state: &AppState) -> Result<(), String> {
    state.manager.disconnect().await.map_err(user_message)
}

pub async fn printer_status(state: &AppState) -> Result<PrinterStatus, String> {
    let session = state.manager.current_session().await;
    let saved_printer = state.store.saved_printer().await.map_err(|e| e.to_string())?;
    let pending_orders = state
        .store
        .pending_orders()
        .await
        .map_err(|e| e.to_string())?
        .len();

    Ok(PrinterStatus {
        connected: session.as_ref().is_some_and(|s| s.live),
        printer: session.map(|s| s.peripheral),
        saved_printer,
        reconnecting: state.supervisor.is_in_flight(),
        pending_orders,
    })
}

/// Prints one receipt over the current session
///
/// # Arguments
/// * `receipt` - Text and formatting from the receipt generator
pub async fn print_receipt(state: &AppState, receipt: &ReceiptPayload) -> Result<(), String> {
    let config = state.store.load_config().await.map_err(|e| e.to_string())?;
    let job = PrintJob::from_receipt(receipt, &config);
    state.manager.send(&job).await.map_err(user_message)
}

/// User-initiated restore of the saved printer; failures are reported.
pub async fn reconnect_printer(state: &AppState) -> Result<Option<ConnectionSession>, String> {
    match state.supervisor.restore(ErrorPolicy::Surface).await {
        Ok(RestoreOutcome::Restored(session)) => Ok(Some(session)),
        Ok(RestoreOutcome::NoSavedPrinter) => Err("No saved printer to reconnect to.".to_string()),
        Ok(RestoreOutcome::AlreadyConnected) => Ok(state.manager.current_session().await),
        Ok(RestoreOutcome::InFlight) => Ok(None),
        Ok(RestoreOutcome::Failed(e)) | Err(e) => Err(user_message(e)),
    }
}

/// Persists new printer settings and applies the link part right away
pub async fn update_printer_config(state: &AppState, config: PrinterConfig) -> Result<(), String> {
    state
        .store
        .save_config(&config)
        .await
        .map_err(|e| e.to_string())?;
    state.manager.apply_config(&config).await;
    info!("Printer configuration saved.");
    Ok(())
}
