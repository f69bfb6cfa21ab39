mod common;

use std::sync::Arc;

use pretty_assertions::assert_eq;

use common::*;
use receipt_printer_bridge::AppState;
use receipt_printer_bridge::commands;
use receipt_printer_bridge::core::bluetooth::{ReceiptPayload, RestoreOutcome, SavedPrinterRecord};
use receipt_printer_bridge::storage::{MemoryStore, PrinterStore};

async fn app(saved: Option<&str>) -> (Arc<MockAdapter>, AppState) {
    let kv = Arc::new(MemoryStore::new());
    if let Some(id) = saved {
        PrinterStore::new(kv.clone())
            .save_printer(&SavedPrinterRecord {
                id: id.into(),
                name: "Kitchen".into(),
            })
            .await
            .unwrap();
    }
    let adapter = Arc::new(MockAdapter::printer());
    let state = AppState::new(
        adapter.clone(),
        kv,
        Arc::new(StaticOrders::awaiting(&[])),
        Arc::new(PlainReceipts),
    )
    .await
    .unwrap();
    (adapter, state)
}

#[tokio::test(start_paused = true)]
async fn startup_restore_runs_once_per_process() {
    let (adapter, state) = app(Some("P")).await;

    let first = state.activate().await;
    assert!(matches!(first, RestoreOutcome::Restored(_)));
    assert_eq!(adapter.connect_count(), 1);

    state.shutdown().await;
    let second = state.activate().await;

    assert_eq!(second, first);
    assert_eq!(adapter.connect_count(), 1);
    assert!(state.manager.current_session().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn print_without_a_session_asks_to_reconnect() {
    let (adapter, state) = app(None).await;

    let err = commands::print_receipt(&state, &ReceiptPayload::new("Order 1"))
        .await
        .unwrap_err();

    assert!(err.contains("Reconnect"), "{}", err);
    assert_eq!(adapter.connect_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn reconnect_without_a_saved_printer_is_reported() {
    let (_adapter, state) = app(None).await;

    let err = commands::reconnect_printer(&state).await.unwrap_err();

    assert_eq!(err, "No saved printer to reconnect to.");
}

#[tokio::test(start_paused = true)]
async fn status_after_connect_and_stop_scan_when_idle() {
    let (_adapter, state) = app(None).await;
    commands::stop_scan(&state);

    commands::connect_printer(&state, "AA:BB").await.unwrap();
    let status = commands::printer_status(&state).await.unwrap();

    assert!(status.connected);
    assert_eq!(status.printer.map(|p| p.id), Some("AA:BB".to_string()));
    assert_eq!(status.saved_printer.map(|r| r.id), Some("AA:BB".to_string()));
    assert!(!status.reconnecting);
    assert_eq!(status.pending_orders, 0);
}
