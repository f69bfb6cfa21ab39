mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use pretty_assertions::assert_eq;

use common::*;
use receipt_printer_bridge::config::PrinterConfig;
use receipt_printer_bridge::core::bluetooth::commands::{encode_cut, encode_job};
use receipt_printer_bridge::core::bluetooth::{CutMode, PrintJob, PrinterManager};
use receipt_printer_bridge::core::printing::{DrainReport, ForegroundPrinter};
use receipt_printer_bridge::storage::{KEY_PRINTED_ORDERS, KeyValueStore, PrinterStore};

fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

async fn connected() -> (Arc<MockAdapter>, Arc<PrinterManager>, PrinterStore, ForegroundPrinter) {
    let adapter = Arc::new(MockAdapter::printer());
    let store = memory_store();
    let manager = manager_with(adapter.clone(), store.clone(), &PrinterConfig::default());
    manager.connect(&printer("P", "Kitchen")).await.unwrap();
    let printer = ForegroundPrinter::new(manager.clone(), store.clone(), Arc::new(PlainReceipts));
    (adapter, manager, store, printer)
}

#[tokio::test(start_paused = true)]
async fn drain_prints_queue_and_skips_printed() {
    let (adapter, _manager, store, printer) = connected().await;
    store.enqueue_pending(&ids(&["1", "2"])).await.unwrap();
    store.kv().set(KEY_PRINTED_ORDERS, r#"["1"]"#).await.unwrap();

    let report = printer.drain_pending().await.unwrap();

    assert_eq!(
        report,
        DrainReport {
            printed: ids(&["2"]),
            skipped: ids(&["1"]),
            requeued: vec![],
        }
    );
    let stream: Vec<u8> = adapter.last_link().payloads().concat();
    let expected = encode_job(&PrintJob::new("Order 2").with_cut(CutMode::Full));
    assert_eq!(stream, expected);
    assert!(store.pending_orders().await.unwrap().is_empty());
    assert_eq!(store.printed_orders().await.unwrap(), ids(&["1", "2"]));
}

#[tokio::test(start_paused = true)]
async fn drain_waits_for_a_printer() {
    let adapter = Arc::new(MockAdapter::printer());
    let store = memory_store();
    let manager = manager_with(adapter, store.clone(), &PrinterConfig::default());
    let printer = ForegroundPrinter::new(manager, store.clone(), Arc::new(PlainReceipts));
    store.enqueue_pending(&ids(&["1"])).await.unwrap();

    let report = printer.drain_pending().await.unwrap();

    assert_eq!(report, DrainReport::default());
    assert_eq!(store.pending_orders().await.unwrap(), ids(&["1"]));
}

#[tokio::test(start_paused = true)]
async fn lost_link_mid_drain_requeues_the_rest() {
    let (adapter, manager, store, printer) = connected().await;
    store.enqueue_pending(&ids(&["1", "2", "3"])).await.unwrap();
    // Order 1 is one body write plus the cut
    *adapter.last_link().drop_after_writes.lock().unwrap() = Some(2);

    let report = printer.drain_pending().await.unwrap();

    assert_eq!(report.printed, ids(&["1"]));
    assert_eq!(report.requeued, ids(&["2", "3"]));
    assert_eq!(store.pending_orders().await.unwrap(), ids(&["2", "3"]));
    assert_eq!(store.printed_orders().await.unwrap(), ids(&["1"]));
    assert!(manager.current_session().await.is_none());

    let writes = adapter.last_link().payloads();
    assert_eq!(writes.last().unwrap(), &encode_cut(CutMode::Full));
}

#[tokio::test(start_paused = true)]
async fn print_order_is_at_most_once() {
    let (adapter, _manager, store, printer) = connected().await;

    assert!(printer.print_order("9").await.unwrap());
    assert!(!printer.print_order("9").await.unwrap());

    assert_eq!(adapter.last_link().writes().len(), 2);
    assert!(store.is_printed("9").await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn failed_bookkeeping_never_prints_twice() {
    let kv = Arc::new(FailingWrites::new(KEY_PRINTED_ORDERS));
    let store = PrinterStore::new(kv.clone());
    let adapter = Arc::new(MockAdapter::printer());
    let manager = manager_with(adapter.clone(), store.clone(), &PrinterConfig::default());
    manager.connect(&printer("P", "Kitchen")).await.unwrap();
    let printer = ForegroundPrinter::new(manager, store.clone(), Arc::new(PlainReceipts));

    store.enqueue_pending(&ids(&["1"])).await.unwrap();
    kv.failing.store(true, Ordering::SeqCst);
    let report = printer.drain_pending().await.unwrap();
    assert_eq!(
        report,
        DrainReport {
            printed: ids(&["1"]),
            skipped: vec![],
            requeued: vec![],
        }
    );
    assert!(store.pending_orders().await.unwrap().is_empty());
    // Body plus cut
    assert_eq!(adapter.last_link().writes().len(), 2);

    // The next scan queues it again since the history never got it
    store.enqueue_pending(&ids(&["1"])).await.unwrap();
    let report = printer.drain_pending().await.unwrap();
    assert_eq!(report.skipped, ids(&["1"]));
    assert_eq!(adapter.last_link().writes().len(), 2);

    kv.failing.store(false, Ordering::SeqCst);
    assert!(!printer.print_order("1").await.unwrap());
    assert!(store.is_printed("1").await.unwrap());
    assert_eq!(adapter.last_link().writes().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn drain_refuses_an_unreadable_history() {
    let (adapter, _manager, store, printer) = connected().await;
    store.enqueue_pending(&ids(&["1"])).await.unwrap();
    store.kv().set(KEY_PRINTED_ORDERS, r#"["1""#).await.unwrap();

    assert!(printer.drain_pending().await.is_err());
    assert_eq!(store.pending_orders().await.unwrap(), ids(&["1"]));
    assert!(adapter.last_link().writes().is_empty());
}
