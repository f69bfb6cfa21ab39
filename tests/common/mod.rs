//! In-memory radio used by the integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use uuid::Uuid;

use receipt_printer_bridge::PrinterError;
use receipt_printer_bridge::PrinterResult;
use receipt_printer_bridge::config::PrinterConfig;
use receipt_printer_bridge::core::bluetooth::{
    BleAdapter, BleLink, CharacteristicProperties, CharacteristicRef, GattCharacteristic,
    GattService, PeripheralHandle, PrinterManager, ReceiptPayload,
};
use receipt_printer_bridge::core::orders::{
    AWAITING_PRINT_STATUS, OrderStore, OrderStoreError, OrderSummary, ReceiptSource,
};
use receipt_printer_bridge::storage::{KeyValueStore, MemoryStore, PrinterStore};

pub const SERVICE_A: Uuid = Uuid::from_u128(0x0000_aaaa_0000_1000_8000_00805f9b34fb);
pub const CHAR_B: Uuid = Uuid::from_u128(0x0000_bbbb_0000_1000_8000_00805f9b34fb);
pub const CHAR_NOTIFY: Uuid = Uuid::from_u128(0x0000_cccc_0000_1000_8000_00805f9b34fb);

#[derive(Debug, Clone)]
pub struct RecordedWrite {
    pub at: Instant,
    pub characteristic: Uuid,
    pub data: Vec<u8>,
}

/// Shared view of everything a link did, kept after the link is dropped.
#[derive(Default)]
pub struct LinkLog {
    pub writes: Mutex<Vec<RecordedWrite>>,
    pub connected: AtomicBool,
    pub fail_next_write: AtomicBool,
    /// Drop the link once this many writes went through
    pub drop_after_writes: Mutex<Option<usize>>,
    pub disconnects: AtomicUsize,
}

impl LinkLog {
    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.writes.lock().unwrap().clone()
    }

    pub fn payloads(&self) -> Vec<Vec<u8>> {
        self.writes().into_iter().map(|w| w.data).collect()
    }

    pub fn drop_link(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

pub struct MockLink {
    peripheral: PeripheralHandle,
    services: Vec<GattService>,
    log: Arc<LinkLog>,
    write_latency: Duration,
}

#[async_trait]
impl BleLink for MockLink {
    fn peripheral(&self) -> &PeripheralHandle {
        &self.peripheral
    }

    async fn is_connected(&self) -> bool {
        self.log.is_connected()
    }

    async fn discover_services(&self) -> PrinterResult<Vec<GattService>> {
        Ok(self.services.clone())
    }

    async fn write(&self, target: &CharacteristicRef, data: &[u8]) -> PrinterResult<()> {
        if !self.write_latency.is_zero() {
            tokio::time::sleep(self.write_latency).await;
        }
        if self.log.fail_next_write.swap(false, Ordering::SeqCst) {
            return Err(PrinterError::WriteFailed("injected".into()));
        }
        let mut writes = self.log.writes.lock().unwrap();
        if matches!(*self.log.drop_after_writes.lock().unwrap(), Some(n) if writes.len() >= n) {
            self.log.drop_link();
        }
        if !self.log.is_connected() {
            return Err(PrinterError::WriteFailed("not connected".into()));
        }
        writes.push(RecordedWrite {
            at: Instant::now(),
            characteristic: target.characteristic,
            data: data.to_vec(),
        });
        Ok(())
    }

    async fn disconnect(&self) -> PrinterResult<()> {
        self.log.connected.store(false, Ordering::SeqCst);
        self.log.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Adapter handing out `MockLink`s. Every connect gets a fresh `LinkLog`.
pub struct MockAdapter {
    pub services: Mutex<Vec<GattService>>,
    pub peers: Vec<PeripheralHandle>,
    pub connect_delay: Mutex<Duration>,
    pub connect_error: Mutex<Option<PrinterError>>,
    pub write_latency: Duration,
    pub connects: AtomicUsize,
    pub links: Mutex<Vec<Arc<LinkLog>>>,
}

impl MockAdapter {
    pub fn new(services: Vec<GattService>) -> Self {
        Self {
            services: Mutex::new(services),
            peers: vec![printer("AA:BB", "Kitchen")],
            connect_delay: Mutex::new(Duration::ZERO),
            connect_error: Mutex::new(None),
            write_latency: Duration::ZERO,
            connects: AtomicUsize::new(0),
            links: Mutex::new(Vec::new()),
        }
    }

    pub fn printer() -> Self {
        Self::new(vec![service(SERVICE_A, vec![(CHAR_B, true, false)])])
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn last_link(&self) -> Arc<LinkLog> {
        self.links
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no link opened")
    }

    pub fn link(&self, index: usize) -> Arc<LinkLog> {
        self.links.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl BleAdapter for MockAdapter {
    async fn scan(&self, _window: Duration) -> PrinterResult<Vec<PeripheralHandle>> {
        Ok(self.peers.clone())
    }

    async fn connect(&self, peripheral: &PeripheralHandle) -> PrinterResult<Arc<dyn BleLink>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let delay = *self.connect_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(e) = self.connect_error.lock().unwrap().clone() {
            return Err(e);
        }

        let log = Arc::new(LinkLog::default());
        log.connected.store(true, Ordering::SeqCst);
        self.links.lock().unwrap().push(log.clone());
        Ok(Arc::new(MockLink {
            peripheral: peripheral.clone(),
            services: self.services.lock().unwrap().clone(),
            log,
            write_latency: self.write_latency,
        }))
    }
}

pub fn printer(id: &str, name: &str) -> PeripheralHandle {
    PeripheralHandle::new(id, name)
}

/// `(uuid, write, write_without_response)` per characteristic.
pub fn service(uuid: Uuid, characteristics: Vec<(Uuid, bool, bool)>) -> GattService {
    GattService {
        uuid,
        characteristics: characteristics
            .into_iter()
            .map(|(uuid, write, write_without_response)| GattCharacteristic {
                uuid,
                properties: CharacteristicProperties {
                    write,
                    write_without_response,
                },
            })
            .collect(),
    }
}

pub fn memory_store() -> PrinterStore {
    PrinterStore::new(Arc::new(MemoryStore::new()))
}

pub fn manager_with(adapter: Arc<MockAdapter>, store: PrinterStore, config: &PrinterConfig) -> Arc<PrinterManager> {
    Arc::new(PrinterManager::new(adapter, store, config))
}

/// Order store returning a canned answer.
pub struct StaticOrders {
    pub answer: Mutex<Result<Vec<OrderSummary>, OrderStoreError>>,
    pub calls: AtomicUsize,
}

impl StaticOrders {
    pub fn awaiting(ids: &[&str]) -> Self {
        let orders = ids
            .iter()
            .map(|id| OrderSummary {
                id: id.to_string(),
                status: AWAITING_PRINT_STATUS.to_string(),
            })
            .collect();
        Self {
            answer: Mutex::new(Ok(orders)),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(err: OrderStoreError) -> Self {
        Self {
            answer: Mutex::new(Err(err)),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl OrderStore for StaticOrders {
    async fn orders_awaiting_print(&self) -> Result<Vec<OrderSummary>, OrderStoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer.lock().unwrap().clone()
    }
}

/// Renders every order as a one-line receipt; formatting comes from the config.
pub struct PlainReceipts;

#[async_trait]
impl ReceiptSource for PlainReceipts {
    async fn receipt_for(&self, order_id: &str) -> anyhow::Result<ReceiptPayload> {
        Ok(ReceiptPayload::new(format!("Order {}", order_id)))
    }
}

/// Memory store whose reads take `delay` after fetching the value, so a
/// caller can act in between a read and whatever follows it.
pub struct SlowReads {
    pub inner: MemoryStore,
    pub delay: Duration,
}

#[async_trait]
impl KeyValueStore for SlowReads {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let value = self.inner.get(key).await;
        tokio::time::sleep(self.delay).await;
        value
    }

    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.inner.remove(key).await
    }
}

/// Memory store that refuses writes to `key` while `failing` is set.
pub struct FailingWrites {
    pub inner: MemoryStore,
    pub key: &'static str,
    pub failing: AtomicBool,
}

impl FailingWrites {
    pub fn new(key: &'static str) -> Self {
        Self {
            inner: MemoryStore::new(),
            key,
            failing: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl KeyValueStore for FailingWrites {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        if key == self.key && self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("disk full");
        }
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.inner.remove(key).await
    }
}
