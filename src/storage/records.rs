//! Typed access to the persisted printer records.

use std::sync::Arc;

use anyhow::{Context, Result};
use log::{info, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;

use crate::config::PrinterConfig;
use crate::core::bluetooth::SavedPrinterRecord;
use crate::storage::KeyValueStore;

pub const KEY_SAVED_PRINTER: &str = "saved_printer_device";
pub const KEY_PRINTER_CONFIG: &str = "printer_config";
pub const KEY_PRINTED_ORDERS: &str = "printed_orders";
pub const KEY_ORDERS_TO_PRINT: &str = "orders_to_print";

/// Shared handle over the key-value store. Cloning shares the same
/// list lock, so every clone sees serialized queue updates.
#[derive(Clone)]
pub struct PrinterStore {
    kv: Arc<dyn KeyValueStore>,
    list_lock: Arc<Mutex<()>>,
}

impl PrinterStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            list_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn kv(&self) -> &dyn KeyValueStore {
        self.kv.as_ref()
    }

    pub async fn saved_printer(&self) -> Result<Option<SavedPrinterRecord>> {
        self.read_json(KEY_SAVED_PRINTER).await
    }

    pub async fn save_printer(&self, record: &SavedPrinterRecord) -> Result<()> {
        self.write_json(KEY_SAVED_PRINTER, record).await?;
        info!("Saved printer {} ({})", record.name, record.id);
        Ok(())
    }

    pub async fn clear_saved_printer(&self) -> Result<()> {
        self.kv.remove(KEY_SAVED_PRINTER).await?;
        info!("Saved printer forgotten.");
        Ok(())
    }

    pub async fn load_config(&self) -> Result<PrinterConfig> {
        PrinterConfig::load_config(self.kv()).await
    }

    pub async fn save_config(&self, config: &PrinterConfig) -> Result<()> {
        config.save_config(self.kv()).await
    }

    /// The printed history. Unlike the queue, an unreadable history is an
    /// error: treating it as empty would print everything again.
    pub async fn printed_orders(&self) -> Result<Vec<String>> {
        let Some(raw) = self.kv.get(KEY_PRINTED_ORDERS).await? else {
            return Ok(Vec::new());
        };
        serde_json::from_str(&raw)
            .with_context(|| format!("{} is unreadable, refusing to guess", KEY_PRINTED_ORDERS))
    }

    pub async fn is_printed(&self, order_id: &str) -> Result<bool> {
        Ok(self.printed_orders().await?.iter().any(|id| id == order_id))
    }

    /// Records `order_id` as printed and drops it from the pending queue.
    pub async fn mark_printed(&self, order_id: &str) -> Result<()> {
        let _guard = self.list_lock.lock().await;
        let mut printed = self.printed_orders().await?;
        if !printed.iter().any(|id| id == order_id) {
            printed.push(order_id.to_string());
            self.write_json(KEY_PRINTED_ORDERS, &printed).await?;
        }

        let mut pending = self.read_list(KEY_ORDERS_TO_PRINT).await?;
        let before = pending.len();
        pending.retain(|id| id != order_id);
        if pending.len() != before {
            self.write_json(KEY_ORDERS_TO_PRINT, &pending).await?;
        }
        Ok(())
    }

    pub async fn pending_orders(&self) -> Result<Vec<String>> {
        self.read_list(KEY_ORDERS_TO_PRINT).await
    }

    /// Appends ids that are neither printed nor already queued, keeping
    /// arrival order. Returns the ids actually added.
    pub async fn enqueue_pending(&self, order_ids: &[String]) -> Result<Vec<String>> {
        let _guard = self.list_lock.lock().await;
        let printed = self.printed_orders().await?;
        let mut pending = self.read_list(KEY_ORDERS_TO_PRINT).await?;

        let mut added = Vec::new();
        for id in order_ids {
            if printed.contains(id) || pending.contains(id) {
                continue;
            }
            pending.push(id.clone());
            added.push(id.clone());
        }

        if !added.is_empty() {
            self.write_json(KEY_ORDERS_TO_PRINT, &pending).await?;
        }
        Ok(added)
    }

    /// Empties the queue and hands back its contents.
    pub async fn take_pending(&self) -> Result<Vec<String>> {
        let _guard = self.list_lock.lock().await;
        let pending = self.read_list(KEY_ORDERS_TO_PRINT).await?;
        if !pending.is_empty() {
            self.kv.remove(KEY_ORDERS_TO_PRINT).await?;
        }
        Ok(pending)
    }

    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self.kv.get(key).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!("Ignoring unreadable {}: {}", key, e);
                Ok(None)
            }
        }
    }

    async fn read_list(&self, key: &str) -> Result<Vec<String>> {
        Ok(self.read_json::<Vec<String>>(key).await?.unwrap_or_default())
    }

    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.kv.set(key, &raw).await
    }
}
