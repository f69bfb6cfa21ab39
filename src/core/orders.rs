//! Order store and receipt generator boundaries.
//! The real app talks to its database and layout code here; the file-backed
//! implementation serves the headless binary.

use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;

use crate::core::bluetooth::ReceiptPayload;
use crate::error::PrinterError;

/// Status of orders that still need a receipt.
pub const AWAITING_PRINT_STATUS: &str = "awaiting-print";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSummary {
    pub id: String,
    pub status: String,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OrderStoreError {
    #[error("Order store unavailable: {0}")]
    Unavailable(String),
    /// The OS denied the background context network or disk access.
    #[error("Background execution restricted")]
    Restricted,
}

impl From<OrderStoreError> for PrinterError {
    fn from(err: OrderStoreError) -> Self {
        match err {
            OrderStoreError::Unavailable(msg) => PrinterError::Storage(msg),
            OrderStoreError::Restricted => PrinterError::BackgroundRestricted,
        }
    }
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Orders whose status is `awaiting-print`, oldest first.
    async fn orders_awaiting_print(&self) -> Result<Vec<OrderSummary>, OrderStoreError>;
}

/// Produces the printable receipt for an order.
#[async_trait]
pub trait ReceiptSource: Send + Sync {
    async fn receipt_for(&self, order_id: &str) -> Result<ReceiptPayload>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OrderRecord {
    id: String,
    status: String,
    receipt: ReceiptPayload,
}

/// Orders kept in a JSON array file, each with its rendered receipt.
pub struct JsonOrderFile {
    path: PathBuf,
}

impl JsonOrderFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    async fn records(&self) -> Result<Vec<OrderRecord>> {
        if !fs::try_exists(&self.path).await.unwrap_or(false) {
            debug!("Order file {:?} missing, treating as empty", self.path);
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&self.path).await?;
        Ok(serde_json::from_str(&raw)?)
    }
}

#[async_trait]
impl OrderStore for JsonOrderFile {
    async fn orders_awaiting_print(&self) -> Result<Vec<OrderSummary>, OrderStoreError> {
        let records = self
            .records()
            .await
            .map_err(|e| OrderStoreError::Unavailable(e.to_string()))?;
        Ok(records
            .into_iter()
            .filter(|r| r.status == AWAITING_PRINT_STATUS)
            .map(|r| OrderSummary {
                id: r.id,
                status: r.status,
            })
            .collect())
    }
}

#[async_trait]
impl ReceiptSource for JsonOrderFile {
    async fn receipt_for(&self, order_id: &str) -> Result<ReceiptPayload> {
        self.records()
            .await?
            .into_iter()
            .find(|r| r.id == order_id)
            .map(|r| r.receipt)
            .ok_or_else(|| anyhow!("Order {} not found", order_id))
    }
}
