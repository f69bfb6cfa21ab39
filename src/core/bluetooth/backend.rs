//! Radio seams.
//! Everything above this module talks to the printer through these traits,
//! so the session logic can run against bluest or a test double.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::core::bluetooth::types::{CharacteristicRef, GattService, PeripheralHandle};
use crate::error::PrinterResult;

/// Adapter-level operations.
#[async_trait]
pub trait BleAdapter: Send + Sync {
    /// Discover nearby peripherals for at most `window`.
    /// An elapsed window with no results is `Ok(vec![])`.
    async fn scan(&self, window: Duration) -> PrinterResult<Vec<PeripheralHandle>>;

    /// Open a radio-level connection. Identities not seen by a previous
    /// scan are resolved by the adapter itself.
    async fn connect(&self, peripheral: &PeripheralHandle) -> PrinterResult<Arc<dyn BleLink>>;

    /// Ends a running scan early.
    fn stop_scan(&self) {}
}

/// A connected peripheral.
#[async_trait]
pub trait BleLink: Send + Sync {
    fn peripheral(&self) -> &PeripheralHandle;

    async fn is_connected(&self) -> bool;

    /// Enumerate services and their characteristics in discovery order.
    async fn discover_services(&self) -> PrinterResult<Vec<GattService>>;

    /// Write one packet and wait for the stack to accept it.
    async fn write(&self, target: &CharacteristicRef, data: &[u8]) -> PrinterResult<()>;

    async fn disconnect(&self) -> PrinterResult<()>;
}
