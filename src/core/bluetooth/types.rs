//! Defines shared data structures for the Bluetooth module.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of a discovered or connected printer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeripheralHandle {
    /// Platform-specific unique identifier (MAC on Linux/Windows, UUID on macOS)
    pub id: String,
    /// The advertised name, or "Unknown"
    pub name: String,
    /// MAC address when it can be recovered from the platform id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Signal strength at discovery time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rssi: Option<i16>,
}

impl PeripheralHandle {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            address: None,
            rssi: None,
        }
    }
}

/// How writes to a characteristic are acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WriteMode {
    WithResponse,
    WithoutResponse,
}

/// The writable endpoint on a connected printer.
/// Only valid while the connection that produced it is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CharacteristicRef {
    pub service: Uuid,
    pub characteristic: Uuid,
    pub write_mode: WriteMode,
}

/// Write-related capabilities of a GATT characteristic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CharacteristicProperties {
    pub write: bool,
    pub write_without_response: bool,
}

impl CharacteristicProperties {
    pub fn is_writable(&self) -> bool {
        self.write || self.write_without_response
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattCharacteristic {
    pub uuid: Uuid,
    pub properties: CharacteristicProperties,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattService {
    pub uuid: Uuid,
    pub characteristics: Vec<GattCharacteristic>,
}

/// Snapshot of the process-wide session, safe to hand to any caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionSession {
    pub peripheral: PeripheralHandle,
    pub characteristic: CharacteristicRef,
    /// Whether the radio still reports the link as up
    pub live: bool,
}

/// Persisted identity of the last connected printer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedPrinterRecord {
    pub id: String,
    pub name: String,
}

impl From<&PeripheralHandle> for SavedPrinterRecord {
    fn from(handle: &PeripheralHandle) -> Self {
        Self {
            id: handle.id.clone(),
            name: handle.name.clone(),
        }
    }
}

impl From<&SavedPrinterRecord> for PeripheralHandle {
    fn from(record: &SavedPrinterRecord) -> Self {
        PeripheralHandle::new(record.id.clone(), record.name.clone())
    }
}

/// Changes in the session published to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Connected(PeripheralHandle),
    /// Explicit user disconnect
    Disconnected,
    /// The link dropped underneath a live session
    Lost(PeripheralHandle),
}

/// Whether a failure should reach the user or only the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPolicy {
    Surface,
    /// Unattended attempts: log the failure, never interrupt the user
    Suppress,
}

impl ErrorPolicy {
    pub fn suppress_user_facing_errors(&self) -> bool {
        matches!(self, Self::Suppress)
    }
}
