//! Bluetooth functionality for the receipt printer bridge
//! This module handles all bluetooth operations including scanning,
//! connecting, and streaming print jobs to the printer.

mod backend;
pub mod commands;
mod connection;
mod constants;
mod fragmenter;
mod keepalive;
mod manager;
mod negotiator;
mod reconnect;
mod scanner;
mod types;

// Re-export types that should be publicly accessible
pub use backend::{BleAdapter, BleLink};
pub use commands::{
    Alignment, CutMode, FontSizeTier, PrintJob, PrinterCommand, ReceiptPayload, TextEncoding,
};
pub use connection::{BluestAdapter, BluestLink};
pub use constants::*; // Re-export all constants
pub use fragmenter::Fragmenter;
pub use keepalive::KeepAliveMonitor;
pub use manager::{PrinterManager, SessionSlot};
pub use negotiator::{negotiate, select_writable};
pub use reconnect::{ReconnectionSupervisor, RestoreOutcome};
pub use scanner::BluetoothScanner;
pub use types::{
    CharacteristicProperties, CharacteristicRef, ConnectionSession, ErrorPolicy,
    GattCharacteristic, GattService, PeripheralHandle, SavedPrinterRecord, SessionEvent, WriteMode,
};
