//! Constants used throughout the printer link
//! This module contains the UUID hints, timeouts and pacing values
//! used when talking to BLE thermal printers.

use uuid::Uuid;

/// A known (service, characteristic) pair seen on thermal printers.
/// Only consulted for logging; negotiation is capability based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharacteristicHint {
    pub vendor: &'static str,
    pub service: Uuid,
    pub characteristic: Uuid,
}

/// Generic 18F0/2AF1 layout used by most cheap ESC/POS printers
pub const PRIMARY_HINT: CharacteristicHint = CharacteristicHint {
    vendor: "generic",
    service: Uuid::from_u128(0x000018f0_0000_1000_8000_00805f9b34fb),
    characteristic: Uuid::from_u128(0x00002af1_0000_1000_8000_00805f9b34fb),
};

/// Vendor-specific layouts, in the order they are reported
pub const FALLBACK_HINTS: [CharacteristicHint; 3] = [
    CharacteristicHint {
        vendor: "issc-transparent-uart",
        service: Uuid::from_u128(0x49535343_fe7d_4ae5_8fa9_9fafd205e455),
        characteristic: Uuid::from_u128(0x49535343_8841_43f4_a8d4_ecbe34729bb3),
    },
    CharacteristicHint {
        vendor: "printer-e781",
        service: Uuid::from_u128(0xe7810a71_73ae_499d_8c15_faa9aef0c3f2),
        characteristic: Uuid::from_u128(0xbef8d6c9_9c21_4c9e_b632_bd58c1009f9f),
    },
    CharacteristicHint {
        vendor: "ff00-serial",
        service: Uuid::from_u128(0x0000ff00_0000_1000_8000_00805f9b34fb),
        characteristic: Uuid::from_u128(0x0000ff02_0000_1000_8000_00805f9b34fb),
    },
];

/// Largest single write, kept under the common 185-byte negotiated MTU
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 180;

/// Upper bound accepted for a configured chunk size
pub const MAX_CHUNK_SIZE_LIMIT: usize = 512;

/// Pause between chunks so the printer buffer can drain
pub const DEFAULT_CHUNK_DELAY_MS: u64 = 20;

/// Heartbeat interval in seconds
pub const DEFAULT_KEEPALIVE_INTERVAL_SECS: u64 = 30;

/// Shortest heartbeat interval accepted from configuration
pub const MIN_KEEPALIVE_INTERVAL_SECS: u64 = 10;

/// Timeout for the unattended reconnect attempt in seconds
pub const DEFAULT_RECONNECT_TIMEOUT_SECS: u64 = 10;

/// Longest reconnect timeout accepted from configuration
pub const MAX_RECONNECT_TIMEOUT_SECS: u64 = 60;

/// Scan duration in seconds
pub const DEFAULT_SCAN_DURATION_SECS: u64 = 5;

/// Devices weaker than this are ignored while scanning
pub const MIN_RSSI_THRESHOLD: i16 = -90;

/// Shortest interval the background scheduler will honor
pub const BACKGROUND_MIN_INTERVAL_SECS: u64 = 15;

/// Default background scan interval in seconds
pub const DEFAULT_BACKGROUND_INTERVAL_SECS: u64 = 60;

/// Name the background scan task is registered under
pub const BACKGROUND_TASK_NAME: &str = "background-order-scan";

/// All hints, primary first
pub fn characteristic_hints() -> impl Iterator<Item = &'static CharacteristicHint> {
    std::iter::once(&PRIMARY_HINT).chain(FALLBACK_HINTS.iter())
}
