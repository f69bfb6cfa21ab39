//! Error types for the printer link.

use std::time::Duration;

use thiserror::Error;

/// Failures surfaced by printer operations.
///
/// An elapsed discovery window is not represented here: a scan that finds
/// nothing simply returns an empty list.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PrinterError {
    /// Bluetooth (or location) permission is missing at the OS level.
    #[error("Bluetooth permission denied")]
    PermissionDenied,

    /// No Bluetooth adapter is present or it never became available.
    #[error("No Bluetooth adapter available")]
    AdapterUnavailable,

    /// The peer exposes no characteristic that accepts writes.
    #[error("Printer exposes no writable characteristic")]
    NoWritableCharacteristic,

    /// The radio could not reach the peer while connecting.
    #[error("Link failure: {0}")]
    LinkFailure(String),

    /// There is no live session, or the link dropped.
    #[error("Printer disconnected")]
    Disconnected,

    /// A write reached the radio stack but did not complete.
    #[error("Write failed: {0}")]
    WriteFailed(String),

    /// A bounded radio operation ran out of time.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// No peripheral with the requested identity could be found.
    #[error("Peripheral not found: {0}")]
    PeripheralNotFound(String),

    /// The OS refused or restricted background execution.
    #[error("Background execution restricted")]
    BackgroundRestricted,

    /// Persisted state could not be read or written.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl PrinterError {
    /// Returns true when the error means the session can no longer be used.
    pub fn is_link_loss(&self) -> bool {
        matches!(self, Self::Disconnected | Self::LinkFailure(_))
    }
}

impl From<anyhow::Error> for PrinterError {
    fn from(err: anyhow::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

pub type PrinterResult<T> = Result<T, PrinterError>;
