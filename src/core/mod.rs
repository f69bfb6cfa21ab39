//! Core functionality for the receipt printer bridge
//! This module contains the printer link, the background order scan and
//! the foreground print flow.

pub mod background;
pub mod bluetooth;
pub mod orders;
pub mod printing;

// Re-export commonly used types
pub use bluetooth::{PrinterManager, ReconnectionSupervisor};
pub use printing::{DrainReport, ForegroundPrinter};
