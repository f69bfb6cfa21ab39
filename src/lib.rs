//! Receipt Printer Bridge library
//! Keeps a BLE thermal receipt printer connected and prints orders queued
//! by the background scan.

// Module declarations
pub mod commands;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod state;
pub mod storage;
pub mod utils;

pub use error::{PrinterError, PrinterResult};
pub use state::AppState;
