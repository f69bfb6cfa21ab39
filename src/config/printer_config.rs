use std::time::Duration;

use anyhow::Result;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::core::bluetooth::commands::{CutMode, FontSizeTier, PrinterCommand, TextEncoding};
use crate::core::bluetooth::{
    DEFAULT_CHUNK_DELAY_MS, DEFAULT_KEEPALIVE_INTERVAL_SECS, DEFAULT_MAX_CHUNK_SIZE,
    DEFAULT_RECONNECT_TIMEOUT_SECS, DEFAULT_SCAN_DURATION_SECS, MAX_CHUNK_SIZE_LIMIT,
    MAX_RECONNECT_TIMEOUT_SECS, MIN_KEEPALIVE_INTERVAL_SECS,
};
use crate::storage::{KEY_PRINTER_CONFIG, KeyValueStore};

/// Radio pacing and timeouts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkSettings {
    /// Largest single write in bytes.
    pub max_chunk_size: usize,
    /// Pause between chunks, giving the printer buffer time to drain.
    pub chunk_delay_ms: u64,
    /// Heartbeat period while connected.
    pub keepalive_interval_secs: u64,
    /// Upper bound on the unattended reconnect attempt.
    pub reconnect_timeout_secs: u64,
    /// Length of a manual discovery window.
    pub scan_duration_secs: u64,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            chunk_delay_ms: DEFAULT_CHUNK_DELAY_MS,
            keepalive_interval_secs: DEFAULT_KEEPALIVE_INTERVAL_SECS,
            reconnect_timeout_secs: DEFAULT_RECONNECT_TIMEOUT_SECS,
            scan_duration_secs: DEFAULT_SCAN_DURATION_SECS,
        }
    }
}

impl LinkSettings {
    /// Clamps hand-edited values into ranges the printer link can live with.
    pub fn sanitized(&self) -> Self {
        Self {
            max_chunk_size: self.max_chunk_size.clamp(1, MAX_CHUNK_SIZE_LIMIT),
            chunk_delay_ms: self.chunk_delay_ms,
            keepalive_interval_secs: self.keepalive_interval_secs.max(MIN_KEEPALIVE_INTERVAL_SECS),
            reconnect_timeout_secs: self
                .reconnect_timeout_secs
                .clamp(1, MAX_RECONNECT_TIMEOUT_SECS),
            scan_duration_secs: self.scan_duration_secs.max(1),
        }
    }

    pub fn chunk_delay(&self) -> Duration {
        Duration::from_millis(self.chunk_delay_ms)
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_interval_secs)
    }

    pub fn reconnect_timeout(&self) -> Duration {
        Duration::from_secs(self.reconnect_timeout_secs)
    }

    pub fn scan_duration(&self) -> Duration {
        Duration::from_secs(self.scan_duration_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrinterConfig {
    /// Whether the background scan queues awaiting orders by itself.
    pub auto_print_enabled: bool,

    /// Cut the paper after each receipt.
    pub auto_cut_enabled: bool,

    pub cut_mode: CutMode,

    /// Size tier for receipt text. Unknown names read as `normal`.
    pub text_size: FontSizeTier,

    pub encoding: TextEncoding,

    /// Bytes written as heartbeat. `None` uses the status query, which some
    /// firmware may still react to; such printers can override it here.
    pub heartbeat_command: Option<Vec<u8>>,

    pub link: LinkSettings,
}

impl Default for PrinterConfig {
    fn default() -> Self {
        PrinterConfig {
            auto_print_enabled: false,
            auto_cut_enabled: true,
            cut_mode: CutMode::Full,
            text_size: FontSizeTier::Normal,
            encoding: TextEncoding::Utf8,
            heartbeat_command: None,
            link: LinkSettings::default(),
        }
    }
}

impl PrinterConfig {
    pub fn heartbeat_bytes(&self) -> Vec<u8> {
        match &self.heartbeat_command {
            Some(bytes) if !bytes.is_empty() => bytes.clone(),
            _ => PrinterCommand::StatusQuery.to_bytes(),
        }
    }

    /// Loads the config from the store, falling back to defaults.
    pub async fn load_config(store: &dyn KeyValueStore) -> Result<Self> {
        let Some(config_json) = store.get(KEY_PRINTER_CONFIG).await? else {
            warn!("Printer config not found, using default.");
            return Ok(Self::default());
        };

        match serde_json::from_str::<Self>(&config_json) {
            Ok(config) => {
                info!("Printer config loaded.");
                Ok(config)
            }
            Err(e) => {
                warn!("Printer config unreadable ({}), using default.", e);
                Ok(Self::default())
            }
        }
    }

    /// Saves the current config to the store.
    pub async fn save_config(&self, store: &dyn KeyValueStore) -> Result<()> {
        let config_json = match serde_json::to_string_pretty(&self) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize printer config to JSON: {}", e);
                return Err(e.into());
            }
        };

        store.set(KEY_PRINTER_CONFIG, &config_json).await?;
        info!("Printer config saved.");
        Ok(())
    }
}
