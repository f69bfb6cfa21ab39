use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bluest::{Adapter, AdvertisingDevice, Device};
use futures_util::StreamExt;
use log::{debug, info};
use regex::Regex;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::constants::MIN_RSSI_THRESHOLD;
use crate::core::bluetooth::types::PeripheralHandle;

/// Time-boxed discovery over a bluest adapter.
/// Every device seen is cached by id so it can be connected to later.
pub struct BluetoothScanner {
    adapter: Adapter,
    devices: Arc<Mutex<HashMap<String, Device>>>,
    cancel_token: Mutex<CancellationToken>,
}

impl BluetoothScanner {
    pub fn new(adapter: Adapter, devices: Arc<Mutex<HashMap<String, Device>>>) -> Self {
        Self {
            adapter,
            devices,
            cancel_token: Mutex::new(CancellationToken::new()),
        }
    }

    /// Scans until `window` elapses or `stop_scan` is called.
    pub async fn scan(&self, window: Duration) -> bluest::Result<Vec<PeripheralHandle>> {
        let cancel_token = self.fresh_token();
        let mut found: Vec<PeripheralHandle> = Vec::new();

        // Devices already connected at the OS level never advertise
        for device in self.adapter.connected_devices().await? {
            let handle = self.remember(device, None, None).await;
            info!("Found connected device: {} ({})", handle.name, handle.id);
            found.push(handle);
        }

        info!("Starting bluetooth scan for {:?}", window);
        let mut scan_stream = self.adapter.scan(&[]).await?;
        let deadline = sleep(window);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                result = scan_stream.next() => {
                    match result {
                        Some(discovered) => {
                            if let Some(handle) = self.accept(discovered).await {
                                if !found.iter().any(|h| h.id == handle.id) {
                                    info!(
                                        "Found printer candidate: Name: {}, ID: {}, Address: {:?}, RSSI: {:?}",
                                        handle.name, handle.id, handle.address, handle.rssi
                                    );
                                    found.push(handle);
                                }
                            }
                        }
                        None => {
                            info!("Bluetooth scan stream has ended.");
                            break;
                        }
                    }
                }
                _ = &mut deadline => {
                    info!("Scan window elapsed with {} candidate(s)", found.len());
                    break;
                }
                _ = cancel_token.cancelled() => {
                    info!("Scan cancelled.");
                    break;
                }
            }
        }

        Ok(found)
    }

    /// Looks for one specific device id, first among connected devices,
    /// then by scanning for at most `window`.
    pub async fn find_device(&self, id: &str, window: Duration) -> bluest::Result<Option<Device>> {
        if let Some(device) = self.devices.lock().unwrap().get(id).cloned() {
            return Ok(Some(device));
        }

        for device in self.adapter.connected_devices().await? {
            if device.id().to_string() == id {
                self.remember(device.clone(), None, None).await;
                return Ok(Some(device));
            }
        }

        debug!("Device {} not cached, scanning for it", id);
        let cancel_token = self.fresh_token();
        let mut scan_stream = self.adapter.scan(&[]).await?;
        let deadline = sleep(window);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                result = scan_stream.next() => {
                    match result {
                        Some(discovered) if discovered.device.id().to_string() == id => {
                            let device = discovered.device.clone();
                            self.accept(discovered).await;
                            return Ok(Some(device));
                        }
                        Some(_) => continue,
                        None => return Ok(None),
                    }
                }
                _ = &mut deadline => return Ok(None),
                _ = cancel_token.cancelled() => return Ok(None),
            }
        }
    }

    pub fn stop_scan(&self) {
        info!("Stopping Bluetooth scan.");
        self.cancel_token.lock().unwrap().cancel();
    }

    fn fresh_token(&self) -> CancellationToken {
        let mut guard = self.cancel_token.lock().unwrap();
        guard.cancel();
        *guard = CancellationToken::new();
        guard.clone()
    }

    async fn accept(&self, discovered: AdvertisingDevice) -> Option<PeripheralHandle> {
        debug!("Found device - Device: {:?}, RSSI: {:?}", discovered.device, discovered.rssi);
        if let Some(signal_strength) = discovered.rssi {
            if signal_strength < MIN_RSSI_THRESHOLD {
                return None;
            }
        }
        let advertised = discovered.adv_data.local_name.clone();
        let handle = self.remember(discovered.device, advertised, discovered.rssi).await;
        // Unnamed peers are beacons and phones far more often than printers
        if handle.name == "Unknown" {
            return None;
        }
        Some(handle)
    }

    async fn remember(
        &self,
        device: Device,
        advertised_name: Option<String>,
        rssi: Option<i16>,
    ) -> PeripheralHandle {
        let id = device.id().to_string();
        let name = device
            .name()
            .ok()
            .or(advertised_name)
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "Unknown".to_string());

        self.devices.lock().unwrap().insert(id.clone(), device);

        PeripheralHandle {
            address: extract_mac_address(&id),
            id,
            name,
            rssi,
        }
    }
}

fn extract_mac_address(device_id_str: &str) -> Option<String> {
    let re = Regex::new(r"([0-9A-Fa-f]{2}[:-]){5}([0-9A-Fa-f]{2})").ok()?;
    re.find_iter(device_id_str)
        .last()
        .map(|m| m.as_str().to_uppercase())
}
