//! Bluetooth connection handling over bluest
//! This module implements the radio seams on top of the platform adapter.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bluest::error::ErrorKind;
use bluest::{Adapter, Characteristic, Device};
use log::{debug, info, warn};
use uuid::Uuid;

use crate::core::bluetooth::backend::{BleAdapter, BleLink};
use crate::core::bluetooth::constants::DEFAULT_SCAN_DURATION_SECS;
use crate::core::bluetooth::scanner::BluetoothScanner;
use crate::core::bluetooth::types::{
    CharacteristicProperties, CharacteristicRef, GattCharacteristic, GattService,
    PeripheralHandle, WriteMode,
};
use crate::error::{PrinterError, PrinterResult};

/// Maps a bluest failure into the printer taxonomy. `fallback` decides
/// what an otherwise unclassified error means in the caller's context.
fn classify(err: bluest::Error, fallback: fn(String) -> PrinterError) -> PrinterError {
    match err.kind() {
        ErrorKind::NotAuthorized => PrinterError::PermissionDenied,
        ErrorKind::AdapterUnavailable => PrinterError::AdapterUnavailable,
        ErrorKind::NotConnected => PrinterError::Disconnected,
        ErrorKind::Timeout => PrinterError::Timeout(Duration::ZERO),
        _ => fallback(err.to_string()),
    }
}

/// The platform adapter.
#[derive(Clone)]
pub struct BluestAdapter {
    adapter: Adapter,
    scanner: Arc<BluetoothScanner>,
}

impl BluestAdapter {
    pub async fn new() -> PrinterResult<Self> {
        let adapter = Adapter::default()
            .await
            .ok_or(PrinterError::AdapterUnavailable)?;
        adapter
            .wait_available()
            .await
            .map_err(|e| classify(e, PrinterError::LinkFailure))?;
        info!("Bluetooth adapter is available.");

        let devices = Arc::new(Mutex::new(HashMap::new()));
        let scanner = Arc::new(BluetoothScanner::new(adapter.clone(), devices));
        Ok(Self { adapter, scanner })
    }

    async fn resolve_device(&self, peripheral: &PeripheralHandle) -> PrinterResult<Device> {
        self.scanner
            .find_device(&peripheral.id, Duration::from_secs(DEFAULT_SCAN_DURATION_SECS))
            .await
            .map_err(|e| classify(e, PrinterError::LinkFailure))?
            .ok_or_else(|| PrinterError::PeripheralNotFound(peripheral.id.clone()))
    }
}

#[async_trait]
impl BleAdapter for BluestAdapter {
    async fn scan(&self, window: Duration) -> PrinterResult<Vec<PeripheralHandle>> {
        self.scanner
            .scan(window)
            .await
            .map_err(|e| classify(e, PrinterError::LinkFailure))
    }

    async fn connect(&self, peripheral: &PeripheralHandle) -> PrinterResult<Arc<dyn BleLink>> {
        let device = self.resolve_device(peripheral).await?;
        info!("Device details - ID: {}, Name: {}", peripheral.id, peripheral.name);

        if !device.is_connected().await {
            info!("Initiating connection to {}...", peripheral.id);
            self.adapter
                .connect_device(&device)
                .await
                .map_err(|e| classify(e, PrinterError::LinkFailure))?;
        }
        info!("Connection successful.");

        Ok(Arc::new(BluestLink {
            adapter: self.adapter.clone(),
            device,
            peripheral: peripheral.clone(),
            characteristics: Mutex::new(HashMap::new()),
        }))
    }

    fn stop_scan(&self) {
        self.scanner.stop_scan();
    }
}

/// A connected bluest device plus the characteristic handles found on it.
pub struct BluestLink {
    adapter: Adapter,
    device: Device,
    peripheral: PeripheralHandle,
    characteristics: Mutex<HashMap<(Uuid, Uuid), Characteristic>>,
}

#[async_trait]
impl BleLink for BluestLink {
    fn peripheral(&self) -> &PeripheralHandle {
        &self.peripheral
    }

    async fn is_connected(&self) -> bool {
        self.device.is_connected().await
    }

    async fn discover_services(&self) -> PrinterResult<Vec<GattService>> {
        let services = self
            .device
            .services()
            .await
            .map_err(|e| classify(e, PrinterError::LinkFailure))?;

        let mut discovered = Vec::with_capacity(services.len());
        for service in services {
            let chars = service
                .characteristics()
                .await
                .map_err(|e| classify(e, PrinterError::LinkFailure))?;

            let mut characteristics = Vec::with_capacity(chars.len());
            for characteristic in chars {
                let properties = match characteristic.properties().await {
                    Ok(props) => CharacteristicProperties {
                        write: props.write,
                        write_without_response: props.write_without_response,
                    },
                    Err(e) => {
                        warn!("Could not read properties of {}: {}", characteristic.uuid(), e);
                        CharacteristicProperties::default()
                    }
                };
                debug!(
                    "Service {} characteristic {}: {:?}",
                    service.uuid(),
                    characteristic.uuid(),
                    properties
                );
                characteristics.push(GattCharacteristic {
                    uuid: characteristic.uuid(),
                    properties,
                });
                self.characteristics
                    .lock()
                    .unwrap()
                    .insert((service.uuid(), characteristic.uuid()), characteristic);
            }

            discovered.push(GattService {
                uuid: service.uuid(),
                characteristics,
            });
        }
        Ok(discovered)
    }

    async fn write(&self, target: &CharacteristicRef, data: &[u8]) -> PrinterResult<()> {
        let characteristic = self
            .characteristics
            .lock()
            .unwrap()
            .get(&(target.service, target.characteristic))
            .cloned()
            .ok_or_else(|| {
                PrinterError::WriteFailed(format!(
                    "characteristic {} was not discovered on this link",
                    target.characteristic
                ))
            })?;

        let result = match target.write_mode {
            WriteMode::WithResponse => characteristic.write(data).await,
            WriteMode::WithoutResponse => characteristic.write_without_response(data).await,
        };
        result.map_err(|e| classify(e, PrinterError::WriteFailed))
    }

    async fn disconnect(&self) -> PrinterResult<()> {
        if self.device.is_connected().await {
            info!("Disconnecting from device {}", self.peripheral.id);
            self.adapter
                .disconnect_device(&self.device)
                .await
                .map_err(|e| classify(e, PrinterError::LinkFailure))?;
            info!("Successfully disconnected");
        } else {
            info!("Device {} not connected", self.peripheral.id);
        }
        Ok(())
    }
}
