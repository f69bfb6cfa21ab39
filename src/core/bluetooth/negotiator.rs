//! Picks the characteristic print data is written to.

use log::{debug, info, warn};

use crate::core::bluetooth::backend::BleLink;
use crate::core::bluetooth::constants::characteristic_hints;
use crate::core::bluetooth::types::{CharacteristicRef, GattService, WriteMode};
use crate::error::{PrinterError, PrinterResult};

/// Returns the first writable characteristic in discovery order.
///
/// UUID hints only decorate the log; a printer with an unknown vendor
/// layout is accepted as long as something on it takes writes.
pub async fn negotiate(link: &dyn BleLink) -> PrinterResult<CharacteristicRef> {
    let services = link.discover_services().await?;
    info!(
        "Discovered {} service(s) on {}",
        services.len(),
        link.peripheral().id
    );
    select_writable(&services).ok_or(PrinterError::NoWritableCharacteristic)
}

/// Linear walk over discovered services.
pub fn select_writable(services: &[GattService]) -> Option<CharacteristicRef> {
    for service in services {
        for characteristic in &service.characteristics {
            if !characteristic.properties.is_writable() {
                debug!("Skipping read-only characteristic {}", characteristic.uuid);
                continue;
            }

            let write_mode = if characteristic.properties.write {
                WriteMode::WithResponse
            } else {
                WriteMode::WithoutResponse
            };

            match characteristic_hints()
                .find(|h| h.service == service.uuid && h.characteristic == characteristic.uuid)
            {
                Some(hint) => info!(
                    "Selected writable characteristic {} on {} (known {} layout)",
                    characteristic.uuid, service.uuid, hint.vendor
                ),
                None => info!(
                    "Selected writable characteristic {} on {} (unlisted layout)",
                    characteristic.uuid, service.uuid
                ),
            }

            return Some(CharacteristicRef {
                service: service.uuid,
                characteristic: characteristic.uuid,
                write_mode,
            });
        }
    }

    warn!("No writable characteristic across {} service(s)", services.len());
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bluetooth::constants::PRIMARY_HINT;
    use crate::core::bluetooth::types::{CharacteristicProperties, GattCharacteristic};
    use uuid::Uuid;

    fn characteristic(uuid: u128, write: bool, write_without_response: bool) -> GattCharacteristic {
        GattCharacteristic {
            uuid: Uuid::from_u128(uuid),
            properties: CharacteristicProperties {
                write,
                write_without_response,
            },
        }
    }

    #[test]
    fn first_writable_wins_in_discovery_order() {
        let services = vec![
            GattService {
                uuid: Uuid::from_u128(0x1800),
                characteristics: vec![characteristic(0x2a00, false, false)],
            },
            GattService {
                uuid: Uuid::from_u128(0xaaaa),
                characteristics: vec![
                    characteristic(0xbb01, false, false),
                    characteristic(0xbb02, false, true),
                    characteristic(0xbb03, true, false),
                ],
            },
            GattService {
                uuid: PRIMARY_HINT.service,
                characteristics: vec![GattCharacteristic {
                    uuid: PRIMARY_HINT.characteristic,
                    properties: CharacteristicProperties {
                        write: true,
                        write_without_response: true,
                    },
                }],
            },
        ];

        let selected = select_writable(&services).unwrap();
        assert_eq!(selected.service, Uuid::from_u128(0xaaaa));
        assert_eq!(selected.characteristic, Uuid::from_u128(0xbb02));
        assert_eq!(selected.write_mode, WriteMode::WithoutResponse);
    }

    #[test]
    fn prefers_acknowledged_writes_when_both_are_offered() {
        let services = vec![GattService {
            uuid: Uuid::from_u128(0x1),
            characteristics: vec![characteristic(0x2, true, true)],
        }];
        assert_eq!(
            select_writable(&services).unwrap().write_mode,
            WriteMode::WithResponse
        );
    }

    #[test]
    fn read_only_peer_yields_nothing() {
        let services = vec![GattService {
            uuid: Uuid::from_u128(0x180a),
            characteristics: vec![characteristic(0x2a29, false, false)],
        }];
        assert_eq!(select_writable(&services), None);
        assert_eq!(select_writable(&[]), None);
    }
}
