//! Production [`BleTransport`] over the system BLE central (btleplug).
//!
//! Translates between the session layer's capability contract and the
//! platform stack: adapter bring-up, the scan window timer (whose stop
//! event is authoritative), the central event pump, and per-peripheral
//! notification pumps. All hardware happenings end up as [`BleEvent`]s on
//! the queue handed over at construction.

use std::collections::{BTreeSet, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{
    Central, CentralEvent, CharPropFlags, Characteristic, Manager as _, Peripheral as _,
    ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager};
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::models::{BleEvent, CharacteristicInfo, ScanOptions};
use crate::error::TransportError;
use crate::infrastructure::bluetooth::transport::BleTransport;

/// BLE central backed by the first system adapter.
pub struct BleCentral {
    adapter: Adapter,
    events: mpsc::UnboundedSender<BleEvent>,
    /// Peripherals that already have a notification pump running.
    notified: Mutex<HashSet<String>>,
}

impl BleCentral {
    /// Bring up the first available adapter and start forwarding central
    /// events into `events`.
    pub async fn new(events: mpsc::UnboundedSender<BleEvent>) -> Result<Self, TransportError> {
        let manager = Manager::new()
            .await
            .map_err(|_| TransportError::AdapterUnavailable)?;
        let adapter = manager
            .adapters()
            .await
            .map_err(|_| TransportError::AdapterUnavailable)?
            .into_iter()
            .next()
            .ok_or(TransportError::AdapterUnavailable)?;

        let stream = adapter
            .events()
            .await
            .map_err(|_| TransportError::AdapterUnavailable)?;
        tokio::spawn(Self::pump_central_events(
            adapter.clone(),
            stream,
            events.clone(),
        ));

        info!("BLE adapter initialized");
        Ok(Self {
            adapter,
            events,
            notified: Mutex::new(HashSet::new()),
        })
    }

    async fn pump_central_events(
        adapter: Adapter,
        mut stream: std::pin::Pin<Box<dyn futures::Stream<Item = CentralEvent> + Send>>,
        events: mpsc::UnboundedSender<BleEvent>,
    ) {
        while let Some(event) = stream.next().await {
            match event {
                CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => {
                    let Ok(peripheral) = adapter.peripheral(&id).await else {
                        continue;
                    };
                    let props = peripheral.properties().await.ok().flatten();
                    let (name, rssi) = match props {
                        Some(p) => (p.local_name, p.rssi),
                        None => (None, None),
                    };
                    let _ = events.send(BleEvent::PeripheralDiscovered {
                        id: id.to_string(),
                        name,
                        rssi,
                    });
                }
                CentralEvent::DeviceConnected(id) => {
                    let _ = events.send(BleEvent::PeripheralConnected { id: id.to_string() });
                }
                CentralEvent::DeviceDisconnected(id) => {
                    let _ = events.send(BleEvent::PeripheralDisconnected { id: id.to_string() });
                }
                _ => {}
            }
        }
        debug!("central event stream closed");
    }

    async fn find_peripheral(
        &self,
        id: &str,
    ) -> Result<btleplug::platform::Peripheral, TransportError> {
        let peripherals = self
            .adapter
            .peripherals()
            .await
            .map_err(|_| TransportError::AdapterUnavailable)?;
        peripherals
            .into_iter()
            .find(|p| p.id().to_string() == id)
            .ok_or_else(|| TransportError::DeviceNotFound { id: id.to_string() })
    }

    /// Resolve a characteristic from the enumerated set, or synthesize one
    /// from the configured UUIDs so traffic can proceed when enumeration
    /// reported nothing.
    fn resolve_characteristic(
        &self,
        peripheral: &btleplug::platform::Peripheral,
        service: Uuid,
        characteristic: Uuid,
        fallback_props: CharPropFlags,
    ) -> Characteristic {
        peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == characteristic)
            .unwrap_or(Characteristic {
                uuid: characteristic,
                service_uuid: service,
                properties: fallback_props,
                descriptors: BTreeSet::new(),
            })
    }
}

#[async_trait]
impl BleTransport for BleCentral {
    async fn scan(
        &self,
        service_filters: &[Uuid],
        duration: Duration,
        options: ScanOptions,
    ) -> Result<(), TransportError> {
        // The platform central has no duplicate/latency knobs; the filter
        // is what it honors.
        debug!(
            allow_duplicates = options.allow_duplicates,
            low_latency = options.low_latency,
            "starting scan"
        );
        self.adapter
            .start_scan(ScanFilter {
                services: service_filters.to_vec(),
            })
            .await
            .map_err(|e| wrap(e, TransportError::ScanFailed))?;

        // Enforce the scan window here: the stop event this task emits is
        // the authoritative end of discovery.
        let adapter = self.adapter.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            if let Err(e) = adapter.stop_scan().await {
                warn!("failed to stop scan: {}", e);
            }
            let _ = events.send(BleEvent::ScanStopped);
        });
        Ok(())
    }

    async fn connect(&self, id: &str) -> Result<(), TransportError> {
        let peripheral = self.find_peripheral(id).await?;
        peripheral
            .connect()
            .await
            .map_err(|e| wrap(e, TransportError::ConnectFailed))
    }

    async fn disconnect(&self, id: &str) -> Result<(), TransportError> {
        let peripheral = self.find_peripheral(id).await?;
        peripheral
            .disconnect()
            .await
            .map_err(|e| wrap(e, TransportError::DisconnectFailed))
    }

    async fn discover_services(
        &self,
        id: &str,
    ) -> Result<Vec<CharacteristicInfo>, TransportError> {
        let peripheral = self.find_peripheral(id).await?;
        peripheral
            .discover_services()
            .await
            .map_err(|e| wrap(e, TransportError::DiscoveryFailed))?;

        let characteristics = peripheral
            .characteristics()
            .into_iter()
            .map(|c| CharacteristicInfo {
                service: c.service_uuid,
                uuid: c.uuid,
                writable: c
                    .properties
                    .intersects(CharPropFlags::WRITE | CharPropFlags::WRITE_WITHOUT_RESPONSE),
                notifiable: c.properties.contains(CharPropFlags::NOTIFY),
            })
            .collect();
        Ok(characteristics)
    }

    async fn read_signal_strength(&self, id: &str) -> Result<Option<i16>, TransportError> {
        let peripheral = self.find_peripheral(id).await?;
        let props = peripheral
            .properties()
            .await
            .map_err(|e| wrap(e, TransportError::ReadFailed))?;
        Ok(props.and_then(|p| p.rssi))
    }

    async fn write_without_ack(
        &self,
        id: &str,
        service: Uuid,
        characteristic: Uuid,
        payload: &[u8],
    ) -> Result<(), TransportError> {
        let peripheral = self.find_peripheral(id).await?;
        let target = self.resolve_characteristic(
            &peripheral,
            service,
            characteristic,
            CharPropFlags::WRITE_WITHOUT_RESPONSE,
        );
        peripheral
            .write(&target, payload, WriteType::WithoutResponse)
            .await
            .map_err(|e| wrap(e, TransportError::WriteFailed))
    }

    async fn subscribe(
        &self,
        id: &str,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<(), TransportError> {
        let peripheral = self.find_peripheral(id).await?;
        let target =
            self.resolve_characteristic(&peripheral, service, characteristic, CharPropFlags::NOTIFY);
        peripheral
            .subscribe(&target)
            .await
            .map_err(|e| wrap(e, TransportError::SubscribeFailed))?;

        // One notification pump per peripheral, shared by all of its
        // subscribed characteristics.
        if self.notified.lock().unwrap().contains(id) {
            return Ok(());
        }
        let mut notifications = peripheral
            .notifications()
            .await
            .map_err(|e| wrap(e, TransportError::SubscribeFailed))?;
        self.notified.lock().unwrap().insert(id.to_string());

        let events = self.events.clone();
        let peripheral_id = id.to_string();
        tokio::spawn(async move {
            while let Some(notification) = notifications.next().await {
                let _ = events.send(BleEvent::CharacteristicValueUpdated {
                    id: peripheral_id.clone(),
                    characteristic: notification.uuid,
                    value: notification.value,
                });
            }
            debug!("notification stream for {} closed", peripheral_id);
        });
        Ok(())
    }
}

/// Map a platform error, routing the variants the session layer reacts to
/// (permissions, connection loss) to their own kinds.
fn wrap(err: btleplug::Error, make: impl FnOnce(String) -> TransportError) -> TransportError {
    match err {
        btleplug::Error::PermissionDenied => TransportError::PermissionDenied,
        btleplug::Error::NotConnected => TransportError::NotConnected,
        other => make(other.to_string()),
    }
}
