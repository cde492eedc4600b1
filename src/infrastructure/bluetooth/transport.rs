//! The BLE hardware capability consumed by the session layer.
//!
//! The OS radio stack is an external collaborator: the session state
//! machine only ever talks to it through [`BleTransport`], and the
//! transport reports hardware happenings as [`BleEvent`]s pushed into the
//! event queue handed over at construction time. Tests drive the session
//! with a scripted implementation of the same trait.

use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;

use crate::domain::models::{CharacteristicInfo, ScanOptions};
use crate::error::TransportError;

/// Operations the radio layer exposes. All calls are awaited; completion of
/// a call and delivery of the corresponding hardware event are separate,
/// so a `connect` may return before (or after) `PeripheralConnected` lands
/// on the queue.
#[async_trait]
pub trait BleTransport: Send + Sync {
    /// Scan for peripherals advertising one of `service_filters` for
    /// `duration`. The transport owns the duration bound and emits the
    /// authoritative [`BleEvent::ScanStopped`](crate::domain::models::BleEvent)
    /// when the window closes.
    async fn scan(
        &self,
        service_filters: &[Uuid],
        duration: Duration,
        options: ScanOptions,
    ) -> Result<(), TransportError>;

    async fn connect(&self, id: &str) -> Result<(), TransportError>;

    async fn disconnect(&self, id: &str) -> Result<(), TransportError>;

    /// Enumerate the peripheral's services and characteristics. An empty
    /// result is valid; callers fall back to configured defaults.
    async fn discover_services(&self, id: &str)
        -> Result<Vec<CharacteristicInfo>, TransportError>;

    /// Latest known signal strength in dBm, if the platform has one.
    async fn read_signal_strength(&self, id: &str) -> Result<Option<i16>, TransportError>;

    /// Fire-and-forget write: no acknowledgment is awaited at this layer.
    async fn write_without_ack(
        &self,
        id: &str,
        service: Uuid,
        characteristic: Uuid,
        payload: &[u8],
    ) -> Result<(), TransportError>;

    /// Subscribe to notifications on a characteristic; subsequent values
    /// arrive as `CharacteristicValueUpdated` events.
    async fn subscribe(
        &self,
        id: &str,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<(), TransportError>;
}
