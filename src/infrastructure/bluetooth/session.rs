//! Session coordinator.
//!
//! Drives the scan → discover → connect → negotiate → stream lifecycle for
//! a single tracker, owns the peripheral registry and the record buffer,
//! and dispatches outbound commands once the session is writable.
//!
//! All hardware events funnel through one queue and are handled one at a
//! time; state mutation is confined to the handling turn, so the machine
//! needs no locking. A transport call suspends only its own flow; events
//! arriving meanwhile stay queued and are processed on the next turn, so a
//! disconnect landing mid-connect still resets the session right after the
//! connect flow returns.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::models::{
    BleEvent, Peripheral, ScanOptions, SessionState, TelemetryRecord,
};
use crate::domain::registry::PeripheralRegistry;
use crate::domain::settings::Settings;
use crate::error::{CommandError, TransportError};
use crate::infrastructure::bluetooth::protocol::{self, LineKind};
use crate::infrastructure::bluetooth::transport::BleTransport;

/// Resolved session parameters, parsed once from [`Settings`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub service: Uuid,
    pub write_char: Uuid,
    pub notify_char: Uuid,
    pub scan_window: Duration,
    pub scan_options: ScanOptions,
    pub settle_delay: Duration,
    pub telemetry_request: String,
    pub associated_peripheral: Option<String>,
}

impl SessionConfig {
    pub fn from_settings(settings: &Settings) -> Result<Self, uuid::Error> {
        Ok(Self {
            service: protocol::parse_uuid(&settings.ble_service_uuid)?,
            write_char: protocol::parse_uuid(&settings.ble_write_char_uuid)?,
            notify_char: protocol::parse_uuid(&settings.ble_notify_char_uuid)?,
            scan_window: Duration::from_secs(settings.scan_seconds),
            scan_options: ScanOptions {
                allow_duplicates: settings.allow_duplicate_reports,
                ..ScanOptions::default()
            },
            settle_delay: Duration::from_millis(settings.settle_delay_ms),
            telemetry_request: settings.telemetry_request.clone(),
            associated_peripheral: settings.associated_peripheral_id.clone(),
        })
    }
}

/// The single active telemetry session.
#[derive(Debug)]
struct Session {
    peripheral_id: String,
    service: Uuid,
    /// Negotiated during service discovery, configured default otherwise.
    write_char: Uuid,
    notify_char: Uuid,
    /// Append-only record buffer, cleared by a start marker.
    records: Vec<TelemetryRecord>,
}

/// Coordinates the transport, the registry and the session state machine.
pub struct SessionManager {
    transport: Arc<dyn BleTransport>,
    config: SessionConfig,
    registry: PeripheralRegistry,
    session: Option<Session>,
    state: SessionState,
    is_scanning: bool,
    events: Option<mpsc::UnboundedReceiver<BleEvent>>,
}

impl SessionManager {
    pub fn new(transport: Arc<dyn BleTransport>, config: SessionConfig) -> Self {
        Self {
            transport,
            config,
            registry: PeripheralRegistry::new(),
            session: None,
            state: SessionState::Idle,
            is_scanning: false,
            events: None,
        }
    }

    /// Attach the hardware event queue. Until `start` is called no events
    /// are consumed; after [`stop`](Self::stop) none are either. The
    /// intake lifecycle is explicit and independent of any presentation
    /// layer.
    pub fn start(&mut self, events: mpsc::UnboundedReceiver<BleEvent>) {
        if self.events.is_some() {
            warn!("event intake already started, replacing queue");
        }
        self.events = Some(events);
        info!("session manager started");
    }

    /// Detach and drop the event queue.
    pub fn stop(&mut self) {
        if self.events.take().is_some() {
            info!("session manager stopped");
        }
    }

    pub fn is_started(&self) -> bool {
        self.events.is_some()
    }

    /// Await and handle the next hardware event. Returns `false` once the
    /// queue is detached or closed.
    pub async fn step(&mut self) -> bool {
        let Some(events) = self.events.as_mut() else {
            return false;
        };
        match events.recv().await {
            Some(event) => {
                self.handle_event(event);
                true
            }
            None => false,
        }
    }

    /// Drain every event already queued, without blocking. Returns the
    /// number handled.
    pub fn process_pending(&mut self) -> usize {
        let mut handled = 0;
        loop {
            let Some(events) = self.events.as_mut() else {
                return handled;
            };
            match events.try_recv() {
                Ok(event) => {
                    self.handle_event(event);
                    handled += 1;
                }
                Err(_) => return handled,
            }
        }
    }

    /// Apply one hardware event to the session and registry state.
    pub fn handle_event(&mut self, event: BleEvent) {
        match event {
            BleEvent::PeripheralDiscovered { id, name, rssi } => {
                if !self.is_scanning {
                    debug!(id = %id, "discovery after scan stop ignored");
                    return;
                }
                debug!(id = %id, ?name, ?rssi, "peripheral discovered");
                self.registry.upsert(Peripheral::discovered(id, name, rssi));
                if self.state == SessionState::Scanning {
                    self.state = SessionState::CandidateFound;
                }
            }
            BleEvent::ScanStopped => {
                // Only the scanning flag; the session keeps whatever state
                // it reached.
                info!("scan stopped");
                self.is_scanning = false;
            }
            BleEvent::PeripheralConnected { id } => {
                debug!(id = %id, "peripheral connected");
                self.registry.mark_connected(&id);
            }
            BleEvent::PeripheralDisconnected { id } => {
                self.registry.mark_disconnected(&id);
                let is_target = self
                    .session
                    .as_ref()
                    .is_some_and(|s| s.peripheral_id == id);
                if is_target && self.state != SessionState::Idle {
                    info!(id = %id, "peripheral disconnected, session reset");
                    self.state = SessionState::Idle;
                }
            }
            BleEvent::CharacteristicValueUpdated {
                id,
                characteristic,
                value,
            } => self.ingest_notification(&id, characteristic, &value),
        }
    }

    /// Route one notification payload through decode → classify → parse.
    /// Malformed payloads and lines are dropped with a diagnostic; the
    /// session keeps accumulating.
    fn ingest_notification(&mut self, id: &str, characteristic: Uuid, value: &[u8]) {
        if !matches!(self.state, SessionState::Ready | SessionState::Streaming) {
            debug!(id = %id, "notification outside an active session ignored");
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.peripheral_id != id || characteristic != session.notify_char {
            debug!(id = %id, %characteristic, "notification for foreign characteristic ignored");
            return;
        }

        let line = match protocol::decode_payload(value) {
            Ok(line) => line,
            Err(e) => {
                warn!("dropping undecodable payload: {}", e);
                return;
            }
        };

        match protocol::classify(&line) {
            LineKind::Start => {
                debug!("telemetry block start, resetting buffer");
                session.records.clear();
            }
            LineKind::End => {
                debug!(
                    records = session.records.len(),
                    "telemetry block complete"
                );
                // Block done: the session is writable for the next request.
                if self.state == SessionState::Streaming {
                    self.state = SessionState::Ready;
                }
            }
            LineKind::Data => match protocol::parse_record(&line) {
                Ok(record) => session.records.push(record),
                Err(e) => warn!(line = %line, "skipping malformed telemetry line: {}", e),
            },
        }
    }

    /// Start a fresh scan: clears the registry and drops the previous
    /// session together with its buffer.
    pub async fn start_scan(&mut self) -> Result<(), TransportError> {
        info!("starting scan");
        self.registry.clear();
        self.session = None;
        self.state = SessionState::Scanning;
        self.is_scanning = true;

        let result = self
            .transport
            .scan(
                &[self.config.service],
                self.config.scan_window,
                self.config.scan_options,
            )
            .await;
        if let Err(e) = result {
            warn!("scan failed: {}", e);
            self.is_scanning = false;
            self.state = SessionState::Idle;
            return Err(e);
        }
        Ok(())
    }

    /// Connect to a peripheral and negotiate the session up to `Ready`.
    ///
    /// Connect failure aborts back to `Idle`. Service discovery and the
    /// signal strength read are non-fatal: command traffic can proceed on
    /// the configured default characteristics.
    pub async fn connect(&mut self, id: &str) -> Result<(), TransportError> {
        info!(id = %id, "connecting");
        self.session = Some(Session {
            peripheral_id: id.to_string(),
            service: self.config.service,
            write_char: self.config.write_char,
            notify_char: self.config.notify_char,
            records: Vec::new(),
        });
        self.state = SessionState::Connecting;
        self.registry.mark_connecting(id);

        if let Err(e) = self.transport.connect(id).await {
            warn!(id = %id, "connect failed: {}", e);
            self.registry.mark_disconnected(id);
            self.session = None;
            self.state = SessionState::Idle;
            return Err(e);
        }
        self.registry.mark_connected(id);
        self.state = SessionState::Connected;

        // Let bonding and connection parameters settle before GATT traffic.
        tokio::time::sleep(self.config.settle_delay).await;

        match self.transport.discover_services(id).await {
            Ok(characteristics) => {
                let write = characteristics
                    .iter()
                    .find(|c| c.uuid == self.config.write_char)
                    .or_else(|| {
                        characteristics
                            .iter()
                            .find(|c| c.service == self.config.service && c.writable)
                    })
                    .map(|c| c.uuid);
                let notify = characteristics
                    .iter()
                    .find(|c| c.uuid == self.config.notify_char)
                    .or_else(|| {
                        characteristics
                            .iter()
                            .find(|c| c.service == self.config.service && c.notifiable)
                    })
                    .map(|c| c.uuid);
                if let Some(session) = self.session.as_mut() {
                    if let Some(uuid) = write {
                        session.write_char = uuid;
                    }
                    if let Some(uuid) = notify {
                        session.notify_char = uuid;
                    }
                }
                debug!(?write, ?notify, "service discovery complete");
            }
            Err(e) => {
                warn!(id = %id, "service discovery failed, using configured defaults: {}", e);
            }
        }

        match self.transport.read_signal_strength(id).await {
            Ok(Some(rssi)) => self.registry.set_rssi(id, rssi),
            Ok(None) => {}
            Err(e) => debug!(id = %id, "signal strength unavailable: {}", e),
        }
        self.state = SessionState::ServicesDiscovered;

        let (service, notify_char) = match self.session.as_ref() {
            Some(session) => (session.service, session.notify_char),
            None => return Err(TransportError::NotConnected),
        };
        if let Err(e) = self.transport.subscribe(id, service, notify_char).await {
            // The tracker pushes its log unprompted on some firmware
            // revisions, so a failed subscription is not the end.
            warn!(id = %id, "subscription failed: {}", e);
        }

        self.state = SessionState::Ready;
        info!(id = %id, "session ready");
        Ok(())
    }

    /// Tear down the current session's link. The machine rests at
    /// `Disconnected`; records stay readable until the next scan or
    /// connect replaces the session.
    pub async fn disconnect(&mut self) -> Result<(), TransportError> {
        let Some(id) = self.session.as_ref().map(|s| s.peripheral_id.clone()) else {
            return Ok(());
        };
        self.transport.disconnect(&id).await?;
        self.registry.mark_disconnected(&id);
        self.state = SessionState::Disconnected;
        info!(id = %id, "disconnected");
        Ok(())
    }

    /// Companion flow: connect the configured associated tracker without a
    /// fresh scan, then request its telemetry block. Falls back to active
    /// scanning when none is configured. Returns `true` when a direct
    /// connection was made.
    pub async fn connect_associated(&mut self) -> Result<bool, CommandError> {
        let Some(id) = self.config.associated_peripheral.clone() else {
            info!("no associated tracker configured, falling back to scan");
            self.start_scan().await.map_err(CommandError::Transport)?;
            return Ok(false);
        };

        // Not discovered by a scan, so seed the registry entry ourselves.
        self.registry
            .upsert(Peripheral::discovered(id.clone(), None, None));
        self.connect(&id).await.map_err(CommandError::Transport)?;
        self.request_telemetry().await?;
        Ok(true)
    }

    /// Encode and write a command. Requires a writable session; the write
    /// is fire-and-forget and a rejection is returned to the caller
    /// unretried.
    pub async fn send_command(&mut self, text: &str) -> Result<(), CommandError> {
        if !matches!(self.state, SessionState::Ready | SessionState::Streaming) {
            return Err(CommandError::NotReady);
        }
        let Some(session) = self.session.as_ref() else {
            return Err(CommandError::NotReady);
        };

        let payload = protocol::encode_command(text);
        self.transport
            .write_without_ack(
                &session.peripheral_id,
                session.service,
                session.write_char,
                &payload,
            )
            .await?;
        debug!(command = %text, "command written");
        Ok(())
    }

    /// Ask the tracker to stream its stored telemetry block. A successful
    /// write moves the session from `Ready` to `Streaming`.
    pub async fn request_telemetry(&mut self) -> Result<(), CommandError> {
        let command = self.config.telemetry_request.clone();
        self.send_command(&command).await?;
        if self.state == SessionState::Ready {
            self.state = SessionState::Streaming;
            info!("telemetry stream requested");
        }
        Ok(())
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_scanning(&self) -> bool {
        self.is_scanning
    }

    pub fn registry(&self) -> &PeripheralRegistry {
        &self.registry
    }

    /// Insertion-ordered view of the discovered peripherals, for
    /// presentation.
    pub fn peripherals(&self) -> Vec<Peripheral> {
        self.registry.snapshot()
    }

    /// Records accumulated by the current session.
    pub fn records(&self) -> &[TelemetryRecord] {
        self.session
            .as_ref()
            .map(|s| s.records.as_slice())
            .unwrap_or(&[])
    }

    /// Id of the session's target peripheral, if a session exists.
    pub fn session_peripheral(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.peripheral_id.as_str())
    }
}
