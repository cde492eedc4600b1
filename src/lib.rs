//! BLE GPS tracker client.
//!
//! Scans for trackers advertising the `fff0` service, connects and
//! negotiates their GATT layout, requests the stored position log with a
//! plain-text command, and accumulates the line-oriented telemetry the
//! device notifies back. Rendering, navigation and permission prompts are
//! someone else's job: this crate exposes the registry snapshot, the
//! session actions and the record buffer.

pub mod domain;
pub mod error;
pub mod infrastructure;

pub use domain::models::{
    BleEvent, CharacteristicInfo, ConnectionStatus, Peripheral, ScanOptions, SessionState,
    TelemetryRecord, NO_NAME,
};
pub use domain::registry::PeripheralRegistry;
pub use domain::settings::{LogSettings, Settings, SettingsService};
pub use error::{CommandError, DecodeError, ParseError, TransportError};
pub use infrastructure::bluetooth::{BleCentral, BleTransport, SessionConfig, SessionManager};
