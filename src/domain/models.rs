use uuid::Uuid;

/// Display name used when a peripheral advertises no local name.
pub const NO_NAME: &str = "NO NAME";

/// Connection lifecycle of a single peripheral, as tracked by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Unknown,
    Discovered,
    Connecting,
    Connected,
    Disconnected,
}

/// A discovered BLE peripheral.
///
/// Immutable value type: the registry replaces the whole entry on every
/// mutation instead of aliasing shared state across event handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peripheral {
    /// Stable platform identifier. An opaque string, not a capability.
    pub id: String,
    pub name: String,
    /// Signal strength in dBm, when the platform reported one.
    pub rssi: Option<i16>,
    pub status: ConnectionStatus,
}

impl Peripheral {
    /// Build an entry from a discovery event, defaulting an absent
    /// advertised name to the [`NO_NAME`] sentinel.
    pub fn discovered(id: impl Into<String>, name: Option<String>, rssi: Option<i16>) -> Self {
        Self {
            id: id.into(),
            name: name.filter(|n| !n.is_empty()).unwrap_or_else(|| NO_NAME.to_string()),
            rssi,
            status: ConnectionStatus::Discovered,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    pub fn is_connecting(&self) -> bool {
        self.status == ConnectionStatus::Connecting
    }
}

/// One decoded telemetry line: `<index> <date> <time> <lat>,<lon>`.
///
/// Fields are kept as the raw validated strings from the wire; the device
/// emits fixed-point decimals and reformatting them is a presentation
/// concern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryRecord {
    pub seq: String,
    pub date: String,
    pub time: String,
    pub lat: String,
    pub lon: String,
}

/// States of the single-peripheral session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Scanning,
    CandidateFound,
    Connecting,
    Connected,
    ServicesDiscovered,
    /// Writable: the command dispatcher may be invoked.
    Ready,
    /// A telemetry request succeeded; notifications are being accumulated.
    Streaming,
    Disconnected,
}

/// Discrete hardware notifications delivered by the transport into the
/// session's event queue.
#[derive(Debug, Clone)]
pub enum BleEvent {
    PeripheralDiscovered {
        id: String,
        name: Option<String>,
        rssi: Option<i16>,
    },
    /// The scan window elapsed or the platform stopped the scan.
    /// Authoritative: discoveries after this are ignored.
    ScanStopped,
    PeripheralConnected {
        id: String,
    },
    PeripheralDisconnected {
        id: String,
    },
    CharacteristicValueUpdated {
        id: String,
        characteristic: Uuid,
        value: Vec<u8>,
    },
}

/// One characteristic reported by service discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharacteristicInfo {
    pub service: Uuid,
    pub uuid: Uuid,
    pub writable: bool,
    pub notifiable: bool,
}

/// Scan tuning knobs forwarded to the transport.
#[derive(Debug, Clone, Copy)]
pub struct ScanOptions {
    pub allow_duplicates: bool,
    pub low_latency: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            allow_duplicates: true,
            low_latency: true,
        }
    }
}
