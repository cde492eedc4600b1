//! Error types for the tracker client.
//!
//! Every transport call returns a typed result so callers can make
//! retry/abort decisions; decode and parse failures are recoverable and
//! never abort a session.

use thiserror::Error;

/// Errors raised by the BLE transport layer.
///
/// Scan, connect, discovery and write calls may all fail with one of these.
/// A failure during the connect lifecycle aborts the attempt and returns the
/// session to `Idle`; it is never retried automatically.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Bluetooth permission denied by the platform")]
    PermissionDenied,

    #[error("BLE adapter not available")]
    AdapterUnavailable,

    #[error("peripheral not found: {id}")]
    DeviceNotFound { id: String },

    #[error("scan failed: {0}")]
    ScanFailed(String),

    #[error("failed to connect: {0}")]
    ConnectFailed(String),

    #[error("failed to disconnect: {0}")]
    DisconnectFailed(String),

    #[error("service discovery failed: {0}")]
    DiscoveryFailed(String),

    #[error("failed to subscribe to notifications: {0}")]
    SubscribeFailed(String),

    #[error("failed to write to characteristic: {0}")]
    WriteFailed(String),

    #[error("failed to read signal strength: {0}")]
    ReadFailed(String),

    #[error("peripheral not connected")]
    NotConnected,
}

/// A notification payload that could not be turned into text.
///
/// Dropped with a diagnostic, never fatal.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("payload is not valid UTF-8")]
    NotText,

    #[error("malformed byte-value list: {0}")]
    BadByteList(String),
}

/// A decoded text line that does not match the telemetry grammar.
///
/// The offending line is skipped and the session keeps accumulating.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("expected at least 4 fields, got {got}")]
    TooFewFields { got: usize },

    #[error("position field has no latitude,longitude pair: {field}")]
    MalformedPosition { field: String },
}

/// Errors returned by the command dispatcher to its caller.
#[derive(Error, Debug)]
pub enum CommandError {
    /// The session has not reached a writable state, or has no resolved
    /// write characteristic / peripheral id.
    #[error("session is not ready for commands")]
    NotReady,

    /// The underlying write was rejected. Retry policy belongs to the
    /// caller (e.g. re-attempt after reconnect).
    #[error(transparent)]
    Transport(#[from] TransportError),
}
