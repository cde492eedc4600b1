//! Bluetooth Module
//!
//! Provides the BLE session layer for the GPS tracker.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                     SessionManager                       │
//! │  (state machine + registry + command dispatch)           │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │ BleTransport + BleEvent queue
//!         ┌─────────────┼─────────────┐
//!         │             │             │
//!         ▼             ▼             ▼
//! ┌───────────┐  ┌────────────┐  ┌──────────┐
//! │ Transport │  │  Central   │  │ Protocol │
//! │  (trait)  │  │ (btleplug) │  │          │
//! │ - scan    │  │ - adapter  │  │ - UUIDs  │
//! │ - connect │  │ - pumps    │  │ - decode │
//! │ - write   │  │ - write    │  │ - parse  │
//! └───────────┘  └────────────┘  └──────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] - Tracker protocol constants, frame decoding and
//!   telemetry parsing
//! - [`transport`] - The opaque hardware capability and its event stream
//! - [`central`] - btleplug-backed transport implementation
//! - [`session`] - Session lifecycle coordinator

pub mod central;
pub mod protocol;
pub mod session;
pub mod transport;

// Re-export the main surface for convenience
pub use central::BleCentral;
pub use session::{SessionConfig, SessionManager};
pub use transport::BleTransport;
