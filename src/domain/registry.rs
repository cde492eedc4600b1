//! Registry of peripherals seen during the current scan session.
//!
//! The registry is the only owner of [`Peripheral`] values. Every mutation
//! replaces the affected entry with a new value; nothing hands out shared
//! mutable references, so pending event handlers can never alias an entry.

use crate::domain::models::{ConnectionStatus, Peripheral};

/// Insertion-ordered, deduplicated-by-id collection of peripherals.
#[derive(Debug, Default)]
pub struct PeripheralRegistry {
    entries: Vec<Peripheral>,
    version: u64,
}

impl PeripheralRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a freshly discovered peripheral, or update the existing entry
    /// with the same id in place.
    ///
    /// A discovery event is a full update for the advertised fields: it
    /// replaces `name` (sentinel included). Connection status and a
    /// previously read RSSI are not advertised, so they are carried over
    /// when the incoming event does not supply them.
    pub fn upsert(&mut self, incoming: Peripheral) {
        match self.entries.iter_mut().find(|p| p.id == incoming.id) {
            Some(existing) => {
                let status = if existing.status == ConnectionStatus::Unknown {
                    incoming.status
                } else {
                    existing.status
                };
                *existing = Peripheral {
                    rssi: incoming.rssi.or(existing.rssi),
                    status,
                    ..incoming
                };
            }
            None => self.entries.push(incoming),
        }
        self.version += 1;
    }

    pub fn mark_connecting(&mut self, id: &str) {
        self.set_status(id, ConnectionStatus::Connecting);
    }

    pub fn mark_connected(&mut self, id: &str) {
        self.set_status(id, ConnectionStatus::Connected);
    }

    pub fn mark_disconnected(&mut self, id: &str) {
        self.set_status(id, ConnectionStatus::Disconnected);
    }

    /// Record a signal strength reading. No-op for unknown ids.
    pub fn set_rssi(&mut self, id: &str, rssi: i16) {
        if let Some(existing) = self.entries.iter_mut().find(|p| p.id == id) {
            if existing.rssi != Some(rssi) {
                existing.rssi = Some(rssi);
                self.version += 1;
            }
        }
    }

    /// Status updates never create an entry; an id the registry has not
    /// discovered is ignored.
    fn set_status(&mut self, id: &str, status: ConnectionStatus) {
        if let Some(existing) = self.entries.iter_mut().find(|p| p.id == id) {
            if existing.status != status {
                existing.status = status;
                self.version += 1;
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&Peripheral> {
        self.entries.iter().find(|p| p.id == id)
    }

    /// Current entries in insertion order of first discovery. The order is
    /// stable across updates.
    pub fn snapshot(&self) -> Vec<Peripheral> {
        self.entries.clone()
    }

    /// Monotonic counter bumped on every effective mutation, so a
    /// presentation layer can cheaply detect change.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop all entries. Used when a new scan starts.
    pub fn clear(&mut self) {
        if !self.entries.is_empty() {
            self.entries.clear();
            self.version += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::NO_NAME;

    fn discovered(id: &str, name: Option<&str>, rssi: Option<i16>) -> Peripheral {
        Peripheral::discovered(id, name.map(str::to_string), rssi)
    }

    #[test]
    fn upsert_deduplicates_by_id_and_keeps_order() {
        let mut reg = PeripheralRegistry::new();
        reg.upsert(discovered("aa", Some("Tracker A"), Some(-40)));
        reg.upsert(discovered("bb", Some("Tracker B"), Some(-60)));
        reg.upsert(discovered("aa", Some("Tracker A"), Some(-42)));

        let snap = reg.snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0].id, "aa");
        assert_eq!(snap[0].rssi, Some(-42));
        assert_eq!(snap[1].id, "bb");
    }

    #[test]
    fn rediscovery_without_name_falls_back_to_sentinel() {
        let mut reg = PeripheralRegistry::new();
        reg.upsert(discovered("aa", Some("Tracker A"), None));
        // A full discovery event replaces the name, sentinel included.
        reg.upsert(discovered("aa", None, Some(-50)));
        assert_eq!(reg.get("aa").unwrap().name, NO_NAME);
    }

    #[test]
    fn status_updates_preserve_learned_fields() {
        let mut reg = PeripheralRegistry::new();
        reg.upsert(discovered("aa", Some("Tracker A"), Some(-40)));
        reg.mark_connecting("aa");
        reg.mark_connected("aa");

        let p = reg.get("aa").unwrap();
        assert_eq!(p.name, "Tracker A");
        assert_eq!(p.rssi, Some(-40));
        assert!(p.is_connected());
    }

    #[test]
    fn status_updates_never_create_entries() {
        let mut reg = PeripheralRegistry::new();
        reg.mark_connected("ghost");
        reg.set_rssi("ghost", -70);
        assert!(reg.is_empty());
        assert_eq!(reg.version(), 0);
    }

    #[test]
    fn rediscovery_preserves_connection_status() {
        let mut reg = PeripheralRegistry::new();
        reg.upsert(discovered("aa", Some("Tracker A"), Some(-40)));
        reg.mark_connected("aa");
        reg.upsert(discovered("aa", Some("Tracker A"), Some(-45)));
        assert!(reg.get("aa").unwrap().is_connected());
    }

    #[test]
    fn clear_empties_and_bumps_version() {
        let mut reg = PeripheralRegistry::new();
        reg.upsert(discovered("aa", None, None));
        let v = reg.version();
        reg.clear();
        assert!(reg.is_empty());
        assert!(reg.version() > v);
        // Clearing an empty registry is a no-op.
        let v = reg.version();
        reg.clear();
        assert_eq!(reg.version(), v);
    }
}
