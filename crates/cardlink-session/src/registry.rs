//! Registry of devices found during discovery.

use cardlink_core::{DeviceDescriptor, DeviceId};
use cardlink_transport::Advertisement;
use std::collections::HashSet;

/// Accumulates device descriptors during a scan, deduplicated by identifier.
///
/// Radios re-broadcast advertisements continuously; the registry reports each
/// identifier exactly once and keeps descriptors in first-sighting order so
/// successive snapshots only ever grow.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    seen: HashSet<DeviceId>,
    devices: Vec<DeviceDescriptor>,
}

impl DeviceRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an advertisement.
    ///
    /// Returns the new descriptor on a first sighting, `None` for a
    /// duplicate identifier.
    pub fn insert(&mut self, advertisement: Advertisement) -> Option<&DeviceDescriptor> {
        if !self.seen.insert(advertisement.id) {
            return None;
        }
        self.devices
            .push(DeviceDescriptor::new(advertisement.name, advertisement.id));
        self.devices.last()
    }

    /// Snapshot of every device found so far, in first-sighting order.
    #[must_use]
    pub fn devices(&self) -> &[DeviceDescriptor] {
        &self.devices
    }

    /// Number of distinct devices found.
    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Returns `true` if no devices have been found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Reset for a new scan.
    pub fn clear(&mut self) {
        self.seen.clear();
        self.devices.clear();
    }
}
