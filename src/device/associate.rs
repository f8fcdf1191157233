//! Associate-buffer registry
//!
//! Records, per device, which per-vertex arrays must travel with boundary
//! (halo) vertices when devices exchange updates between rounds. The exchange
//! itself resolves each entry against the device's data slice.

use super::DeviceId;
use std::collections::BTreeMap;

/// Per-vertex array exchanged for halo vertices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AssociateKind {
    /// Distance labels
    Labels,
    /// Predecessors
    Predecessors,
}

/// Device-keyed table of associate buffers
#[derive(Debug, Clone, Default)]
pub struct AssociateRegistry {
    entries: BTreeMap<DeviceId, Vec<AssociateKind>>,
}

impl AssociateRegistry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `kind` for `device`; registering twice is a no-op
    pub fn register(&mut self, device: DeviceId, kind: AssociateKind) {
        let kinds = self.entries.entry(device).or_default();
        if !kinds.contains(&kind) {
            kinds.push(kind);
            kinds.sort_unstable();
        }
    }

    /// Arrays registered for `device`
    #[must_use]
    pub fn kinds(&self, device: DeviceId) -> &[AssociateKind] {
        self.entries.get(&device).map_or(&[], Vec::as_slice)
    }

    /// Whether `device` exchanges `kind`
    #[must_use]
    pub fn contains(&self, device: DeviceId, kind: AssociateKind) -> bool {
        self.kinds(device).contains(&kind)
    }

    /// Devices with at least one registration
    pub fn devices(&self) -> impl Iterator<Item = DeviceId> + '_ {
        self.entries.keys().copied()
    }

    /// Whether nothing is registered (single-device runs)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every registration for `device`
    pub fn clear_device(&mut self, device: DeviceId) {
        self.entries.remove(&device);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_is_idempotent() {
        let mut registry = AssociateRegistry::new();
        registry.register(DeviceId(0), AssociateKind::Predecessors);
        registry.register(DeviceId(0), AssociateKind::Labels);
        registry.register(DeviceId(0), AssociateKind::Labels);

        assert_eq!(
            registry.kinds(DeviceId(0)),
            &[AssociateKind::Labels, AssociateKind::Predecessors]
        );
        assert!(registry.contains(DeviceId(0), AssociateKind::Labels));
        assert!(registry.kinds(DeviceId(1)).is_empty());
    }

    #[test]
    fn test_clear_device() {
        let mut registry = AssociateRegistry::new();
        registry.register(DeviceId(0), AssociateKind::Labels);
        registry.register(DeviceId(1), AssociateKind::Labels);

        registry.clear_device(DeviceId(0));
        assert_eq!(registry.devices().collect::<Vec<_>>(), vec![DeviceId(1)]);
        assert!(!registry.is_empty());
    }
}
