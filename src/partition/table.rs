//! Partition and conversion tables

use crate::device::DeviceId;

/// Global vertex → (owning device, local index)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionTable {
    num_devices: usize,
    /// Owning device per global vertex
    partition: Vec<u32>,
    /// Local index on the owning device per global vertex
    conversion: Vec<u32>,
    owned_counts: Vec<usize>,
}

impl PartitionTable {
    /// Build the tables from an owner per vertex
    ///
    /// Local indices follow ascending global order on each device.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_owners(partition: Vec<u32>, num_devices: usize) -> Self {
        let mut owned_counts = vec![0usize; num_devices];
        let conversion = partition
            .iter()
            .map(|&device| {
                let slot = &mut owned_counts[device as usize];
                let local = *slot as u32;
                *slot += 1;
                local
            })
            .collect();

        Self {
            num_devices,
            partition,
            conversion,
            owned_counts,
        }
    }

    /// Number of devices
    #[must_use]
    pub const fn num_devices(&self) -> usize {
        self.num_devices
    }

    /// Number of global vertices
    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.partition.len()
    }

    /// Owned vertex count per device
    #[must_use]
    pub fn owned_counts(&self) -> &[usize] {
        &self.owned_counts
    }

    /// Raw (device, local) entry, unchecked against the device bounds
    #[must_use]
    pub fn entry(&self, vertex: u32) -> Option<(u32, u32)> {
        let v = vertex as usize;
        Some((*self.partition.get(v)?, *self.conversion.get(v)?))
    }

    /// Owning device and local index, `None` if the entry is inconsistent
    #[must_use]
    pub fn locate(&self, vertex: u32) -> Option<(DeviceId, u32)> {
        let (device, local) = self.entry(vertex)?;
        let owned = *self.owned_counts.get(device as usize)?;
        ((local as usize) < owned).then_some((DeviceId(device), local))
    }

    /// Owner table
    #[must_use]
    pub fn partition(&self) -> &[u32] {
        &self.partition
    }

    /// Conversion table
    #[must_use]
    pub fn conversion(&self) -> &[u32] {
        &self.conversion
    }

    #[cfg(test)]
    pub(crate) fn corrupt(&mut self, vertex: u32, device: u32, local: u32) {
        self.partition[vertex as usize] = device;
        self.conversion[vertex as usize] = local;
    }

    /// Drop every entry from `len` on
    #[cfg(test)]
    pub(crate) fn truncate(&mut self, len: usize) {
        self.partition.truncate(len);
        self.conversion.truncate(len);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_follows_global_order() {
        let table = PartitionTable::from_owners(vec![1, 0, 1, 1, 0], 2);

        assert_eq!(table.conversion(), &[0, 0, 1, 2, 1]);
        assert_eq!(table.owned_counts(), &[2, 3]);
        assert_eq!(table.locate(3), Some((DeviceId(1), 2)));
        assert_eq!(table.locate(4), Some((DeviceId(0), 1)));
    }

    #[test]
    fn test_locate_rejects_inconsistent_entries() {
        let mut table = PartitionTable::from_owners(vec![0, 0, 1], 2);
        assert_eq!(table.locate(7), None);

        table.corrupt(1, 0, 5);
        assert_eq!(table.locate(1), None);
        assert_eq!(table.entry(1), Some((0, 5)));

        table.corrupt(2, 9, 0);
        assert_eq!(table.locate(2), None);
    }
}
