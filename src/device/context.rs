//! Device registry and explicit device selection
//!
//! There is no process-wide "current device". Every per-device operation takes
//! a [`DeviceContext`] obtained from [`DeviceSet::select`], which fails with
//! `DeviceSelectFailure` for unknown or unavailable devices.

use super::memory::{DeviceMemoryLimits, MemoryLedger, MemoryStats};
use crate::error::DeviceError;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Device index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(pub u32);

impl DeviceId {
    /// Index into per-device collections
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

const NO_FAULT: usize = usize::MAX;

/// A compute device with its own memory
///
/// Device memory is host RAM behind atomic words, accounted against
/// [`DeviceMemoryLimits`]. Transfers can be made to fail after a number of
/// successful copies, which is how callers exercise `TransferFailure` paths.
#[derive(Debug)]
pub struct Device {
    id: DeviceId,
    name: String,
    ledger: MemoryLedger,
    transfers: AtomicUsize,
    fail_transfers_after: AtomicUsize,
    available: AtomicBool,
}

impl Device {
    /// Create a device with the given memory limits
    #[must_use]
    pub fn new(id: DeviceId, limits: DeviceMemoryLimits) -> Self {
        Self {
            id,
            name: format!("trueno-sssp device {}", id.0),
            ledger: MemoryLedger::new(limits),
            transfers: AtomicUsize::new(0),
            fail_transfers_after: AtomicUsize::new(NO_FAULT),
            available: AtomicBool::new(true),
        }
    }

    /// Device index
    #[must_use]
    pub const fn id(&self) -> DeviceId {
        self.id
    }

    /// Human-readable name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Memory limits
    #[must_use]
    pub const fn limits(&self) -> DeviceMemoryLimits {
        self.ledger.limits()
    }

    /// Current memory ledger
    #[must_use]
    pub fn memory_stats(&self) -> MemoryStats {
        self.ledger.stats()
    }

    /// Number of successful host/device transfers
    #[must_use]
    pub fn transfer_count(&self) -> usize {
        self.transfers.load(Ordering::Acquire)
    }

    /// Make every transfer after the next `successful` ones fail
    pub fn fail_transfers_after(&self, successful: usize) {
        let threshold = self.transfer_count().saturating_add(successful);
        self.fail_transfers_after.store(threshold, Ordering::Release);
    }

    /// Remove any pending transfer fault
    pub fn clear_transfer_fault(&self) {
        self.fail_transfers_after.store(NO_FAULT, Ordering::Release);
    }

    /// Mark the device (un)available for selection
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }

    /// Whether the device can be selected
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    pub(crate) fn reserve(&self, buffer: &'static str, bytes: usize) -> Result<(), DeviceError> {
        self.ledger.reserve(self.id, buffer, bytes)
    }

    pub(crate) fn free(&self, bytes: usize) {
        self.ledger.free(bytes);
    }

    pub(crate) fn record_transfer(&self, buffer: &'static str) -> Result<(), DeviceError> {
        let threshold = self.fail_transfers_after.load(Ordering::Acquire);
        let done = self.transfers.load(Ordering::Acquire);
        if done >= threshold {
            return Err(DeviceError::TransferFailure {
                device: self.id,
                buffer,
                reason: format!("injected fault after {threshold} transfers"),
            });
        }
        self.transfers.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}

/// Ordered set of devices, indexed by [`DeviceId`]
#[derive(Debug, Clone)]
pub struct DeviceSet {
    devices: Vec<Arc<Device>>,
}

impl DeviceSet {
    /// `count` devices with ids `0..count` and identical limits
    #[must_use]
    pub fn new(count: usize, limits: DeviceMemoryLimits) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        let devices = (0..count)
            .map(|i| Arc::new(Device::new(DeviceId(i as u32), limits)))
            .collect();
        Self { devices }
    }

    /// A single device with default limits
    #[must_use]
    pub fn single() -> Self {
        Self::new(1, DeviceMemoryLimits::default())
    }

    /// Number of devices
    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Whether the set holds no devices
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Device ids in order
    pub fn ids(&self) -> impl Iterator<Item = DeviceId> + '_ {
        self.devices.iter().map(|d| d.id())
    }

    /// Look up a device without selecting it
    #[must_use]
    pub fn device(&self, id: DeviceId) -> Option<&Arc<Device>> {
        self.devices.get(id.index())
    }

    /// Select a device for the following per-device operations
    ///
    /// # Errors
    ///
    /// Returns `DeviceSelectFailure` if `id` is not in the set or the device is
    /// unavailable
    pub fn select(&self, id: DeviceId) -> Result<DeviceContext<'_>, DeviceError> {
        let device = self
            .devices
            .get(id.index())
            .ok_or_else(|| DeviceError::DeviceSelectFailure {
                device: id,
                reason: format!("only {} devices configured", self.devices.len()),
            })?;

        if !device.is_available() {
            return Err(DeviceError::DeviceSelectFailure {
                device: id,
                reason: "device unavailable".to_string(),
            });
        }

        Ok(DeviceContext { device })
    }
}

/// Selected device, threaded through per-device operations
#[derive(Debug, Clone, Copy)]
pub struct DeviceContext<'a> {
    device: &'a Arc<Device>,
}

impl<'a> DeviceContext<'a> {
    /// Selected device id
    #[must_use]
    pub fn id(&self) -> DeviceId {
        self.device.id()
    }

    /// Selected device
    #[must_use]
    pub const fn device(&self) -> &'a Arc<Device> {
        self.device
    }
}
