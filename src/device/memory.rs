//! Device memory limits and allocation accounting
//!
//! Every device carries a ledger of reserved bytes. Buffers reserve on
//! allocation and give the bytes back when released or dropped, so exhausting
//! the configured capacity surfaces as `AllocationFailure` instead of an abort.

use super::DeviceId;
use crate::error::DeviceError;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Default device capacity (8 GiB)
pub const DEFAULT_DEVICE_MEMORY: usize = 8 * 1024 * 1024 * 1024;

/// Device memory limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceMemoryLimits {
    /// Total memory on the device (bytes)
    pub total_bytes: usize,

    /// Maximum memory the problem may reserve (bytes)
    pub usable_bytes: usize,
}

impl DeviceMemoryLimits {
    /// Limits where the whole capacity is usable
    #[must_use]
    pub const fn new(total_bytes: usize) -> Self {
        Self {
            total_bytes,
            usable_bytes: total_bytes,
        }
    }

    /// Limits keeping `headroom` (0.0..=1.0) of the capacity free for the
    /// traversal engine's own temporaries
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn with_headroom(total_bytes: usize, headroom: f64) -> Self {
        let headroom = headroom.clamp(0.0, 1.0);
        Self {
            total_bytes,
            usable_bytes: (total_bytes as f64 * (1.0 - headroom)) as usize,
        }
    }

    /// Check if an allocation of `bytes` fits in an otherwise empty device
    #[must_use]
    pub const fn fits(&self, bytes: usize) -> bool {
        bytes <= self.usable_bytes
    }
}

impl Default for DeviceMemoryLimits {
    fn default() -> Self {
        Self::new(DEFAULT_DEVICE_MEMORY)
    }
}

/// Snapshot of a device's memory ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemoryStats {
    /// Bytes currently reserved
    pub allocated_bytes: usize,

    /// Highest reservation seen
    pub peak_bytes: usize,

    /// Number of successful allocations over the device's lifetime
    pub allocations: usize,

    /// Number of releases over the device's lifetime
    pub releases: usize,
}

#[derive(Debug)]
pub(crate) struct MemoryLedger {
    limits: DeviceMemoryLimits,
    allocated: AtomicUsize,
    peak: AtomicUsize,
    allocations: AtomicUsize,
    releases: AtomicUsize,
}

impl MemoryLedger {
    pub(crate) const fn new(limits: DeviceMemoryLimits) -> Self {
        Self {
            limits,
            allocated: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            allocations: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
        }
    }

    pub(crate) const fn limits(&self) -> DeviceMemoryLimits {
        self.limits
    }

    pub(crate) fn reserve(
        &self,
        device: DeviceId,
        buffer: &'static str,
        bytes: usize,
    ) -> Result<(), DeviceError> {
        let usable = self.limits.usable_bytes;
        let reserved = self
            .allocated
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                current.checked_add(bytes).filter(|&next| next <= usable)
            });

        match reserved {
            Ok(previous) => {
                self.peak.fetch_max(previous + bytes, Ordering::AcqRel);
                self.allocations.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(current) => Err(DeviceError::AllocationFailure {
                device,
                buffer,
                requested: bytes,
                available: usable.saturating_sub(current),
            }),
        }
    }

    pub(crate) fn free(&self, bytes: usize) {
        // Saturating so a double free cannot wrap the counter
        let _ = self
            .allocated
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                Some(current.saturating_sub(bytes))
            });
        self.releases.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn stats(&self) -> MemoryStats {
        MemoryStats {
            allocated_bytes: self.allocated.load(Ordering::Acquire),
            peak_bytes: self.peak.load(Ordering::Acquire),
            allocations: self.allocations.load(Ordering::Relaxed),
            releases: self.releases.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fits() {
        let limits = DeviceMemoryLimits::new(1024);
        assert!(limits.fits(1024));
        assert!(!limits.fits(1025));
    }

    #[test]
    fn test_headroom() {
        let limits = DeviceMemoryLimits::with_headroom(1000, 0.3);
        assert_eq!(limits.total_bytes, 1000);
        assert_eq!(limits.usable_bytes, 700);

        let clamped = DeviceMemoryLimits::with_headroom(1000, 2.0);
        assert_eq!(clamped.usable_bytes, 0);
    }

    #[test]
    fn test_ledger_reserve_and_free() {
        let ledger = MemoryLedger::new(DeviceMemoryLimits::new(100));

        ledger.reserve(DeviceId(0), "a", 60).unwrap();
        ledger.reserve(DeviceId(0), "b", 40).unwrap();
        assert_eq!(ledger.stats().allocated_bytes, 100);

        let err = ledger.reserve(DeviceId(0), "c", 1).unwrap_err();
        assert_eq!(
            err,
            DeviceError::AllocationFailure {
                device: DeviceId(0),
                buffer: "c",
                requested: 1,
                available: 0,
            }
        );

        ledger.free(60);
        let stats = ledger.stats();
        assert_eq!(stats.allocated_bytes, 40);
        assert_eq!(stats.peak_bytes, 100);
        assert_eq!(stats.allocations, 2);
        assert_eq!(stats.releases, 1);
    }

    #[test]
    fn test_ledger_free_saturates() {
        let ledger = MemoryLedger::new(DeviceMemoryLimits::new(100));
        ledger.free(10);
        assert_eq!(ledger.stats().allocated_bytes, 0);
    }
}
