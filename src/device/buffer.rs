//! Dual-location (host/device) buffers
//!
//! A [`DualBuffer`] owns an optional host copy and an optional device copy of
//! the same array. Device memory is a slice of atomic words so many workers can
//! read and update it concurrently within a round. The device copy is reserved
//! against its device's memory ledger and handed back when released or dropped.

use super::{Device, DeviceContext};
use crate::error::DeviceError;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

/// Where a copy of a buffer lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    /// Host memory
    Host,
    /// Device memory
    Device,
}

impl Location {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::Device => "device",
        }
    }
}

/// Scalar type storable in device memory
pub trait DeviceWord: Copy + PartialEq + Send + Sync + 'static {
    /// Atomic cell backing one element on the device
    type Atom: Send + Sync;

    /// Value of freshly allocated memory
    const ZERO: Self;

    /// Create a cell holding `value`
    fn new_atom(value: Self) -> Self::Atom;

    /// Read a cell
    fn load(atom: &Self::Atom) -> Self;

    /// Write a cell
    fn store(atom: &Self::Atom, value: Self);

    /// Write a cell, returning its previous value
    fn swap(atom: &Self::Atom, value: Self) -> Self;
}

/// Device word with an atomic minimum
pub trait OrderedWord: DeviceWord {
    /// `cell = min(cell, value)`, returning the previous value
    fn fetch_min(atom: &Self::Atom, value: Self) -> Self;
}

macro_rules! impl_integer_word {
    ($ty:ty, $atom:ty) => {
        impl DeviceWord for $ty {
            type Atom = $atom;
            const ZERO: Self = 0;

            fn new_atom(value: Self) -> Self::Atom {
                <$atom>::new(value)
            }

            fn load(atom: &Self::Atom) -> Self {
                atom.load(Ordering::Relaxed)
            }

            fn store(atom: &Self::Atom, value: Self) {
                atom.store(value, Ordering::Relaxed);
            }

            fn swap(atom: &Self::Atom, value: Self) -> Self {
                atom.swap(value, Ordering::AcqRel)
            }
        }

        impl OrderedWord for $ty {
            fn fetch_min(atom: &Self::Atom, value: Self) -> Self {
                atom.fetch_min(value, Ordering::AcqRel)
            }
        }
    };
}

impl_integer_word!(u32, AtomicU32);
impl_integer_word!(u64, AtomicU64);

/// `-0.0` is stored as `+0.0` so the bit pattern orders like the value
fn f32_word(value: f32) -> u32 {
    if value == 0.0 {
        0
    } else {
        value.to_bits()
    }
}

impl DeviceWord for f32 {
    type Atom = AtomicU32;
    const ZERO: Self = 0.0;

    fn new_atom(value: Self) -> Self::Atom {
        AtomicU32::new(f32_word(value))
    }

    fn load(atom: &Self::Atom) -> Self {
        f32::from_bits(atom.load(Ordering::Relaxed))
    }

    fn store(atom: &Self::Atom, value: Self) {
        atom.store(f32_word(value), Ordering::Relaxed);
    }

    fn swap(atom: &Self::Atom, value: Self) -> Self {
        f32::from_bits(atom.swap(f32_word(value), Ordering::AcqRel))
    }
}

/// Non-negative IEEE-754 values (including `+inf`) order like their bit
/// patterns, so the integer minimum is the float minimum. Only valid for
/// non-negative values.
impl OrderedWord for f32 {
    fn fetch_min(atom: &Self::Atom, value: Self) -> Self {
        debug_assert!(value >= 0.0 || value.is_nan(), "negative label {value}");
        f32::from_bits(atom.fetch_min(f32_word(value), Ordering::AcqRel))
    }
}

struct DeviceAllocation<T: DeviceWord> {
    words: Box<[T::Atom]>,
    owner: Arc<Device>,
    bytes: usize,
}

impl<T: DeviceWord> Drop for DeviceAllocation<T> {
    fn drop(&mut self) {
        self.owner.free(self.bytes);
    }
}

/// Host/device buffer pair
pub struct DualBuffer<T: DeviceWord> {
    name: &'static str,
    len: usize,
    host: Option<Vec<T>>,
    device: Option<DeviceAllocation<T>>,
}

impl<T: DeviceWord + std::fmt::Debug> std::fmt::Debug for DualBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DualBuffer")
            .field("name", &self.name)
            .field("len", &self.len)
            .field("host", &self.host.is_some())
            .field("device", &self.device.as_ref().map(|d| d.owner.id()))
            .finish()
    }
}

impl<T: DeviceWord> DualBuffer<T> {
    /// Empty buffer, nothing allocated
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            len: 0,
            host: None,
            device: None,
        }
    }

    /// Buffer name (used in errors and logs)
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Element count
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the buffer holds no elements
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether a copy exists at `location`
    #[must_use]
    pub const fn is_allocated(&self, location: Location) -> bool {
        match location {
            Location::Host => self.host.is_some(),
            Location::Device => self.device.is_some(),
        }
    }

    /// Allocate `len` elements at `location`
    ///
    /// Lazy: an existing copy of the same length is kept and `Ok(false)` is
    /// returned. A copy of a different length is released and replaced.
    /// Returns `Ok(true)` when memory was actually allocated.
    ///
    /// # Errors
    ///
    /// Returns `AllocationFailure` if the device cannot hold the buffer
    pub fn allocate(
        &mut self,
        ctx: &DeviceContext<'_>,
        len: usize,
        location: Location,
    ) -> Result<bool, DeviceError> {
        if len != self.len {
            self.host = None;
            self.device = None;
            self.len = len;
        }

        match location {
            Location::Host => {
                if self.host.is_some() {
                    return Ok(false);
                }
                self.host = Some(vec![T::ZERO; len]);
            }
            Location::Device => {
                if self.device.is_some() {
                    return Ok(false);
                }
                let bytes = len * std::mem::size_of::<T>();
                ctx.device().reserve(self.name, bytes)?;
                let words = (0..len).map(|_| T::new_atom(T::ZERO)).collect();
                self.device = Some(DeviceAllocation {
                    words,
                    owner: Arc::clone(ctx.device()),
                    bytes,
                });
                tracing::trace!(
                    buffer = self.name,
                    device = %ctx.id(),
                    len,
                    bytes,
                    "Allocated device buffer"
                );
            }
        }
        Ok(true)
    }

    /// Replace the host copy with `data`
    ///
    /// A device copy of a different length is released.
    pub fn set_host(&mut self, data: Vec<T>) {
        if data.len() != self.len {
            self.device = None;
            self.len = data.len();
        }
        self.host = Some(data);
    }

    /// Copy contents from one location to the other
    ///
    /// Both copies must exist except for a device → host move, which creates
    /// the host copy on demand. A host → device move makes the data visible to
    /// concurrent device readers as soon as it returns.
    ///
    /// # Errors
    ///
    /// - `DeviceSelectFailure` if `ctx` selects a device other than the owner
    /// - `BufferMissing` if a required copy is absent
    /// - `TransferFailure` if the copy fails
    pub fn move_data(
        &mut self,
        ctx: &DeviceContext<'_>,
        from: Location,
        to: Location,
    ) -> Result<(), DeviceError> {
        if from == to {
            return Ok(());
        }

        let device = self.device.as_ref().ok_or(DeviceError::BufferMissing {
            buffer: self.name,
            location: Location::Device.as_str(),
        })?;
        if device.owner.id() != ctx.id() {
            return Err(DeviceError::DeviceSelectFailure {
                device: ctx.id(),
                reason: format!(
                    "buffer `{}` lives on device {}",
                    self.name,
                    device.owner.id()
                ),
            });
        }
        device.owner.record_transfer(self.name)?;

        match to {
            Location::Device => {
                let host = self.host.as_ref().ok_or(DeviceError::BufferMissing {
                    buffer: self.name,
                    location: Location::Host.as_str(),
                })?;
                for (atom, &value) in device.words.iter().zip(host) {
                    T::store(atom, value);
                }
            }
            Location::Host => {
                let host = self.host.get_or_insert_with(|| vec![T::ZERO; self.len]);
                for (slot, atom) in host.iter_mut().zip(device.words.iter()) {
                    *slot = T::load(atom);
                }
            }
        }
        Ok(())
    }

    /// Set every device element to `value`
    ///
    /// # Errors
    ///
    /// Returns `BufferMissing` if there is no device copy
    pub fn fill(&self, value: T) -> Result<(), DeviceError> {
        let array = self.device_array()?;
        for i in 0..array.len() {
            array.store(i, value);
        }
        Ok(())
    }

    /// Concurrent view of the device copy
    ///
    /// # Errors
    ///
    /// Returns `BufferMissing` if there is no device copy
    pub fn device_array(&self) -> Result<DeviceArray<'_, T>, DeviceError> {
        self.device
            .as_ref()
            .map(|d| DeviceArray {
                words: &d.words,
                _marker: PhantomData,
            })
            .ok_or(DeviceError::BufferMissing {
                buffer: self.name,
                location: Location::Device.as_str(),
            })
    }

    /// Host copy
    ///
    /// # Errors
    ///
    /// Returns `BufferMissing` if there is no host copy
    pub fn host(&self) -> Result<&[T], DeviceError> {
        self.host.as_deref().ok_or(DeviceError::BufferMissing {
            buffer: self.name,
            location: Location::Host.as_str(),
        })
    }

    /// Mutable host copy
    ///
    /// # Errors
    ///
    /// Returns `BufferMissing` if there is no host copy
    pub fn host_mut(&mut self) -> Result<&mut [T], DeviceError> {
        self.host.as_deref_mut().ok_or(DeviceError::BufferMissing {
            buffer: self.name,
            location: Location::Host.as_str(),
        })
    }

    /// Release the copy at `location`
    pub fn release(&mut self, location: Location) {
        match location {
            Location::Host => self.host = None,
            Location::Device => self.device = None,
        }
    }
}

/// Shared view of a device buffer, safe for concurrent access
pub struct DeviceArray<'a, T: DeviceWord> {
    words: &'a [T::Atom],
    _marker: PhantomData<T>,
}

impl<T: DeviceWord> Clone for DeviceArray<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: DeviceWord> Copy for DeviceArray<'_, T> {}

impl<'a, T: DeviceWord> DeviceArray<'a, T> {
    /// Element count
    #[must_use]
    pub const fn len(&self) -> usize {
        self.words.len()
    }

    /// Whether the array is empty
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Read element `i`
    #[must_use]
    pub fn load(&self, i: usize) -> T {
        T::load(&self.words[i])
    }

    /// Write element `i`
    pub fn store(&self, i: usize, value: T) {
        T::store(&self.words[i], value);
    }

    /// Write element `i`, returning the previous value
    pub fn swap(&self, i: usize, value: T) -> T {
        T::swap(&self.words[i], value)
    }

    /// Copy all elements out
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        self.words.iter().map(T::load).collect()
    }
}

impl<T: OrderedWord> DeviceArray<'_, T> {
    /// `self[i] = min(self[i], value)`, returning the previous value
    pub fn fetch_min(&self, i: usize, value: T) -> T {
        T::fetch_min(&self.words[i], value)
    }
}
