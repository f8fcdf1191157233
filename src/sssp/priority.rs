//! Delta-stepping priority
//!
//! Vertices whose label falls in the current bucket (`label / delta` below the
//! next level) are processed first; the rest wait in the far queue.

use super::data_slice::DataSlice;
use crate::device::DeviceArray;
use crate::error::DeviceError;

/// Priority of a label under bucket width `delta`
///
/// With bucketing disabled the raw label is the priority.
#[must_use]
pub fn priority_score(label: f32, delta: Option<f32>) -> f32 {
    match delta {
        Some(delta) if delta > 0.0 => label / delta,
        _ => label,
    }
}

/// Bucket a score falls into, `None` for unreached vertices
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn bucket_of(score: f32) -> Option<u64> {
    score.is_finite().then(|| score.floor() as u64)
}

/// Priority lookup over one device's labels
#[derive(Clone, Copy)]
pub struct PriorityFunctor<'a> {
    labels: DeviceArray<'a, f32>,
    delta: Option<f32>,
}

impl<'a> PriorityFunctor<'a> {
    /// Bind to a data slice
    ///
    /// # Errors
    ///
    /// Returns `BufferMissing` before the labels are allocated
    pub fn new(slice: &'a DataSlice) -> Result<Self, DeviceError> {
        Ok(Self {
            labels: slice.labels().device_array()?,
            delta: slice.delta(),
        })
    }

    /// `label[vertex] / delta`, or the raw label when bucketing is disabled
    #[must_use]
    pub fn score(&self, vertex: u32) -> f32 {
        priority_score(self.labels.load(vertex as usize), self.delta)
    }

    /// Bucket of `vertex`
    #[must_use]
    pub fn bucket(&self, vertex: u32) -> Option<u64> {
        bucket_of(self.score(vertex))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_divides_by_delta() {
        assert_eq!(priority_score(12.0, Some(4.0)), 3.0);
        assert_eq!(priority_score(1.0, Some(4.0)), 0.25);
    }

    #[test]
    fn test_score_without_bucketing_is_raw_label() {
        assert_eq!(priority_score(12.0, None), 12.0);
        assert_eq!(priority_score(12.0, Some(0.0)), 12.0);
    }

    #[test]
    fn test_bucket_of() {
        assert_eq!(bucket_of(0.0), Some(0));
        assert_eq!(bucket_of(2.99), Some(2));
        assert_eq!(bucket_of(f32::INFINITY), None);
    }
}
