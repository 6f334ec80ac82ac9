//! Low-rate scalar ring carrying peak meter values to an observer thread.
//!
//! Same SPSC primitive as the frame ring with a channel count of one and a
//! different overflow policy: when the ring is full the *new* value is
//! dropped, never blocking the audio thread and never overwriting values
//! the observer has not yet seen. Delivery is best-effort by design; the
//! observer must tolerate gaps.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::RingError;
use crate::ring::frame::{frame_ring, FrameConsumer, FrameProducer};

/// Creates a lossy SPSC scalar ring and splits it into its two halves.
///
/// # Errors
///
/// Returns a [`RingError`] for a zero capacity or when the backing storage
/// cannot be allocated.
pub fn peak_ring(capacity: usize) -> Result<(PeakProducer, PeakConsumer), RingError> {
    let (producer, consumer) = frame_ring(capacity, 1)?;
    let dropped = Arc::new(AtomicU64::new(0));
    Ok((
        PeakProducer {
            inner: producer,
            dropped: Arc::clone(&dropped),
        },
        PeakConsumer {
            inner: consumer,
            dropped,
        },
    ))
}

/// The write half of a peak ring; owned by the audio thread.
pub struct PeakProducer {
    inner: FrameProducer,
    dropped: Arc<AtomicU64>,
}

impl PeakProducer {
    /// Pushes one scalar value, dropping it if the ring is full.
    ///
    /// Returns `true` if the value was accepted. Never blocks. Dropped
    /// values are counted and visible via [`PeakConsumer::dropped`].
    pub fn push(&mut self, value: f32) -> bool {
        if self.inner.push(&[value]) == 1 {
            true
        } else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Returns the cumulative count of dropped values.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// The read half of a peak ring; owned by the observer (UI) thread.
pub struct PeakConsumer {
    inner: FrameConsumer,
    dropped: Arc<AtomicU64>,
}

impl PeakConsumer {
    /// Copies up to `dest.len()` oldest values into `dest` in FIFO order.
    ///
    /// Advances the read index by exactly the count returned. Never blocks;
    /// 0 means no values were pending.
    pub fn drain(&mut self, dest: &mut [f32]) -> usize {
        self.inner.pop(dest)
    }

    /// Returns a racy snapshot of the values waiting to be drained.
    pub fn available(&self) -> usize {
        self.inner.available_frames()
    }

    /// Returns the cumulative count of values dropped on the producer side.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
