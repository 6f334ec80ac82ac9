//! Lock-free SPSC ring buffer for interleaved audio frames.
//!
//! This is the hand-off point between the decode thread and the playback
//! thread. Both operations are non-blocking and bounded-time: a `push` or
//! `pop` performs at most two contiguous copies (one wraparound split) and
//! never loops or waits internally, so the playback thread can call into it
//! from a real-time context without risking priority inversion.
//!
//! # Algorithm
//!
//! The write index (`head`) and read index (`tail`) are monotonically
//! increasing logical frame counters, never wrapped storage offsets. The
//! physical slot for logical index `i` is derived as
//! `(i % capacity) * channels` at access time. Occupancy is
//! `head.wrapping_sub(tail)`, which stays correct indefinitely even after
//! the counters themselves wrap.
//!
//! The release-store of an updated index, paired with the acquire-load by
//! the opposite side, is the sole synchronization mechanism: a consumer
//! that observes a new `head` is guaranteed to see the sample data written
//! before it, and symmetrically for `tail`.

use std::cell::UnsafeCell;
use std::mem;
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_utils::CachePadded;

use crate::error::RingError;

/// One interleaved sample slot with interior mutability.
///
/// Slots are zero-initialized at construction, so every slot always holds a
/// valid `f32` and the occupancy check is what prevents reading slots the
/// producer has not yet claimed.
#[repr(transparent)]
struct Slot(UnsafeCell<f32>);

// SAFETY: Slot is Sync because the SPSC protocol guarantees each slot is
// accessed by at most one side at a time: the producer only writes slots in
// [head, head + free) and the consumer only reads slots in [tail, head).
// The Release/Acquire index handshake orders those accesses.
unsafe impl Send for Slot {}
unsafe impl Sync for Slot {}

/// State shared between the producer and consumer halves.
struct Shared {
    /// Write index in frames. Owned by the producer, read by the consumer.
    head: CachePadded<AtomicUsize>,
    /// Read index in frames. Owned by the consumer, read by the producer.
    tail: CachePadded<AtomicUsize>,
    /// Ring capacity in frames, immutable after construction.
    capacity: usize,
    /// Interleaved channels per frame, immutable after construction.
    channels: usize,
    /// Backing storage: `capacity * channels` sample slots.
    data: Box<[Slot]>,
}

/// Creates a lock-free SPSC frame ring and splits it into its two halves.
///
/// `capacity_frames` is the maximum number of frames resident at once; each
/// frame holds `channels` interleaved `f32` samples. The two returned
/// handles are the only way to touch the ring, and neither can be cloned,
/// so the single-producer/single-consumer discipline is enforced by
/// ownership rather than runtime checks.
///
/// # Errors
///
/// Returns a [`RingError`] for a zero capacity or channel count, or when
/// the backing storage cannot be allocated. No partially-constructed ring
/// is ever returned.
///
/// # Example
///
/// ```
/// use pcm_pipeline::ring::frame_ring;
///
/// let (mut producer, mut consumer) = frame_ring(4, 2).unwrap();
/// assert_eq!(producer.push(&[0.1, 0.1, 0.2, 0.2]), 2);
///
/// let mut out = [0.0f32; 4];
/// assert_eq!(consumer.pop(&mut out), 2);
/// assert_eq!(out, [0.1, 0.1, 0.2, 0.2]);
/// ```
pub fn frame_ring(
    capacity_frames: usize,
    channels: u16,
) -> Result<(FrameProducer, FrameConsumer), RingError> {
    if capacity_frames == 0 {
        return Err(RingError::ZeroCapacity);
    }
    if channels == 0 {
        return Err(RingError::ZeroChannels);
    }
    let channels = usize::from(channels);
    let slots = capacity_frames
        .checked_mul(channels)
        .ok_or(RingError::CapacityOverflow)?;

    let mut data = Vec::new();
    data.try_reserve_exact(slots)
        .map_err(|_| RingError::Allocation {
            bytes: slots.saturating_mul(mem::size_of::<f32>()),
        })?;
    data.resize_with(slots, || Slot(UnsafeCell::new(0.0)));

    let shared = Arc::new(Shared {
        head: CachePadded::new(AtomicUsize::new(0)),
        tail: CachePadded::new(AtomicUsize::new(0)),
        capacity: capacity_frames,
        channels,
        data: data.into_boxed_slice(),
    });

    Ok((
        FrameProducer {
            shared: Arc::clone(&shared),
        },
        FrameConsumer { shared },
    ))
}

/// The write half of a frame ring.
///
/// Exactly one thread may own this at a time; it is the single writer of
/// the ring's `head` index.
pub struct FrameProducer {
    shared: Arc<Shared>,
}

// SAFETY: the producer half can move between threads; all shared access
// goes through atomics or the slot protocol described on `Slot`.
unsafe impl Send for FrameProducer {}

impl FrameProducer {
    /// Pushes up to `frames.len() / channels` interleaved frames.
    ///
    /// Writes `min(requested, free_frames)` frames and returns the count
    /// actually written; 0 means the ring was full (or the request empty),
    /// which is backpressure, not an error. Never blocks. Callers that need
    /// the whole chunk transferred must loop, yielding between attempts.
    ///
    /// `frames.len()` must be a whole number of frames.
    pub fn push(&mut self, frames: &[f32]) -> usize {
        let ch = self.shared.channels;
        debug_assert_eq!(frames.len() % ch, 0, "push slice must be whole frames");
        let requested = frames.len() / ch;
        if requested == 0 {
            return 0;
        }

        let head = self.shared.head.load(Ordering::Relaxed);
        let tail = self.shared.tail.load(Ordering::Acquire);
        let free = self.shared.capacity - head.wrapping_sub(tail);
        if free == 0 {
            return 0;
        }
        let count = requested.min(free);

        let idx = head % self.shared.capacity;
        let first = count.min(self.shared.capacity - idx);

        // SAFETY: the free-space check above proves frames [head, head+count)
        // are outside the consumer's readable region, so the producer has
        // exclusive access to those slots until the head store below. Slots
        // are #[repr(transparent)] f32 cells stored contiguously, so copying
        // `n * ch` samples from the slot at `idx * ch` stays in bounds:
        // both segments were clamped against capacity.
        unsafe {
            let dst = self.shared.data[idx * ch].0.get();
            ptr::copy_nonoverlapping(frames.as_ptr(), dst, first * ch);
            if first < count {
                let dst = self.shared.data[0].0.get();
                ptr::copy_nonoverlapping(
                    frames.as_ptr().add(first * ch),
                    dst,
                    (count - first) * ch,
                );
            }
        }

        // Publish the written frames. Release pairs with the consumer's
        // acquire load of head.
        self.shared
            .head
            .store(head.wrapping_add(count), Ordering::Release);
        count
    }

    /// Returns a snapshot of the free capacity in frames.
    ///
    /// Inherently racy: the consumer may free more space immediately after
    /// this returns. Use for coarse backpressure decisions only; `push`
    /// re-checks before every transfer.
    pub fn free_frames(&self) -> usize {
        let head = self.shared.head.load(Ordering::Relaxed);
        let tail = self.shared.tail.load(Ordering::Acquire);
        self.shared.capacity - head.wrapping_sub(tail)
    }

    /// Returns the ring capacity in frames.
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Returns the interleaved channel count.
    pub fn channels(&self) -> usize {
        self.shared.channels
    }
}

/// The read half of a frame ring.
///
/// Exactly one thread may own this at a time; it is the single writer of
/// the ring's `tail` index.
pub struct FrameConsumer {
    shared: Arc<Shared>,
}

// SAFETY: see FrameProducer.
unsafe impl Send for FrameConsumer {}

impl FrameConsumer {
    /// Pops up to `dest.len() / channels` interleaved frames into `dest`.
    ///
    /// Reads `min(requested, available)` frames and returns the count
    /// actually read; 0 means the ring was empty (or the request empty).
    /// Never blocks.
    ///
    /// `dest.len()` must be a whole number of frames.
    pub fn pop(&mut self, dest: &mut [f32]) -> usize {
        let ch = self.shared.channels;
        debug_assert_eq!(dest.len() % ch, 0, "pop slice must be whole frames");
        let requested = dest.len() / ch;
        if requested == 0 {
            return 0;
        }

        let tail = self.shared.tail.load(Ordering::Relaxed);
        let head = self.shared.head.load(Ordering::Acquire);
        let available = head.wrapping_sub(tail);
        if available == 0 {
            return 0;
        }
        let count = requested.min(available);

        let idx = tail % self.shared.capacity;
        let first = count.min(self.shared.capacity - idx);

        // SAFETY: the availability check above proves frames [tail, tail+count)
        // were published by the producer (acquire on head ordered their
        // writes before this read), and the producer cannot overwrite them
        // until the tail store below. Bounds as in push.
        unsafe {
            let src = self.shared.data[idx * ch].0.get();
            ptr::copy_nonoverlapping(src, dest.as_mut_ptr(), first * ch);
            if first < count {
                let src = self.shared.data[0].0.get();
                ptr::copy_nonoverlapping(
                    src,
                    dest.as_mut_ptr().add(first * ch),
                    (count - first) * ch,
                );
            }
        }

        // Release pairs with the producer's acquire load of tail, so freed
        // slots are never overwritten before the copy-out completes.
        self.shared
            .tail
            .store(tail.wrapping_add(count), Ordering::Release);
        count
    }

    /// Returns a snapshot of the frames available to read.
    ///
    /// Inherently racy; see [`FrameProducer::free_frames`].
    pub fn available_frames(&self) -> usize {
        let tail = self.shared.tail.load(Ordering::Relaxed);
        let head = self.shared.head.load(Ordering::Acquire);
        head.wrapping_sub(tail)
    }

    /// Returns the ring capacity in frames.
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Returns the interleaved channel count.
    pub fn channels(&self) -> usize {
        self.shared.channels
    }
}
