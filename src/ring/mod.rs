//! Lock-free SPSC ring buffers for the real-time audio path.
//!
//! Two parameterizations of the same primitive:
//!
//! - [`frame_ring`]: interleaved multi-channel audio frames, decoder thread
//!   to playback thread, full-ring backpressure via partial transfers
//! - [`peak_ring`]: single scalars, audio thread to UI/observer thread,
//!   drop-on-full (lossy metering)
//!
//! Both are strictly non-blocking; producers and consumers that need a
//! complete transfer retry at their own layer with a cooperative yield.

mod frame;
mod peak;

pub use frame::{frame_ring, FrameConsumer, FrameProducer};
pub use peak::{peak_ring, PeakConsumer, PeakProducer};
