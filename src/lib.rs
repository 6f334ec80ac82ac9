//! # pcm-pipeline
//!
//! Real-time audio hand-off between a decoder thread and a playback thread.
//!
//! `pcm-pipeline` provides a lock-free single-producer/single-consumer ring
//! buffer for interleaved PCM frames, a companion lossy scalar ring for
//! peak metering, and an orchestrator that runs the decode and playback
//! loops on dedicated threads with cooperative, non-blocking backpressure.
//!
//! ## Quick Start
//!
//! ```no_run
//! use pcm_pipeline::{PcmPipeline, PipelineConfig, SineSource, sink};
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), pcm_pipeline::PipelineError> {
//! let config = PipelineConfig::default();
//!
//! let mut session = PcmPipeline::builder()
//!     .source(SineSource::new(440.0, config.format))
//!     .boxed_sink(sink::detect())          // platform output, or null fallback
//!     .config(config)
//!     .start()?;
//!
//! // Poll peaks from a UI thread at its own cadence
//! let mut meter = session.take_meter().unwrap();
//! let mut peaks = [0.0f32; 64];
//! let _ = meter.read_peaks(&mut peaks);
//!
//! session.run_for(Duration::from_secs(5))?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! The crate maintains a strict thread boundary:
//!
//! - **Producer thread**: fills chunks from the [`Source`] and pushes them
//!   into the frame ring, spin-then-yield on backpressure
//! - **Frame ring**: lock-free SPSC queue; the only synchronization between
//!   the two audio threads is its release/acquire index handshake
//! - **Consumer thread**: pops chunks and hands them to the [`Sink`], which
//!   paces playback
//! - **Peak ring**: lossy SPSC side channel from the audio path to a UI
//!   observer; drops on overflow, never blocks
//!
//! No mutex or condition variable is ever taken on the audio path, so the
//! playback thread cannot be stalled by a lock shared with a non-real-time
//! thread.

#![warn(missing_docs)]
// Audio code requires intentional numeric casts between sample and index types
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
#![allow(clippy::missing_panics_doc, clippy::missing_errors_doc)]

mod builder;
mod config;
mod error;
mod event;
mod pipeline;
pub mod ring;
mod session;
pub mod sink;
pub mod source;

pub use builder::{PcmPipeline, PipelineBuilder};
pub use config::{PipelineConfig, StreamFormat};
pub use error::{PipelineError, RingError, SinkError};
pub use event::{event_callback, EventCallback, PipelineEvent};
pub use pipeline::Backoff;
pub use session::{MeterHandle, PipelineStats, Session};
pub use sink::{NullSink, PlatformSink, Sink};
pub use source::{SilenceSource, SineSource, Source};
