//! Sink trait and built-in playback backends.
//!
//! A [`Sink`] is the destination for decoded frames - the platform audio
//! output in a real player. The crate provides two built-ins:
//!
//! - [`PlatformSink`]: plays through the default output device via CPAL
//! - [`NullSink`]: discards frames while simulating playback pacing
//!
//! [`detect()`] probes for a usable platform backend at startup and falls
//! back to the null backend, mirroring how a player selects between
//! PipeWire, ALSA, and a dummy output at runtime.

mod null;
mod platform;

pub use null::NullSink;
pub use platform::PlatformSink;

use crate::{SinkError, StreamFormat};

/// A destination for interleaved audio frames.
///
/// The sink is called from the consumer thread only and owns its own
/// pacing: `write` is expected to block until the frames have been handed
/// to the output (that blocking is a hardware rate limit, not a lock shared
/// with the producer). Failures propagate upward and stop the pipeline; the
/// ring layer never retries a failed chunk.
pub trait Sink: Send {
    /// Human-readable name for logging and error messages.
    fn name(&self) -> &str;

    /// Called once before any frames flow.
    ///
    /// `format` is the interleaved layout agreed at pipeline construction.
    /// Open devices or allocate resources here; errors are fatal to
    /// pipeline startup.
    fn on_start(&mut self, format: StreamFormat) -> Result<(), SinkError> {
        let _ = format;
        Ok(())
    }

    /// Renders one chunk of whole interleaved frames.
    ///
    /// May block to pace playback. An error stops the consumer loop; the
    /// failed chunk is not retried.
    fn write(&mut self, interleaved: &[f32]) -> Result<(), SinkError>;

    /// Called during shutdown, after the last `write`.
    fn on_stop(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Probes for a platform output device, falling back to the null sink.
///
/// This is the runtime backend selection: a fallible capability probe
/// rather than a hard dependency on audio hardware, so the pipeline runs
/// unchanged on headless machines and in CI.
pub fn detect() -> Box<dyn Sink> {
    match PlatformSink::probe() {
        Ok(sink) => {
            tracing::info!(device = %sink.device_name(), "using platform audio output");
            Box::new(sink)
        }
        Err(err) => {
            tracing::warn!(%err, "platform audio output unavailable, using null sink");
            Box::new(NullSink::new())
        }
    }
}
