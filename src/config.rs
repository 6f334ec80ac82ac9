//! Configuration types for the audio pipeline.

use std::time::Duration;

use crate::PipelineError;

/// The interleaved sample format agreed between source, rings, and sink.
///
/// Fixed at pipeline construction; there is no runtime renegotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    /// Sample rate in Hz (e.g. 44100, 48000).
    pub sample_rate: u32,
    /// Number of interleaved channels (1 = mono, 2 = stereo).
    pub channels: u16,
}

impl StreamFormat {
    /// Returns the wall-clock duration of `frames` frames at this format.
    pub fn duration_of(&self, frames: usize) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(frames as f64 / f64::from(self.sample_rate))
    }

    /// Returns the number of interleaved samples in `frames` frames.
    pub fn samples_for(&self, frames: usize) -> usize {
        frames * self.channels as usize
    }
}

impl Default for StreamFormat {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            channels: 2,
        }
    }
}

/// Configuration for pipeline behavior.
///
/// All knobs are fixed at construction - there is no runtime resizing or
/// retuning. Use [`PipelineConfig::default()`] for sensible defaults.
///
/// # Example
///
/// ```
/// use pcm_pipeline::PipelineConfig;
/// use std::time::Duration;
///
/// let config = PipelineConfig {
///     ring_duration: Duration::from_secs(1),
///     ..Default::default()
/// };
/// assert_eq!(config.ring_capacity_frames(), 48_000);
/// ```
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Sample format shared by the source, the frame ring, and the sink.
    ///
    /// Default: 48kHz stereo
    pub format: StreamFormat,

    /// Frame ring capacity, expressed in seconds of audio.
    ///
    /// The ring absorbs decode-rate jitter between the producer and the
    /// playback thread. Default: 3 seconds
    pub ring_duration: Duration,

    /// Frames generated per producer iteration.
    ///
    /// Smaller values reduce latency but increase per-chunk overhead.
    /// Default: 512
    pub chunk_frames: usize,

    /// Frames requested per consumer iteration.
    ///
    /// Fewer frames may be delivered per sink write under backpressure.
    /// Default: 1024
    pub sink_chunk_frames: usize,

    /// Capacity of the peak meter ring, in scalar values.
    ///
    /// The meter is lossy by design; size it for the slowest observer
    /// cadence you expect. Default: 4096
    pub meter_capacity: usize,

    /// Bounded busy-spins before a cooperative yield in retry loops.
    ///
    /// Both thread loops retry a full/empty ring by spinning this many
    /// times (`std::hint::spin_loop`) and then yielding the processor.
    /// No kernel blocking primitive is ever used on the audio path.
    /// Default: 64
    pub spin_limit: u32,

    /// Whether remaining ring contents are flushed to the sink on stop.
    ///
    /// When `false`, frames still resident in the ring at shutdown are
    /// discarded; when `true`, the consumer drains them to the sink before
    /// exiting, which can delay [`Session::stop()`](crate::Session::stop)
    /// by up to `ring_duration`. Default: `false`
    pub flush_on_stop: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            format: StreamFormat::default(),
            ring_duration: Duration::from_secs(3),
            chunk_frames: 512,
            sink_chunk_frames: 1024,
            meter_capacity: 4096,
            spin_limit: 64,
            flush_on_stop: false,
        }
    }
}

impl PipelineConfig {
    /// Returns the frame ring capacity in frames.
    pub fn ring_capacity_frames(&self) -> usize {
        (f64::from(self.format.sample_rate) * self.ring_duration.as_secs_f64()) as usize
    }

    pub(crate) fn validate(&self) -> Result<(), PipelineError> {
        let fail = |reason: &str| {
            Err(PipelineError::InvalidConfig {
                reason: reason.to_string(),
            })
        };
        if self.format.sample_rate == 0 {
            return fail("sample rate must be non-zero");
        }
        if self.format.channels == 0 {
            return fail("channel count must be non-zero");
        }
        if self.chunk_frames == 0 {
            return fail("producer chunk size must be non-zero");
        }
        if self.sink_chunk_frames == 0 {
            return fail("sink chunk size must be non-zero");
        }
        if self.meter_capacity == 0 {
            return fail("meter capacity must be non-zero");
        }
        if self.ring_capacity_frames() == 0 {
            return fail("ring duration too short for the configured sample rate");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.format.sample_rate, 48_000);
        assert_eq!(config.format.channels, 2);
        assert_eq!(config.ring_duration, Duration::from_secs(3));
        assert_eq!(config.chunk_frames, 512);
        assert_eq!(config.sink_chunk_frames, 1024);
        assert!(!config.flush_on_stop);
    }

    #[test]
    fn test_ring_capacity_from_duration() {
        let config = PipelineConfig::default();
        assert_eq!(config.ring_capacity_frames(), 144_000);
    }

    #[test]
    fn test_validate_rejects_zero_sample_rate() {
        let config = PipelineConfig {
            format: StreamFormat {
                sample_rate: 0,
                channels: 2,
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_chunk() {
        let config = PipelineConfig {
            chunk_frames: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_tiny_ring() {
        let config = PipelineConfig {
            ring_duration: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_format_duration_of() {
        let format = StreamFormat {
            sample_rate: 16_000,
            channels: 1,
        };
        assert_eq!(format.duration_of(1600), Duration::from_millis(100));
        assert_eq!(format.samples_for(100), 100);
    }
}
