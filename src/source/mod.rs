//! Source trait and built-in generators for decoded audio.
//!
//! A [`Source`] is whatever feeds frames into the pipeline - a decoder in a
//! real player. The crate ships two built-ins:
//!
//! - [`SineSource`]: an endless sine generator standing in for a decoder
//! - [`SilenceSource`]: a finite silence generator for tests and CI
//!
//! Sources are called from the producer thread only and are responsible for
//! nothing beyond filling interleaved sample buffers; pacing comes from the
//! ring's backpressure.

use crate::StreamFormat;

/// A producer of interleaved audio frames.
///
/// Implementations must fill `interleaved` with whole frames at the channel
/// count agreed at pipeline construction.
pub trait Source: Send {
    /// Fills `interleaved` with up to `interleaved.len() / channels` frames.
    ///
    /// Returns the number of frames produced. Returning 0 signals end of
    /// stream: the producer thread exits and the pipeline drains naturally.
    fn read(&mut self, interleaved: &mut [f32]) -> usize;
}

/// An endless sine-wave generator simulating decoded PCM.
///
/// Phase is continuous across chunks, so the output is glitch-free no
/// matter how the producer slices its reads. The same sample is written to
/// every channel of a frame.
///
/// # Example
///
/// ```
/// use pcm_pipeline::{SineSource, Source, StreamFormat};
///
/// let format = StreamFormat { sample_rate: 48_000, channels: 2 };
/// let mut source = SineSource::new(440.0, format);
///
/// let mut buf = [0.0f32; 256];
/// assert_eq!(source.read(&mut buf), 128);
/// ```
pub struct SineSource {
    channels: usize,
    phase: f64,
    step: f64,
    amplitude: f32,
}

impl SineSource {
    /// Default amplitude, matching a comfortable playback level.
    pub const DEFAULT_AMPLITUDE: f32 = 0.2;

    /// Creates a generator for the given frequency at the given format.
    pub fn new(frequency: f64, format: StreamFormat) -> Self {
        Self {
            channels: usize::from(format.channels),
            phase: 0.0,
            step: std::f64::consts::TAU * frequency / f64::from(format.sample_rate),
            amplitude: Self::DEFAULT_AMPLITUDE,
        }
    }

    /// Sets the output amplitude (linear, 0.0..=1.0).
    #[must_use]
    pub fn with_amplitude(mut self, amplitude: f32) -> Self {
        self.amplitude = amplitude;
        self
    }
}

impl Source for SineSource {
    fn read(&mut self, interleaved: &mut [f32]) -> usize {
        debug_assert_eq!(interleaved.len() % self.channels, 0);
        let frames = interleaved.len() / self.channels;
        for frame in interleaved.chunks_exact_mut(self.channels) {
            let value = (self.phase.sin() as f32) * self.amplitude;
            frame.fill(value);
            self.phase += self.step;
            if self.phase >= std::f64::consts::TAU {
                self.phase -= std::f64::consts::TAU;
            }
        }
        frames
    }
}

/// A finite silence generator for testing without hardware.
///
/// Produces exactly the configured number of zero frames and then reports
/// end of stream, making pipeline drain behavior deterministic in tests.
pub struct SilenceSource {
    channels: usize,
    remaining_frames: u64,
}

impl SilenceSource {
    /// Creates a generator that produces `total_frames` frames of silence.
    pub fn new(total_frames: u64, format: StreamFormat) -> Self {
        Self {
            channels: usize::from(format.channels),
            remaining_frames: total_frames,
        }
    }

    /// Returns the frames not yet produced.
    pub fn remaining_frames(&self) -> u64 {
        self.remaining_frames
    }
}

impl Source for SilenceSource {
    fn read(&mut self, interleaved: &mut [f32]) -> usize {
        debug_assert_eq!(interleaved.len() % self.channels, 0);
        let requested = (interleaved.len() / self.channels) as u64;
        let frames = requested.min(self.remaining_frames) as usize;
        interleaved[..frames * self.channels].fill(0.0);
        self.remaining_frames -= frames as u64;
        frames
    }
}
