//! Error types for pcm-pipeline.
//!
//! Errors are split into two categories:
//! - **Fatal errors** ([`PipelineError`], [`RingError`]): Prevent the pipeline from starting
//! - **Recoverable events**: Runtime issues surfaced via [`EventCallback`](crate::EventCallback)
//!
//! A push or pop transferring fewer frames than requested is *not* an error;
//! it is the normal backpressure signal and is reported through return counts.

/// Errors from constructing a ring buffer.
///
/// Construction either succeeds completely or fails with one of these
/// variants - no partially-constructed ring is ever returned.
#[derive(Debug, thiserror::Error)]
pub enum RingError {
    /// The requested capacity was zero frames.
    #[error("ring capacity must be at least one frame")]
    ZeroCapacity,

    /// The requested channel count was zero.
    #[error("channel count must be non-zero")]
    ZeroChannels,

    /// `capacity * channels` does not fit in `usize`.
    #[error("ring dimensions overflow addressable storage")]
    CapacityOverflow,

    /// The backing storage could not be allocated.
    #[error("failed to allocate {bytes} bytes of ring storage")]
    Allocation {
        /// Size of the allocation that failed.
        bytes: usize,
    },
}

/// Fatal errors that prevent the audio pipeline from starting or stopping
/// cleanly.
///
/// These are returned from [`PipelineBuilder::start()`] and [`Session::stop()`].
/// Runtime issues (meter overflow, transient underruns) are handled via the
/// event callback and session statistics instead.
///
/// [`PipelineBuilder::start()`]: crate::PipelineBuilder::start
/// [`Session::stop()`]: crate::Session::stop
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The pipeline configuration failed validation.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What was wrong with the configuration.
        reason: String,
    },

    /// A ring buffer could not be allocated.
    #[error("ring allocation failed: {0}")]
    Ring(#[from] RingError),

    /// No source was configured before starting.
    #[error("no source configured - call source() before start()")]
    NoSourceConfigured,

    /// No sink was configured before starting.
    #[error("no sink configured - call sink() before start()")]
    NoSinkConfigured,

    /// The sink failed during initialization.
    #[error("sink '{sink_name}' failed to start: {reason}")]
    SinkStartFailed {
        /// Name of the sink that failed.
        sink_name: String,
        /// Why the sink failed to start.
        reason: String,
    },

    /// The sink rejected a chunk during playback.
    ///
    /// The consumer loop stops on the first sink failure; the error is
    /// surfaced when the session is stopped.
    #[error("sink '{sink_name}' failed during playback: {reason}")]
    SinkFailed {
        /// Name of the sink that failed.
        sink_name: String,
        /// Description of the failure.
        reason: String,
    },

    /// A pipeline thread could not be spawned.
    #[error("failed to spawn {name} thread: {source}")]
    ThreadSpawn {
        /// Name of the thread that failed to spawn.
        name: String,
        /// The underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// An error from the underlying audio library (CPAL).
    #[error("audio backend error: {0}")]
    Backend(String),
}

/// Errors that can occur within a [`Sink`](crate::Sink) implementation.
///
/// A write failure is fatal to the consumer loop: the pipeline transitions
/// to stopping and the failure is reported from [`Session::stop()`].
/// The ring itself is never corrupted by a sink failure.
///
/// [`Session::stop()`]: crate::Session::stop
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// A write operation failed.
    #[error("write failed: {reason}")]
    WriteFailed {
        /// Description of what went wrong.
        reason: String,
    },

    /// The sink was used before initialization.
    #[error("sink not initialized (call on_start first)")]
    NotInitialized,

    /// An error from the underlying audio backend.
    #[error("audio backend error: {0}")]
    Backend(String),

    /// Custom error for user-implemented sinks.
    #[error("{0}")]
    Custom(String),
}

impl SinkError {
    /// Creates a custom sink error with the given message.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }

    /// Creates a write failed error with the given reason.
    pub fn write_failed(reason: impl Into<String>) -> Self {
        Self::WriteFailed {
            reason: reason.into(),
        }
    }

    /// Creates a backend error with the given message.
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}
