//! Runtime events for monitoring pipeline health.
//!
//! Events are non-fatal notifications about pipeline behavior. The pipeline
//! continues running after most events are emitted - they're for logging and
//! metrics, not error handling. The exception is [`PipelineEvent::SinkError`],
//! which accompanies the transition into stopping.

use std::sync::Arc;

/// Runtime events emitted while the pipeline is running.
///
/// Use the [`EventCallback`] to log these or update metrics. Callbacks are
/// invoked from the producer or consumer thread, so they must be cheap and
/// must never block.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// The peak meter ring was full and a value was dropped.
    ///
    /// Emitted once per overflow episode, not per dropped value. The meter
    /// is lossy by design; this event means the observer is polling slower
    /// than steady-state production.
    MeterOverflow {
        /// Cumulative values dropped so far this session.
        dropped: u64,
    },

    /// The sink rejected a chunk.
    ///
    /// The consumer loop stops after emitting this; the failure is also
    /// returned from [`Session::stop()`](crate::Session::stop).
    SinkError {
        /// Name of the sink that errored.
        sink_name: String,
        /// Description of the error.
        error: String,
    },

    /// The source reached end of stream.
    ///
    /// The producer thread exits after emitting this. The consumer keeps
    /// draining frames still resident in the ring.
    SourceFinished {
        /// Total frames produced over the session.
        frames_produced: u64,
    },
}

/// Callback type for receiving runtime events.
///
/// Register an event callback via [`PipelineBuilder::on_event()`] to receive
/// notifications about meter overflow, sink errors, and source completion.
///
/// [`PipelineBuilder::on_event()`]: crate::PipelineBuilder::on_event
pub type EventCallback = Arc<dyn Fn(PipelineEvent) + Send + Sync>;

/// Creates an [`EventCallback`] from a closure.
///
/// This is a convenience function for creating event callbacks without
/// manually wrapping in `Arc`.
///
/// # Example
///
/// ```
/// use pcm_pipeline::{event_callback, PipelineEvent};
///
/// let callback = event_callback(|event| {
///     println!("Got event: {:?}", event);
/// });
/// ```
pub fn event_callback<F>(f: F) -> EventCallback
where
    F: Fn(PipelineEvent) + Send + Sync + 'static,
{
    Arc::new(f)
}
