//! Builder pattern for `PcmPipeline`.

use std::sync::Arc;
use std::thread;

use crate::config::PipelineConfig;
use crate::event::EventCallback;
use crate::pipeline::{ConsumerTask, ProducerTask};
use crate::ring::{frame_ring, peak_ring};
use crate::session::{MeterHandle, Session, SessionState};
use crate::sink::Sink;
use crate::source::Source;
use crate::{event_callback, PipelineError, PipelineEvent};

/// Builder for configuring and starting the audio pipeline.
///
/// Use [`PcmPipeline::builder()`] to create a new builder.
///
/// # Example
///
/// ```no_run
/// use pcm_pipeline::{PcmPipeline, PipelineConfig, SineSource, sink};
/// use std::time::Duration;
///
/// # fn main() -> Result<(), pcm_pipeline::PipelineError> {
/// let config = PipelineConfig::default();
/// let session = PcmPipeline::builder()
///     .source(SineSource::new(440.0, config.format))
///     .boxed_sink(sink::detect())
///     .config(config)
///     .on_event(|e| tracing::warn!(?e, "pipeline event"))
///     .start()?;
///
/// session.run_for(Duration::from_secs(5))?;
/// # Ok(())
/// # }
/// ```
#[must_use]
pub struct PipelineBuilder {
    source: Option<Box<dyn Source>>,
    sink: Option<Box<dyn Sink>>,
    config: PipelineConfig,
    event_callback: Option<EventCallback>,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            source: None,
            sink: None,
            config: PipelineConfig::default(),
            event_callback: None,
        }
    }

    /// Sets the frame source (decoder stand-in).
    pub fn source<S: Source + 'static>(mut self, source: S) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Sets the playback sink.
    pub fn sink<S: Sink + 'static>(mut self, sink: S) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Sets an already-boxed sink, e.g. from [`sink::detect()`](crate::sink::detect).
    pub fn boxed_sink(mut self, sink: Box<dyn Sink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Sets the pipeline configuration.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets a callback to receive runtime events.
    ///
    /// Events include meter overflow, sink errors, and source completion.
    /// The callback runs on pipeline threads and must not block.
    pub fn on_event<F>(mut self, callback: F) -> Self
    where
        F: Fn(PipelineEvent) + Send + Sync + 'static,
    {
        self.event_callback = Some(event_callback(callback));
        self
    }

    /// Starts the pipeline: allocates both rings, initializes the sink,
    /// and spawns the producer and consumer threads.
    ///
    /// Returns a [`Session`] handle to control the run.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No source or sink is configured
    /// - The configuration fails validation
    /// - A ring cannot be allocated
    /// - The sink fails to start
    /// - A thread cannot be spawned
    pub fn start(self) -> Result<Session, PipelineError> {
        let source = self.source.ok_or(PipelineError::NoSourceConfigured)?;
        let mut sink = self.sink.ok_or(PipelineError::NoSinkConfigured)?;
        let config = self.config;
        config.validate()?;

        let format = config.format;
        let capacity = config.ring_capacity_frames();
        let (frame_producer, frame_consumer) = frame_ring(capacity, format.channels)?;
        let (peak_producer, peak_consumer) = peak_ring(config.meter_capacity)?;

        sink.on_start(format)
            .map_err(|e| PipelineError::SinkStartFailed {
                sink_name: sink.name().to_string(),
                reason: e.to_string(),
            })?;

        let state = Arc::new(SessionState::new());

        let producer = ProducerTask {
            source,
            ring: frame_producer,
            meter: peak_producer,
            state: Arc::clone(&state),
            event_callback: self.event_callback.clone(),
            chunk_frames: config.chunk_frames,
            spin_limit: config.spin_limit,
        };
        let consumer = ConsumerTask {
            sink,
            ring: frame_consumer,
            state: Arc::clone(&state),
            event_callback: self.event_callback,
            sink_chunk_frames: config.sink_chunk_frames,
            spin_limit: config.spin_limit,
            flush_on_stop: config.flush_on_stop,
        };

        let producer_handle = spawn_thread("pcm-producer", move || producer.run())?;
        let consumer_handle = match spawn_thread("pcm-consumer", move || consumer.run()) {
            Ok(handle) => handle,
            Err(err) => {
                // Unwind the producer before reporting the failure.
                state
                    .running
                    .store(false, std::sync::atomic::Ordering::SeqCst);
                let _ = producer_handle.join();
                return Err(err);
            }
        };

        tracing::info!(
            sample_rate = format.sample_rate,
            channels = format.channels,
            ring_frames = capacity,
            "pipeline started"
        );

        Ok(Session::new(
            state,
            producer_handle,
            consumer_handle,
            MeterHandle::new(peak_consumer),
        ))
    }
}

fn spawn_thread<F>(name: &str, body: F) -> Result<thread::JoinHandle<()>, PipelineError>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn(body)
        .map_err(|source| PipelineError::ThreadSpawn {
            name: name.to_string(),
            source,
        })
}

/// Main entry point for pcm-pipeline.
///
/// Use [`PcmPipeline::builder()`] to start configuring a pipeline.
pub struct PcmPipeline;

impl PcmPipeline {
    /// Creates a new builder for configuring the pipeline.
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::NullSink;
    use crate::source::SineSource;
    use crate::StreamFormat;

    #[test]
    fn test_builder_default_is_empty() {
        let builder = PipelineBuilder::new();
        assert!(builder.source.is_none());
        assert!(builder.sink.is_none());
    }

    #[test]
    fn test_start_rejects_missing_source() {
        let result = PcmPipeline::builder().sink(NullSink::new()).start();
        assert!(matches!(result, Err(PipelineError::NoSourceConfigured)));
    }

    #[test]
    fn test_start_rejects_missing_sink() {
        let result = PcmPipeline::builder()
            .source(SineSource::new(440.0, StreamFormat::default()))
            .start();
        assert!(matches!(result, Err(PipelineError::NoSinkConfigured)));
    }

    #[test]
    fn test_start_rejects_invalid_config() {
        let config = PipelineConfig {
            chunk_frames: 0,
            ..Default::default()
        };
        let result = PcmPipeline::builder()
            .source(SineSource::new(440.0, config.format))
            .sink(NullSink::new())
            .config(config)
            .start();
        assert!(matches!(result, Err(PipelineError::InvalidConfig { .. })));
    }
}
