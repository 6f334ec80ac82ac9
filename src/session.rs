//! Pipeline session management.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::ring::PeakConsumer;
use crate::PipelineError;

/// Statistics about a pipeline session.
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Total frames pushed into the frame ring by the producer.
    pub frames_produced: u64,
    /// Total frames delivered to the sink by the consumer.
    pub frames_rendered: u64,
    /// Number of consumer starvation episodes (empty ring while running).
    pub underruns: u64,
    /// Number of producer backpressure episodes (full ring while running).
    pub producer_stalls: u64,
    /// Number of producer iterations whose peak value was dropped.
    pub meter_drops: u64,
}

/// Internal state shared between the session and its two threads.
pub(crate) struct SessionState {
    /// Cooperative stop signal observed by both loops. The only cross-thread
    /// control state besides the rings themselves.
    pub running: AtomicBool,
    /// Set by the producer after its final push (source end of stream).
    pub producer_done: AtomicBool,
    pub frames_produced: AtomicU64,
    pub frames_rendered: AtomicU64,
    pub underruns: AtomicU64,
    pub producer_stalls: AtomicU64,
    pub meter_drops: AtomicU64,
    /// First sink failure, recorded by the consumer thread. Off the audio
    /// path: touched once at failure and once at stop().
    sink_failure: Mutex<Option<(String, String)>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(true),
            producer_done: AtomicBool::new(false),
            frames_produced: AtomicU64::new(0),
            frames_rendered: AtomicU64::new(0),
            underruns: AtomicU64::new(0),
            producer_stalls: AtomicU64::new(0),
            meter_drops: AtomicU64::new(0),
            sink_failure: Mutex::new(None),
        }
    }

    pub fn record_sink_failure(&self, sink_name: String, reason: String) {
        let mut slot = self.sink_failure.lock().unwrap_or_else(|e| e.into_inner());
        slot.get_or_insert((sink_name, reason));
    }

    fn take_sink_failure(&self) -> Option<(String, String)> {
        let mut slot = self.sink_failure.lock().unwrap_or_else(|e| e.into_inner());
        slot.take()
    }
}

/// Handle to the peak meter's read side, for an observer (UI) thread.
///
/// Obtained once per session via [`Session::take_meter`] so that exactly one
/// observer exists. Poll [`read_peaks`](MeterHandle::read_peaks) at whatever
/// cadence suits the UI; values may have been dropped under sustained
/// overflow, so gaps must be tolerated.
pub struct MeterHandle {
    consumer: PeakConsumer,
}

impl MeterHandle {
    pub(crate) fn new(consumer: PeakConsumer) -> Self {
        Self { consumer }
    }

    /// Copies up to `dest.len()` pending peak values in FIFO order.
    ///
    /// Returns the count copied; 0 means nothing was pending. Never blocks.
    pub fn read_peaks(&mut self, dest: &mut [f32]) -> usize {
        self.consumer.drain(dest)
    }

    /// Returns a racy snapshot of the values waiting to be read.
    pub fn available(&self) -> usize {
        self.consumer.available()
    }

    /// Returns the cumulative count of peaks dropped on the audio thread.
    pub fn dropped(&self) -> u64 {
        self.consumer.dropped()
    }
}

/// Handle to a running audio pipeline.
///
/// Returned by [`PipelineBuilder::start()`]. The producer and consumer
/// threads run until [`stop()`](Session::stop) is called, the source ends,
/// or the sink fails. Dropping the session also stops the pipeline (but
/// prefer explicit `stop()`, which reports sink failures).
///
/// # Lifecycle
///
/// Idle → Running ([`PipelineBuilder::start()`]) → StopRequested
/// ([`stop()`](Session::stop) clears the shared flag) → Drained (both
/// threads joined) → Idle (ring storage released after the joins).
///
/// [`PipelineBuilder::start()`]: crate::PipelineBuilder::start
pub struct Session {
    state: Arc<SessionState>,
    producer_handle: Option<JoinHandle<()>>,
    consumer_handle: Option<JoinHandle<()>>,
    meter: Option<MeterHandle>,
}

impl Session {
    pub(crate) fn new(
        state: Arc<SessionState>,
        producer_handle: JoinHandle<()>,
        consumer_handle: JoinHandle<()>,
        meter: MeterHandle,
    ) -> Self {
        Self {
            state,
            producer_handle: Some(producer_handle),
            consumer_handle: Some(consumer_handle),
            meter: Some(meter),
        }
    }

    /// Returns `true` while the stop flag is set and no sink failure has
    /// forced a shutdown.
    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::SeqCst)
    }

    /// Returns current session statistics.
    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            frames_produced: self.state.frames_produced.load(Ordering::SeqCst),
            frames_rendered: self.state.frames_rendered.load(Ordering::SeqCst),
            underruns: self.state.underruns.load(Ordering::SeqCst),
            producer_stalls: self.state.producer_stalls.load(Ordering::SeqCst),
            meter_drops: self.state.meter_drops.load(Ordering::SeqCst),
        }
    }

    /// Hands the peak meter's read side to the caller, once.
    ///
    /// Returns `None` on the second and later calls: the meter ring is
    /// SPSC, so only one observer may exist.
    pub fn take_meter(&mut self) -> Option<MeterHandle> {
        self.meter.take()
    }

    /// Runs for the given duration, then stops the pipeline.
    ///
    /// Convenience wrapper over [`stop()`](Session::stop) for fixed-length
    /// sessions.
    pub fn run_for(self, duration: Duration) -> Result<(), PipelineError> {
        std::thread::sleep(duration);
        self.stop()
    }

    /// Gracefully stops the pipeline.
    ///
    /// Clears the shared running flag, joins both threads (each observes
    /// the flag at its next loop boundary), and releases ring storage. Any
    /// frames still resident in the frame ring are discarded unless
    /// [`flush_on_stop`](crate::PipelineConfig::flush_on_stop) is set.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::SinkFailed`] if the sink rejected a chunk
    /// at any point during the session.
    pub fn stop(mut self) -> Result<(), PipelineError> {
        self.stop_internal()
    }

    fn stop_internal(&mut self) -> Result<(), PipelineError> {
        self.state.running.store(false, Ordering::SeqCst);

        if let Some(handle) = self.producer_handle.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.consumer_handle.take() {
            let _ = handle.join();
        }

        tracing::info!(
            frames_produced = self.state.frames_produced.load(Ordering::SeqCst),
            frames_rendered = self.state.frames_rendered.load(Ordering::SeqCst),
            "pipeline stopped"
        );

        match self.state.take_sink_failure() {
            Some((sink_name, reason)) => Err(PipelineError::SinkFailed { sink_name, reason }),
            None => Ok(()),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.producer_handle.is_some() || self.consumer_handle.is_some() {
            // Dropped without explicit stop() - still join before releasing
            // the rings so neither thread outlives the session.
            let _ = self.stop_internal();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_state_new() {
        let state = SessionState::new();
        assert!(state.running.load(Ordering::SeqCst));
        assert!(!state.producer_done.load(Ordering::SeqCst));
        assert_eq!(state.frames_produced.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_first_sink_failure_wins() {
        let state = SessionState::new();
        state.record_sink_failure("a".into(), "first".into());
        state.record_sink_failure("b".into(), "second".into());
        let (name, reason) = state.take_sink_failure().unwrap();
        assert_eq!(name, "a");
        assert_eq!(reason, "first");
        assert!(state.take_sink_failure().is_none());
    }

    #[test]
    fn test_stats_default() {
        let stats = PipelineStats::default();
        assert_eq!(stats.frames_produced, 0);
        assert_eq!(stats.frames_rendered, 0);
        assert_eq!(stats.underruns, 0);
        assert_eq!(stats.producer_stalls, 0);
        assert_eq!(stats.meter_drops, 0);
    }
}
