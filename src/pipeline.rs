//! Producer and consumer thread bodies plus their retry policy.
//!
//! The two loops here are the only callers of the frame ring. Each loop
//! iteration moves one chunk: the producer fills a staging buffer from the
//! source, publishes the chunk peak to the meter ring, then pushes the
//! chunk; the consumer pops a chunk and hands it to the sink. A full or
//! empty ring is handled by retrying with [`Backoff`], never by a blocking
//! wait - kernel-level waits on the playback path can be delayed by
//! scheduler jitter and cause audible dropouts.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;

use crate::event::{EventCallback, PipelineEvent};
use crate::ring::{FrameConsumer, FrameProducer, PeakProducer};
use crate::session::SessionState;
use crate::sink::Sink;
use crate::source::Source;

/// Spin-then-yield retry policy for full/empty ring conditions.
///
/// Waits busy-spin (`std::hint::spin_loop`) for a bounded number of
/// attempts, then degrades to `thread::yield_now()`. The spin bound is a
/// per-pipeline tuning knob ([`PipelineConfig::spin_limit`]) so the policy
/// can be adjusted per platform without touching ring logic.
///
/// [`PipelineConfig::spin_limit`]: crate::PipelineConfig::spin_limit
#[derive(Debug)]
pub struct Backoff {
    spin_limit: u32,
    spins: u32,
}

impl Backoff {
    /// Creates a policy that spins `spin_limit` times before yielding.
    pub fn new(spin_limit: u32) -> Self {
        Self {
            spin_limit,
            spins: 0,
        }
    }

    /// Waits once: a processor hint while under the spin bound, a
    /// cooperative yield after it.
    pub fn wait(&mut self) {
        if self.spins < self.spin_limit {
            self.spins += 1;
            std::hint::spin_loop();
        } else {
            thread::yield_now();
        }
    }

    /// Resets the spin counter after progress was made.
    pub fn reset(&mut self) {
        self.spins = 0;
    }
}

/// State and collaborators owned by the producer thread.
pub(crate) struct ProducerTask {
    pub source: Box<dyn Source>,
    pub ring: FrameProducer,
    pub meter: PeakProducer,
    pub state: Arc<SessionState>,
    pub event_callback: Option<EventCallback>,
    pub chunk_frames: usize,
    pub spin_limit: u32,
}

impl ProducerTask {
    /// Runs the decode/generate loop until stop or source end of stream.
    pub fn run(mut self) {
        let channels = self.ring.channels();
        let mut staging = vec![0.0f32; self.chunk_frames * channels];
        let mut backoff = Backoff::new(self.spin_limit);
        let mut meter_was_full = false;

        'run: while self.state.running.load(Ordering::SeqCst) {
            let frames = self.source.read(&mut staging);
            if frames == 0 {
                let produced = self.state.frames_produced.load(Ordering::SeqCst);
                tracing::info!(frames_produced = produced, "source finished");
                self.emit(PipelineEvent::SourceFinished {
                    frames_produced: produced,
                });
                break;
            }
            let samples = frames * channels;

            // Chunk peak for the UI meter, best-effort.
            let mut peak = 0.0f32;
            for &sample in &staging[..samples] {
                peak = peak.max(sample.abs());
            }
            if self.meter.push(peak) {
                meter_was_full = false;
            } else {
                self.state.meter_drops.fetch_add(1, Ordering::SeqCst);
                if !meter_was_full {
                    meter_was_full = true;
                    let dropped = self.meter.dropped();
                    tracing::warn!(dropped, "meter ring full, dropping peaks");
                    self.emit(PipelineEvent::MeterOverflow { dropped });
                }
            }

            // Transfer the whole chunk, yielding between failed attempts.
            // Observing the stop flag abandons the remainder; frames already
            // pushed stay pushed.
            let mut pushed = 0;
            let mut was_stalled = false;
            while pushed < frames {
                if !self.state.running.load(Ordering::SeqCst) {
                    self.state
                        .frames_produced
                        .fetch_add(pushed as u64, Ordering::SeqCst);
                    break 'run;
                }
                let wrote = self.ring.push(&staging[pushed * channels..samples]);
                if wrote == 0 {
                    if !was_stalled {
                        was_stalled = true;
                        self.state.producer_stalls.fetch_add(1, Ordering::SeqCst);
                    }
                    backoff.wait();
                } else {
                    pushed += wrote;
                    backoff.reset();
                }
            }
            self.state
                .frames_produced
                .fetch_add(pushed as u64, Ordering::SeqCst);
        }

        // Publish completion after the last push so the consumer can drain
        // everything and then exit.
        self.state.producer_done.store(true, Ordering::SeqCst);
        tracing::debug!("producer thread exiting");
    }

    fn emit(&self, event: PipelineEvent) {
        if let Some(ref callback) = self.event_callback {
            callback(event);
        }
    }
}

/// State and collaborators owned by the consumer thread.
pub(crate) struct ConsumerTask {
    pub sink: Box<dyn Sink>,
    pub ring: FrameConsumer,
    pub state: Arc<SessionState>,
    pub event_callback: Option<EventCallback>,
    pub sink_chunk_frames: usize,
    pub spin_limit: u32,
    pub flush_on_stop: bool,
}

impl ConsumerTask {
    /// Runs the playback loop until stop, sink failure, or drain-out.
    pub fn run(mut self) {
        let channels = self.ring.channels();
        let mut buf = vec![0.0f32; self.sink_chunk_frames * channels];
        let mut backoff = Backoff::new(self.spin_limit);
        let mut was_starved = false;

        loop {
            let stopping = !self.state.running.load(Ordering::SeqCst);
            if stopping && !self.flush_on_stop {
                // Residual ring contents are discarded.
                break;
            }
            // Read the completion flag before popping: once it is observed,
            // an empty pop means no more frames can ever arrive.
            let producer_done = self.state.producer_done.load(Ordering::SeqCst);

            let got = self.ring.pop(&mut buf);
            if got == 0 {
                if stopping || producer_done {
                    break;
                }
                if !was_starved {
                    was_starved = true;
                    self.state.underruns.fetch_add(1, Ordering::SeqCst);
                }
                backoff.wait();
                continue;
            }
            was_starved = false;
            backoff.reset();

            if let Err(err) = self.sink.write(&buf[..got * channels]) {
                let sink_name = self.sink.name().to_string();
                tracing::error!(sink = %sink_name, %err, "sink write failed, stopping pipeline");
                self.emit(PipelineEvent::SinkError {
                    sink_name: sink_name.clone(),
                    error: err.to_string(),
                });
                self.state.record_sink_failure(sink_name, err.to_string());
                self.state.running.store(false, Ordering::SeqCst);
                break;
            }
            self.state
                .frames_rendered
                .fetch_add(got as u64, Ordering::SeqCst);
        }

        if let Err(err) = self.sink.on_stop() {
            tracing::warn!(sink = self.sink.name(), %err, "sink failed to stop cleanly");
        }
        tracing::debug!("consumer thread exiting");
    }

    fn emit(&self, event: PipelineEvent) {
        if let Some(ref callback) = self.event_callback {
            callback(event);
        }
    }
}
