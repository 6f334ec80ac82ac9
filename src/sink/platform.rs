//! CPAL playback backend for the default output device.
//!
//! The CPAL stream is callback-driven and its handle is not `Send`, so the
//! sink keeps a dedicated device thread that owns the stream, fed through
//! an internal frame ring. The callback pops from the ring, zero-filling
//! any shortfall; `write` pushes with the same spin-then-yield pacing the
//! pipeline uses, which naturally blocks the consumer thread to the
//! device's real playback rate.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::Device;

use crate::pipeline::Backoff;
use crate::ring::{frame_ring, FrameConsumer, FrameProducer};
use crate::sink::Sink;
use crate::{SinkError, StreamFormat};

/// Depth of the ring between `write` and the device callback, in seconds.
const DEVICE_RING_SECONDS: f64 = 0.25;

/// Spin bound for the pacing loop in `write`.
const WRITE_SPIN_LIMIT: u32 = 64;

/// A sink that plays through the system's default output device.
///
/// Created via [`probe()`](PlatformSink::probe), which fails cleanly when
/// no output device is usable so callers can fall back to
/// [`NullSink`](crate::NullSink) (see [`detect()`](crate::sink::detect)).
pub struct PlatformSink {
    name: String,
    device: Option<Device>,
    device_name: String,
    worker: Option<Worker>,
}

/// Handles shared with the device thread after `on_start`.
struct Worker {
    producer: FrameProducer,
    shutdown: Arc<AtomicBool>,
    failed: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl PlatformSink {
    /// Probes the default host for a usable output device.
    ///
    /// # Errors
    ///
    /// Returns a [`SinkError`] when no default output device exists or its
    /// configuration cannot be queried.
    pub fn probe() -> Result<Self, SinkError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| SinkError::backend("no default output device"))?;
        device
            .default_output_config()
            .map_err(|e| SinkError::backend(e.to_string()))?;
        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());

        Ok(Self {
            name: "platform".to_string(),
            device: Some(device),
            device_name,
            worker: None,
        })
    }

    /// Returns the probed device name.
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    fn shutdown_worker(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            worker.shutdown.store(true, Ordering::SeqCst);
            if let Some(handle) = worker.handle.take() {
                let _ = handle.join();
            }
        }
    }
}

impl Sink for PlatformSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_start(&mut self, format: StreamFormat) -> Result<(), SinkError> {
        let device = self
            .device
            .take()
            .ok_or_else(|| SinkError::backend("platform sink already started"))?;

        let capacity = (f64::from(format.sample_rate) * DEVICE_RING_SECONDS) as usize;
        let (producer, consumer) =
            frame_ring(capacity.max(1), format.channels).map_err(|e| SinkError::backend(e.to_string()))?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let failed = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = mpsc::channel();

        let handle = {
            let shutdown = Arc::clone(&shutdown);
            let failed = Arc::clone(&failed);
            thread::Builder::new()
                .name("pcm-device".to_string())
                .spawn(move || run_stream(device, format, consumer, shutdown, failed, ready_tx))
                .map_err(|e| SinkError::backend(format!("failed to spawn device thread: {e}")))?
        };

        match ready_rx.recv() {
            Ok(Ok(())) => {
                self.worker = Some(Worker {
                    producer,
                    shutdown,
                    failed,
                    handle: Some(handle),
                });
                Ok(())
            }
            Ok(Err(err)) => {
                let _ = handle.join();
                Err(err)
            }
            Err(_) => {
                let _ = handle.join();
                Err(SinkError::backend("device thread died during startup"))
            }
        }
    }

    fn write(&mut self, interleaved: &[f32]) -> Result<(), SinkError> {
        let worker = self.worker.as_mut().ok_or(SinkError::NotInitialized)?;
        let channels = worker.producer.channels();
        debug_assert_eq!(interleaved.len() % channels, 0);
        let frames = interleaved.len() / channels;

        let mut pushed = 0;
        let mut backoff = Backoff::new(WRITE_SPIN_LIMIT);
        while pushed < frames {
            if worker.failed.load(Ordering::SeqCst) {
                return Err(SinkError::write_failed("audio output stream failed"));
            }
            let wrote = worker
                .producer
                .push(&interleaved[pushed * channels..frames * channels]);
            if wrote == 0 {
                backoff.wait();
            } else {
                pushed += wrote;
                backoff.reset();
            }
        }
        Ok(())
    }

    fn on_stop(&mut self) -> Result<(), SinkError> {
        self.shutdown_worker();
        Ok(())
    }
}

impl Drop for PlatformSink {
    fn drop(&mut self) {
        self.shutdown_worker();
    }
}

/// Device thread body: owns the CPAL stream for its whole lifetime.
fn run_stream(
    device: Device,
    format: StreamFormat,
    mut consumer: FrameConsumer,
    shutdown: Arc<AtomicBool>,
    failed: Arc<AtomicBool>,
    ready_tx: mpsc::Sender<Result<(), SinkError>>,
) {
    let config = cpal::StreamConfig {
        channels: format.channels,
        sample_rate: cpal::SampleRate(format.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };
    let channels = usize::from(format.channels);
    let callback_failed = Arc::clone(&failed);

    let stream = match device.build_output_stream(
        &config,
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            let usable = data.len() - data.len() % channels;
            let got = consumer.pop(&mut data[..usable]);
            // Shortfall renders as silence, not stale samples.
            data[got * channels..].fill(0.0);
        },
        move |err| {
            tracing::error!(%err, "audio output stream error");
            callback_failed.store(true, Ordering::SeqCst);
        },
        None,
    ) {
        Ok(stream) => stream,
        Err(err) => {
            failed.store(true, Ordering::SeqCst);
            let _ = ready_tx.send(Err(SinkError::backend(err.to_string())));
            return;
        }
    };

    if let Err(err) = stream.play() {
        failed.store(true, Ordering::SeqCst);
        let _ = ready_tx.send(Err(SinkError::backend(err.to_string())));
        return;
    }
    let _ = ready_tx.send(Ok(()));

    // Playback happens on CPAL's callback thread; this thread only keeps
    // the stream handle alive until shutdown.
    while !shutdown.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(10));
    }
}
