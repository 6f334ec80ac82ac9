//! Null playback backend: discards frames at real-time pace.

use std::thread;

use crate::sink::Sink;
use crate::{SinkError, StreamFormat};

/// A sink that discards frames while sleeping out their duration.
///
/// Simulates the pacing of a hardware write without touching any device,
/// so the rest of the pipeline behaves exactly as it would with real
/// output. Used as the fallback when no platform device is available and
/// for running the pipeline in tests.
pub struct NullSink {
    name: String,
    format: Option<StreamFormat>,
}

impl NullSink {
    /// Creates a null sink.
    pub fn new() -> Self {
        Self {
            name: "null".to_string(),
            format: None,
        }
    }
}

impl Default for NullSink {
    fn default() -> Self {
        Self::new()
    }
}

impl Sink for NullSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_start(&mut self, format: StreamFormat) -> Result<(), SinkError> {
        self.format = Some(format);
        Ok(())
    }

    fn write(&mut self, interleaved: &[f32]) -> Result<(), SinkError> {
        let format = self.format.ok_or(SinkError::NotInitialized)?;
        let frames = interleaved.len() / usize::from(format.channels);
        thread::sleep(format.duration_of(frames));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn test_write_before_start_fails() {
        let mut sink = NullSink::new();
        assert!(matches!(
            sink.write(&[0.0; 4]),
            Err(SinkError::NotInitialized)
        ));
    }

    #[test]
    fn test_write_paces_to_real_time() {
        let mut sink = NullSink::new();
        let format = StreamFormat {
            sample_rate: 1_000,
            channels: 2,
        };
        sink.on_start(format).unwrap();

        // 50 frames at 1kHz is 50ms.
        let begin = Instant::now();
        sink.write(&[0.0; 100]).unwrap();
        assert!(begin.elapsed() >= Duration::from_millis(45));
    }
}
