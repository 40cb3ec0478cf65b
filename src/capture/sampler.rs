use super::{CaptureDevice, Frame, FrameEncoder};
use crate::errors::DeviceError;
use std::time::Duration;

/// Samples a device at a fixed cadence.
///
/// The loop itself is driven by the session: after each send attempt settles
/// it waits [`interval`](CaptureLoop::interval) before calling
/// [`sample`](CaptureLoop::sample) again, so sends never overlap.
#[derive(Debug, Clone)]
pub struct CaptureLoop {
    interval: Duration,
    encoder: FrameEncoder,
    last_sequence: u64,
}

impl CaptureLoop {
    pub fn new(interval: Duration, encoder: FrameEncoder) -> Self {
        Self {
            interval,
            encoder,
            last_sequence: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    /// Read and encode the current frame.
    ///
    /// Device failures are returned. A frame that cannot be encoded is logged
    /// and yields `None`, skipping this cycle.
    pub fn sample(&mut self, device: &mut dyn CaptureDevice) -> Result<Option<Frame>, DeviceError> {
        let image = device.current_frame()?;
        self.last_sequence += 1;
        let sequence = self.last_sequence;

        match self.encoder.encode(sequence, image) {
            Ok(frame) => {
                log::debug!(
                    "Captured frame #{} ({}x{}, {} bytes) from {}",
                    sequence,
                    frame.width,
                    frame.height,
                    frame.data.len(),
                    device.name()
                );
                Ok(Some(frame))
            }
            Err(reason) => {
                log::warn!("Skipping frame #{}: {}", sequence, reason);
                Ok(None)
            }
        }
    }
}
