//! Frame capture
//!
//! [`CaptureDevice`] is the capability interface a video source implements.
//! [`CaptureLoop`] samples it and turns raw pixels into wire-ready [`Frame`]s.

pub mod encoder;
pub mod sampler;

pub use encoder::{Frame, FrameEncoder, FrameFormat};
pub use sampler::CaptureLoop;

use crate::errors::DeviceError;

/// Raw RGB8 pixels read from a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedImage {
    pub width: u32,
    pub height: u32,
    /// Row-major RGB triplets
    pub pixels: Vec<u8>,
}

impl CapturedImage {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Solid black image.
    pub fn blank(width: u32, height: u32) -> Self {
        Self::new(width, height, vec![0; width as usize * height as usize * 3])
    }

    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }

    pub fn has_zero_dimension(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Exclusive handle on a video source.
///
/// A session acquires the device before streaming and releases it on every
/// exit path. Implementations must make `release` idempotent.
pub trait CaptureDevice: Send {
    /// Human-readable device name for logs
    fn name(&self) -> &str;

    /// Request exclusive access. Fails when the device is missing or the
    /// user denied permission.
    fn acquire(&mut self) -> Result<(), DeviceError>;

    /// Read the current frame. A source that is not ready yet may report
    /// zero dimensions.
    fn current_frame(&mut self) -> Result<CapturedImage, DeviceError>;

    fn release(&mut self);

    fn is_acquired(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_image() {
        let image = CapturedImage::blank(4, 2);
        assert_eq!(image.pixels.len(), 24);
        assert_eq!(image.expected_len(), 24);
        assert!(image.pixels.iter().all(|&p| p == 0));
        assert!(!image.has_zero_dimension());
        assert!(CapturedImage::blank(0, 480).has_zero_dimension());
    }
}
