//! Synthetic capture device
//!
//! Renders a chessboard pattern so streaming can run without hardware, and
//! records every acquire, release and read in a shared [`DeviceProbe`].

use crate::capture::{CaptureDevice, CapturedImage};
use crate::errors::DeviceError;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Render an 8x8 board at `width`x`height`, shifted by `frame_number` so
/// consecutive frames differ.
pub fn synthetic_board_frame(frame_number: u64, width: u32, height: u32) -> CapturedImage {
    let mut pixels = vec![0u8; width as usize * height as usize * 3];
    let square_w = (width / 8).max(1);
    let square_h = (height / 8).max(1);
    let tint = (frame_number % 32) as u8;

    for y in 0..height {
        for x in 0..width {
            let idx = (y as usize * width as usize + x as usize) * 3;
            let light = ((x / square_w) + (y / square_h)) % 2 == 0;
            let (r, g, b): (u8, u8, u8) = if light { (240, 217, 181) } else { (181, 136, 99) };
            pixels[idx] = r;
            pixels[idx + 1] = g.wrapping_add(tint);
            pixels[idx + 2] = b;
        }
    }

    CapturedImage::new(width, height, pixels)
}

/// Shared counters describing what a device went through.
#[derive(Debug, Default)]
pub struct DeviceProbe {
    held: AtomicUsize,
    max_held: AtomicUsize,
    acquisitions: AtomicU64,
    releases: AtomicU64,
    frames_read: AtomicU64,
}

impl DeviceProbe {
    /// Devices currently acquired
    pub fn held(&self) -> usize {
        self.held.load(Ordering::SeqCst)
    }

    /// Highest number of devices acquired at the same time
    pub fn max_held(&self) -> usize {
        self.max_held.load(Ordering::SeqCst)
    }

    pub fn acquisitions(&self) -> u64 {
        self.acquisitions.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> u64 {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read.load(Ordering::SeqCst)
    }

    fn on_acquire(&self) {
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        let now = self.held.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_held.fetch_max(now, Ordering::SeqCst);
    }

    fn on_release(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
        self.held.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Knobs tests flip while a device is owned by a session.
#[derive(Debug, Default)]
struct Faults {
    deny_acquire: AtomicBool,
    fail_reads: AtomicBool,
    acquire_error: Mutex<Option<DeviceError>>,
    release_delay: Mutex<Option<Duration>>,
}

/// Handle for injecting device failures after the camera was handed over.
#[derive(Debug, Clone)]
pub struct DeviceFaults {
    inner: Arc<Faults>,
}

impl DeviceFaults {
    /// Make the next acquisitions fail with `error`; `None` restores access.
    pub fn deny_acquire(&self, error: Option<DeviceError>) {
        self.inner.deny_acquire.store(error.is_some(), Ordering::SeqCst);
        if let Ok(mut slot) = self.inner.acquire_error.lock() {
            *slot = error;
        }
    }

    /// Make frame reads fail until switched off again.
    pub fn fail_reads(&self, fail: bool) {
        self.inner.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Block for `delay` inside every release, like a driver closing slowly.
    pub fn slow_release(&self, delay: Option<Duration>) {
        if let Ok(mut slot) = self.inner.release_delay.lock() {
            *slot = delay;
        }
    }
}

/// In-process camera rendering a synthetic board.
#[derive(Debug)]
pub struct SyntheticCamera {
    name: String,
    width: u32,
    height: u32,
    acquired: bool,
    frame_number: u64,
    probe: Arc<DeviceProbe>,
    faults: Arc<Faults>,
}

impl SyntheticCamera {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            name: format!("synthetic-board-{}x{}", width, height),
            width,
            height,
            acquired: false,
            frame_number: 0,
            probe: Arc::new(DeviceProbe::default()),
            faults: Arc::new(Faults::default()),
        }
    }

    pub fn probe(&self) -> Arc<DeviceProbe> {
        Arc::clone(&self.probe)
    }

    pub fn faults(&self) -> DeviceFaults {
        DeviceFaults {
            inner: Arc::clone(&self.faults),
        }
    }
}

impl CaptureDevice for SyntheticCamera {
    fn name(&self) -> &str {
        &self.name
    }

    fn acquire(&mut self) -> Result<(), DeviceError> {
        if self.acquired {
            return Ok(());
        }
        if self.faults.deny_acquire.load(Ordering::SeqCst) {
            let error = self
                .faults
                .acquire_error
                .lock()
                .ok()
                .and_then(|slot| slot.clone())
                .unwrap_or_else(|| DeviceError::Unavailable(self.name.clone()));
            return Err(error);
        }
        self.acquired = true;
        self.probe.on_acquire();
        Ok(())
    }

    fn current_frame(&mut self) -> Result<CapturedImage, DeviceError> {
        if !self.acquired {
            return Err(DeviceError::Capture(format!("{} is not acquired", self.name)));
        }
        if self.faults.fail_reads.load(Ordering::SeqCst) {
            return Err(DeviceError::Capture(format!("{} stopped delivering frames", self.name)));
        }
        self.frame_number += 1;
        self.probe.frames_read.fetch_add(1, Ordering::SeqCst);
        if self.width == 0 || self.height == 0 {
            return Ok(CapturedImage::new(self.width, self.height, Vec::new()));
        }
        Ok(synthetic_board_frame(self.frame_number, self.width, self.height))
    }

    fn release(&mut self) {
        if self.acquired {
            let delay = self.faults.release_delay.lock().ok().and_then(|slot| *slot);
            if let Some(delay) = delay {
                std::thread::sleep(delay);
            }
            self.acquired = false;
            self.probe.on_release();
        }
    }

    fn is_acquired(&self) -> bool {
        self.acquired
    }
}

impl Drop for SyntheticCamera {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_board_frame_size() {
        let frame = synthetic_board_frame(0, 64, 48);
        assert_eq!(frame.pixels.len(), 64 * 48 * 3);
        // Top-left square is light, the next one dark
        assert_eq!(frame.pixels[0], 240);
        assert_eq!(frame.pixels[8 * 3], 181);
    }

    #[test]
    fn test_frame_tint_wraps_green_channel() {
        let frame = synthetic_board_frame(31, 16, 16);
        assert_eq!(frame.pixels[0], 240);
        assert_eq!(frame.pixels[1], 217u8.wrapping_add(31));
        assert_eq!(frame.pixels[2], 181);
        assert_eq!(synthetic_board_frame(32, 16, 16).pixels[1], 217);
    }

    #[test]
    fn test_slow_release_still_releases() {
        let mut camera = SyntheticCamera::new(8, 8);
        let probe = camera.probe();
        camera.faults().slow_release(Some(Duration::from_millis(5)));
        camera.acquire().unwrap();
        camera.release();
        assert_eq!(probe.held(), 0);
    }

    #[test]
    fn test_frames_differ() {
        let a = synthetic_board_frame(1, 16, 16);
        let b = synthetic_board_frame(2, 16, 16);
        assert_ne!(a.pixels, b.pixels);
    }

    #[test]
    fn test_probe_tracks_acquire_and_release() {
        let mut camera = SyntheticCamera::new(16, 16);
        let probe = camera.probe();

        camera.acquire().unwrap();
        camera.acquire().unwrap();
        assert_eq!(probe.held(), 1);
        assert_eq!(probe.acquisitions(), 1);

        camera.current_frame().unwrap();
        assert_eq!(probe.frames_read(), 1);

        camera.release();
        camera.release();
        assert_eq!(probe.held(), 0);
        assert_eq!(probe.releases(), 1);
        assert_eq!(probe.max_held(), 1);
    }

    #[test]
    fn test_injected_faults() {
        let mut camera = SyntheticCamera::new(16, 16);
        let faults = camera.faults();

        faults.deny_acquire(Some(DeviceError::PermissionDenied("blocked".to_string())));
        assert_eq!(
            camera.acquire().unwrap_err(),
            DeviceError::PermissionDenied("blocked".to_string())
        );
        faults.deny_acquire(None);
        camera.acquire().unwrap();

        faults.fail_reads(true);
        assert!(camera.current_frame().is_err());
        faults.fail_reads(false);
        assert!(camera.current_frame().is_ok());
    }
}
