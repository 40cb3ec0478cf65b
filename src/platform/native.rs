use crate::capture::{CaptureDevice, CapturedImage};
use crate::errors::DeviceError;
use nokhwa::{
    pixel_format::RgbFormat,
    utils::{CameraIndex, RequestedFormat, RequestedFormatType},
    CallbackCamera,
};

/// Physical camera opened through nokhwa.
pub struct NativeCamera {
    index: u32,
    name: String,
    camera: Option<CallbackCamera>,
}

impl NativeCamera {
    pub fn new(index: u32) -> Self {
        Self {
            index,
            name: format!("camera-{}", index),
            camera: None,
        }
    }
}

fn classify(context: &str, error: nokhwa::NokhwaError) -> DeviceError {
    let message = format!("{}: {}", context, error);
    if message.to_ascii_lowercase().contains("permission") {
        DeviceError::PermissionDenied(message)
    } else {
        DeviceError::Unavailable(message)
    }
}

impl CaptureDevice for NativeCamera {
    fn name(&self) -> &str {
        &self.name
    }

    fn acquire(&mut self) -> Result<(), DeviceError> {
        if self.camera.is_some() {
            return Ok(());
        }

        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
        let mut camera = CallbackCamera::new(CameraIndex::Index(self.index), requested, |_| {})
            .map_err(|e| classify("Failed to initialize camera", e))?;
        camera
            .open_stream()
            .map_err(|e| classify("Failed to start stream", e))?;

        if let Ok(info) = camera.info() {
            self.name = info.human_name();
        }
        log::info!("Opened camera {} ({})", self.index, self.name);
        self.camera = Some(camera);
        Ok(())
    }

    fn current_frame(&mut self) -> Result<CapturedImage, DeviceError> {
        let camera = self
            .camera
            .as_mut()
            .ok_or_else(|| DeviceError::Capture(format!("{} is not acquired", self.name)))?;

        let buffer = camera
            .poll_frame()
            .map_err(|e| DeviceError::Capture(format!("Failed to capture frame: {}", e)))?;
        let decoded = buffer
            .decode_image::<RgbFormat>()
            .map_err(|e| DeviceError::Capture(format!("Failed to decode frame: {}", e)))?;

        Ok(CapturedImage::new(
            decoded.width(),
            decoded.height(),
            decoded.into_raw(),
        ))
    }

    fn release(&mut self) {
        if let Some(mut camera) = self.camera.take() {
            if let Err(e) = camera.stop_stream() {
                log::warn!("Failed to stop camera {}: {}", self.index, e);
            }
            log::info!("Released camera {}", self.index);
        }
    }

    fn is_acquired(&self) -> bool {
        self.camera.is_some()
    }
}

impl Drop for NativeCamera {
    fn drop(&mut self) {
        self.release();
    }
}

// nokhwa backends are not marked Send; access is serialized by the session.
unsafe impl Send for NativeCamera {}
