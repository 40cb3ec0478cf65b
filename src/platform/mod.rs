//! Physical capture devices
//!
//! Native cameras are only available with the `native-camera` feature.

#[cfg(feature = "native-camera")]
pub mod native;

#[cfg(feature = "native-camera")]
pub use native::NativeCamera;

use crate::capture::CaptureDevice;
use crate::errors::DeviceError;

/// Open the camera at `index`.
#[cfg(feature = "native-camera")]
pub fn open_camera(index: u32) -> Result<Box<dyn CaptureDevice>, DeviceError> {
    Ok(Box::new(NativeCamera::new(index)))
}

/// Open the camera at `index`.
#[cfg(not(feature = "native-camera"))]
pub fn open_camera(index: u32) -> Result<Box<dyn CaptureDevice>, DeviceError> {
    Err(DeviceError::Unavailable(format!(
        "camera {} requested but built without the native-camera feature",
        index
    )))
}
