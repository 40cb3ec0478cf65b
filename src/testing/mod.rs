//! Testing utilities for BoardSight
//!
//! Offline stand-ins for the camera and the detection service's streaming
//! endpoint, usable from unit tests, integration tests and demos.

pub mod memory;
pub mod synthetic;

pub use memory::{MemoryConnector, MemoryPeer, MemoryServer, ReceivedFrame};
pub use synthetic::{synthetic_board_frame, DeviceFaults, DeviceProbe, SyntheticCamera};
