//! Status lines shown next to the board.

pub const READY: &str = "Ready";
pub const STARTING_CAMERA: &str = "Starting camera...";
pub const CAMERA_UNAVAILABLE: &str = "Could not access the camera";
pub const CONNECTING: &str = "Connecting to detector...";
pub const CHANNEL_FAILED: &str = "Could not connect to the detector";
pub const STREAMING: &str = "Streaming";
pub const FRAME_RECEIVED: &str = "Frame received";
pub const CHANNEL_ERROR: &str = "WebSocket error";
pub const CAMERA_ERROR: &str = "Camera error";
pub const STOPPED: &str = "Stopped";
pub const ANALYZING_IMAGE: &str = "Analyzing image...";
pub const IMAGE_PROCESSED: &str = "Image processed";
pub const IMAGE_FAILED: &str = "Error processing image";
pub const NO_FEN: &str = "No FEN available";
pub const COMPUTING_MOVE: &str = "Computing best move...";
pub const MOVE_UPDATED: &str = "Best move updated";
pub const MOVE_FAILED: &str = "Error computing best move";
pub const MOVE_STALE: &str = "Position changed, best move discarded";
