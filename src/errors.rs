use std::time::Duration;
use thiserror::Error;

/// Capture device failures. Abort the running session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("capture device unavailable: {0}")]
    Unavailable(String),
    #[error("camera permission denied: {0}")]
    PermissionDenied(String),
    #[error("capture device failed: {0}")]
    Capture(String),
}

/// Streaming channel failures. Abort the running session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("failed to connect to {endpoint}: {reason}")]
    Connect { endpoint: String, reason: String },
    #[error("connection to {endpoint} timed out after {after:?}")]
    ConnectTimeout { endpoint: String, after: Duration },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("channel is closed")]
    Closed,
    #[error("failed to serialize outbound message: {0}")]
    Encode(String),
}

/// A streamed reply that could not be turned into a detection result.
///
/// Never surfaced to the user: the reply is logged and dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed reply ({len} bytes): {reason}")]
pub struct MalformedMessage {
    pub reason: String,
    pub len: usize,
}

impl MalformedMessage {
    pub fn new(reason: impl Into<String>, len: usize) -> Self {
        Self {
            reason: reason.into(),
            len,
        }
    }
}

/// One-shot request failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("request timed out after {after:?}")]
    Timeout { after: Duration },
    #[error("server rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("request failed: {0}")]
    Transport(String),
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl RequestError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, RequestError::Timeout { .. })
    }

    /// Message supplied by the server for a rejected request.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            RequestError::Rejected { message, .. } => Some(message),
            _ => None,
        }
    }
}

/// Local checks that fail before any network activity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreconditionError {
    #[error("no board position detected yet")]
    MissingBoard,
    #[error("no overlay in the displayed result")]
    MissingOverlay,
    #[error("invalid engine options: {0}")]
    EngineOptions(String),
    #[error("invalid image upload: {0}")]
    InvalidImage(String),
    #[error("invalid detector selection: {0}")]
    InvalidDetector(String),
}

#[derive(Debug, Error)]
pub enum BoardSightError {
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error(transparent)]
    Channel(#[from] ChannelError),
    #[error(transparent)]
    Malformed(#[from] MalformedMessage),
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error(transparent)]
    Precondition(#[from] PreconditionError),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BoardSightError>;

impl BoardSightError {
    /// Errors that end a streaming session rather than a single operation.
    pub fn aborts_session(&self) -> bool {
        matches!(self, BoardSightError::Device(_) | BoardSightError::Channel(_))
    }
}
