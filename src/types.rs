//! Core data types shared by the streaming session and one-shot requests.

use crate::errors::PreconditionError;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Which backend recognition pipeline processes an image.
///
/// Names are case-insensitive and normalized to lowercase, matching what the
/// detection service expects in its `backend` parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DetectorSelection(String);

impl DetectorSelection {
    pub const LICHESS: &'static str = "lichess";
    pub const YOLO: &'static str = "yolo";

    pub fn new(name: &str) -> Result<Self, PreconditionError> {
        let normalized = name.trim().to_ascii_lowercase();
        if normalized.is_empty() {
            return Err(PreconditionError::InvalidDetector(
                "detector name is empty".to_string(),
            ));
        }
        if !normalized
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        {
            return Err(PreconditionError::InvalidDetector(format!(
                "unsupported characters in detector name '{}'",
                name
            )));
        }
        Ok(Self(normalized))
    }

    pub fn lichess() -> Self {
        Self(Self::LICHESS.to_string())
    }

    pub fn yolo() -> Self {
        Self(Self::YOLO.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for DetectorSelection {
    fn default() -> Self {
        Self::lichess()
    }
}

impl fmt::Display for DetectorSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DetectorSelection {
    type Err = PreconditionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for DetectorSelection {
    type Error = PreconditionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<DetectorSelection> for String {
    fn from(value: DetectorSelection) -> Self {
        value.0
    }
}

/// Engine parameters for a best-move query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineOptions {
    /// Search depth in plies
    pub depth: u32,
    /// Time budget in milliseconds
    pub time_ms: u64,
}

impl EngineOptions {
    pub const DEPTH_RANGE: std::ops::RangeInclusive<u32> = 1..=30;
    pub const TIME_RANGE_MS: std::ops::RangeInclusive<u64> = 100..=5000;

    pub fn new(depth: u32, time_ms: u64) -> Self {
        Self { depth, time_ms }
    }

    pub fn validate(&self) -> Result<(), PreconditionError> {
        if !Self::DEPTH_RANGE.contains(&self.depth) {
            return Err(PreconditionError::EngineOptions(format!(
                "depth {} outside {:?}",
                self.depth,
                Self::DEPTH_RANGE
            )));
        }
        if !Self::TIME_RANGE_MS.contains(&self.time_ms) {
            return Err(PreconditionError::EngineOptions(format!(
                "time budget {}ms outside {:?}",
                self.time_ms,
                Self::TIME_RANGE_MS
            )));
        }
        Ok(())
    }
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            depth: 12,
            time_ms: 800,
        }
    }
}

/// Base64-encoded annotated board image returned by the detector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Overlay(String);

impl Overlay {
    pub fn from_base64(data: impl Into<String>) -> Self {
        let data = data.into();
        // Some backends return a full data URL instead of bare base64.
        match data.split_once("base64,") {
            Some((header, payload)) if header.starts_with("data:") => Self(payload.to_string()),
            _ => Self(data),
        }
    }

    pub fn as_base64(&self) -> &str {
        &self.0
    }

    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        base64::engine::general_purpose::STANDARD.decode(self.0.as_bytes())
    }

    /// Write the decoded overlay image to disk.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let bytes = self
            .decode()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, bytes)
    }
}

/// Engine evaluation from the side to move.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveScore {
    /// Centipawns
    pub cp: Option<i32>,
    /// Moves to mate
    pub mate: Option<i32>,
}

/// Per-square recognition output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SquareDetection {
    pub square: String,
    #[serde(default)]
    pub bbox: Vec<f64>,
    #[serde(default)]
    pub piece: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// Where a detection result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultOrigin {
    Stream,
    Upload,
}

/// A complete, self-consistent recognition snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    /// Board encoding (FEN)
    pub fen: String,
    pub overlay: Option<Overlay>,
    /// Recommended move in UCI notation
    pub recommended_move: Option<String>,
    pub san: Option<String>,
    pub score: Option<MoveScore>,
    /// Detector confidence in [0, 1]
    pub confidence: Option<f64>,
    pub squares: Vec<SquareDetection>,
    pub origin: ResultOrigin,
    pub received_at: DateTime<Utc>,
}

/// Answer to a best-move query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BestMove {
    /// Move in UCI notation
    pub uci: String,
    pub san: Option<String>,
    pub score: Option<MoveScore>,
}

/// Which one-shot analysis endpoint an upload goes to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyzeMode {
    /// Detection only
    Detect,
    /// Detection followed by server-side move computation
    #[default]
    DetectAndMove,
}
