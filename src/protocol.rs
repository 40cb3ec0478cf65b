//! Wire formats spoken with the detection service.
//!
//! The service answers streamed frames, uploads and best-move queries with
//! slightly different JSON shapes. Everything that describes a board is
//! normalized here into a [`DetectionResult`] so the rest of the crate never
//! sees the alternate field names.

use crate::errors::MalformedMessage;
use crate::types::{
    BestMove, DetectionResult, EngineOptions, MoveScore, Overlay, ResultOrigin, SquareDetection,
};
use serde::{Deserialize, Serialize};

/// Client → server message on the streaming channel.
#[derive(Debug, Serialize)]
pub struct StreamRequest<'a> {
    /// Data URL of the encoded frame
    pub frame: &'a str,
    /// Detector selection
    pub backend: &'a str,
}

/// Board-describing payload shared by streamed replies and analysis responses.
#[derive(Debug, Default, Deserialize)]
pub struct DetectionPayload {
    #[serde(default)]
    pub fen: Option<String>,
    #[serde(default)]
    pub overlay_image_base64: Option<String>,
    #[serde(default)]
    pub board_image_base64: Option<String>,
    #[serde(default)]
    pub best_move: Option<String>,
    #[serde(default)]
    pub uci: Option<String>,
    #[serde(default)]
    pub san: Option<String>,
    #[serde(default)]
    pub score: Option<MoveScore>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub squares: Vec<SquareDetection>,
}

impl DetectionPayload {
    /// Normalize into a detection result.
    ///
    /// `overlay_image_base64` wins over `board_image_base64` and `best_move`
    /// over `uci`; empty strings count as absent. Confidence is clamped to
    /// `[0, 1]`.
    pub fn into_result(self, origin: ResultOrigin) -> Result<DetectionResult, String> {
        let fen = non_empty(self.fen).ok_or_else(|| "missing 'fen'".to_string())?;

        let overlay = non_empty(self.overlay_image_base64)
            .or_else(|| non_empty(self.board_image_base64))
            .map(Overlay::from_base64);

        let recommended_move = non_empty(self.best_move).or_else(|| non_empty(self.uci));

        let confidence = self
            .confidence
            .filter(|c| c.is_finite())
            .map(|c| c.clamp(0.0, 1.0));

        Ok(DetectionResult {
            fen,
            overlay,
            recommended_move,
            san: non_empty(self.san),
            score: self.score,
            confidence,
            squares: self.squares,
            origin,
            received_at: chrono::Utc::now(),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Decode one text message received on the streaming channel.
pub fn decode_stream_reply(text: &str) -> Result<DetectionResult, MalformedMessage> {
    let payload: DetectionPayload = serde_json::from_str(text)
        .map_err(|e| MalformedMessage::new(e.to_string(), text.len()))?;
    payload
        .into_result(ResultOrigin::Stream)
        .map_err(|reason| MalformedMessage::new(reason, text.len()))
}

#[derive(Debug, Serialize)]
pub struct BestMoveBody<'a> {
    pub fen: &'a str,
    pub options: EngineOptionsBody,
}

#[derive(Debug, Serialize)]
pub struct EngineOptionsBody {
    pub depth: u32,
    pub time_ms: u64,
}

impl<'a> BestMoveBody<'a> {
    pub fn new(fen: &'a str, options: &EngineOptions) -> Self {
        Self {
            fen,
            options: EngineOptionsBody {
                depth: options.depth,
                time_ms: options.time_ms,
            },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct BestMovePayload {
    #[serde(default)]
    pub best_move: Option<String>,
    #[serde(default)]
    pub uci: Option<String>,
    #[serde(default)]
    pub san: Option<String>,
    #[serde(default)]
    pub score: Option<MoveScore>,
}

impl BestMovePayload {
    pub fn into_best_move(self) -> Option<BestMove> {
        let uci = non_empty(self.best_move).or_else(|| non_empty(self.uci))?;
        Some(BestMove {
            uci,
            san: non_empty(self.san),
            score: self.score,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct HealthPayload {
    pub status: String,
}

/// Extract a human-readable message from a non-success response body.
///
/// FastAPI-style `{"detail": "..."}` bodies yield the detail text; any other
/// non-empty body is returned verbatim.
pub fn error_message(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(serde_json::Value::String(detail)) = map.get("detail") {
            if !detail.trim().is_empty() {
                return Some(detail.trim().to_string());
            }
        }
    }
    Some(body.to_string())
}
