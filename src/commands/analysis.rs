use crate::client::ImageUpload;
use crate::types::{BestMove, DetectionResult, DetectorSelection, EngineOptions};
use crate::workbench::Workbench;
use tauri::{command, State};

/// Analyze an image file on disk
#[command]
pub async fn analyze_image(
    workbench: State<'_, Workbench>,
    path: String,
    detector: Option<String>,
) -> Result<DetectionResult, String> {
    let upload = ImageUpload::from_path(&path).map_err(|e| e.to_string())?;
    analyze(&workbench, upload, detector).await
}

/// Analyze image bytes supplied by the frontend
#[command]
pub async fn analyze_image_bytes(
    workbench: State<'_, Workbench>,
    file_name: String,
    bytes: Vec<u8>,
    detector: Option<String>,
) -> Result<DetectionResult, String> {
    let upload = ImageUpload::from_bytes(file_name, bytes).map_err(|e| e.to_string())?;
    analyze(&workbench, upload, detector).await
}

async fn analyze(
    workbench: &Workbench,
    upload: ImageUpload,
    detector: Option<String>,
) -> Result<DetectionResult, String> {
    let detector = detector
        .map(|name| DetectorSelection::new(&name))
        .transpose()
        .map_err(|e| e.to_string())?;
    workbench
        .analyze_upload(&upload, detector)
        .await
        .map_err(|e| e.to_string())
}

/// Best move for the displayed position
#[command]
pub async fn request_best_move(
    workbench: State<'_, Workbench>,
    depth: Option<u32>,
    time_ms: Option<u64>,
) -> Result<BestMove, String> {
    let defaults = workbench.config().engine.options();
    let options = EngineOptions::new(
        depth.unwrap_or(defaults.depth),
        time_ms.unwrap_or(defaults.time_ms),
    );
    workbench
        .request_best_move(Some(options))
        .await
        .map_err(|e| e.to_string())
}

#[command]
pub async fn save_overlay(workbench: State<'_, Workbench>, path: String) -> Result<(), String> {
    workbench.save_overlay(&path).map_err(|e| e.to_string())
}
