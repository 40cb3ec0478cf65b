use crate::config::BoardSightConfig;
use crate::workbench::Workbench;
use tauri::{command, State};

/// Configuration the workbench was built with
#[command]
pub async fn get_config(workbench: State<'_, Workbench>) -> Result<BoardSightConfig, String> {
    Ok(workbench.config().clone())
}

/// Probe the detection service
#[command]
pub async fn check_service_health(workbench: State<'_, Workbench>) -> Result<bool, String> {
    workbench.health().await.map_err(|e| e.to_string())
}
