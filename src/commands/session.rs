use crate::reconciler::ViewState;
use crate::session::SessionState;
use crate::types::DetectorSelection;
use crate::workbench::Workbench;
use tauri::{command, State};

fn parse_detector(detector: Option<String>) -> Result<Option<DetectorSelection>, String> {
    detector
        .map(|name| DetectorSelection::new(&name).map_err(|e| e.to_string()))
        .transpose()
}

/// Start live streaming, returning the session id
#[command]
pub async fn start_stream(
    workbench: State<'_, Workbench>,
    detector: Option<String>,
) -> Result<String, String> {
    let detector = parse_detector(detector)?;
    let id = workbench
        .start_stream(detector)
        .await
        .map_err(|e| e.to_string())?;
    Ok(id.to_string())
}

#[command]
pub async fn stop_stream(workbench: State<'_, Workbench>) -> Result<(), String> {
    workbench.stop_stream().await;
    Ok(())
}

#[command]
pub async fn get_session_state(workbench: State<'_, Workbench>) -> Result<SessionState, String> {
    Ok(workbench.session_state())
}

/// Latest reconciled view
#[command]
pub async fn get_view(workbench: State<'_, Workbench>) -> Result<ViewState, String> {
    Ok(workbench.view())
}
