//! BoardSight: live chessboard recognition client
//!
//! Point a camera at a physical board (or upload a photo) and get back the
//! recognized position as FEN, an annotated overlay and a recommended move
//! from a remote detection service.
//!
//! # Features
//! - Streaming session: camera sampling at a fixed cadence over a WebSocket
//! - One-shot image analysis and best-move queries over HTTP
//! - A single reconciled view merging streamed and on-demand results
//! - Synthetic camera and in-memory service for offline testing
//!
//! # Usage
//! ```rust,no_run
//! use boardsight::config::BoardSightConfig;
//! use boardsight::testing::SyntheticCamera;
//! use boardsight::workbench::Workbench;
//!
//! # async fn run() -> boardsight::errors::Result<()> {
//! let config = BoardSightConfig::load_or_default();
//! let bench = Workbench::new(config, Box::new(SyntheticCamera::new(640, 480)))?;
//! bench.start_stream(None).await?;
//! println!("{:?}", bench.view().board_encoding());
//! bench.stop_stream().await;
//! # Ok(())
//! # }
//! ```
//!
//! With the `tauri-plugin` feature, register the commands in a Tauri app:
//! ```rust,ignore
//! fn main() {
//!     let bench = boardsight::workbench::Workbench::new(config, device).unwrap();
//!     tauri::Builder::default()
//!         .plugin(boardsight::init(bench))
//!         .run(tauri::generate_context!())
//!         .expect("error while running tauri application");
//! }
//! ```
pub mod capture;
pub mod client;
pub mod config;
pub mod errors;
pub mod platform;
pub mod protocol;
pub mod reconciler;
pub mod session;
pub mod status;
pub mod transport;
pub mod types;
pub mod workbench;

#[cfg(feature = "tauri-plugin")]
pub mod commands;

// Testing utilities - synthetic camera and in-memory service
pub mod testing;

// Re-exports for convenience
pub use client::{ImageUpload, RequestClient};
pub use config::BoardSightConfig;
pub use errors::BoardSightError;
pub use reconciler::{ResultReconciler, StreamPolicy, ViewState};
pub use session::{SessionController, SessionState};
pub use types::{AnalyzeMode, BestMove, DetectionResult, DetectorSelection, EngineOptions};
pub use workbench::Workbench;

#[cfg(feature = "tauri-plugin")]
use tauri::{
    plugin::{Builder, TauriPlugin},
    Manager, Runtime,
};

/// Initialize the BoardSight plugin around `workbench`
#[cfg(feature = "tauri-plugin")]
pub fn init<R: Runtime>(workbench: Workbench) -> TauriPlugin<R> {
    Builder::new("boardsight")
        .invoke_handler(tauri::generate_handler![
            // Streaming session
            commands::session::start_stream,
            commands::session::stop_stream,
            commands::session::get_session_state,
            commands::session::get_view,
            // One-shot analysis
            commands::analysis::analyze_image,
            commands::analysis::analyze_image_bytes,
            commands::analysis::request_best_move,
            commands::analysis::save_overlay,
            // Configuration
            commands::config::get_config,
            commands::config::check_service_health,
        ])
        .setup(move |app, _api| {
            app.manage(workbench);
            Ok(())
        })
        .build()
}

/// Initialize logging
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "boardsight=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get crate information
pub fn get_info() -> CrateInfo {
    CrateInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: DESCRIPTION.to_string(),
    }
}

/// Crate information structure
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CrateInfo {
    pub name: String,
    pub version: String,
    pub description: String,
}
