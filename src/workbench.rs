//! Application facade
//!
//! A [`Workbench`] owns one streaming session, one request client and the
//! shared view. One-shot operations write their answers and status lines
//! into the view here, so callers only ever read [`ViewState`].

use crate::capture::CaptureDevice;
use crate::client::{ImageUpload, RequestClient};
use crate::config::BoardSightConfig;
use crate::errors::{BoardSightError, PreconditionError};
use crate::reconciler::{Applied, ResultReconciler, ViewState};
use crate::session::{SessionController, SessionSettings, SessionState};
use crate::status;
use crate::transport::{Connector, WebSocketConnector};
use crate::types::{AnalyzeMode, BestMove, DetectionResult, DetectorSelection, EngineOptions};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

pub struct Workbench {
    config: BoardSightConfig,
    session: SessionController,
    client: RequestClient,
    reconciler: ResultReconciler,
}

impl Workbench {
    /// Workbench streaming over WebSocket to the configured service.
    pub fn new(config: BoardSightConfig, device: Box<dyn CaptureDevice>) -> Result<Self, BoardSightError> {
        let connector = WebSocketConnector::from_base_url(&config.service.base_url)?;
        Self::with_connector(config, device, Arc::new(connector))
    }

    pub fn with_connector(
        config: BoardSightConfig,
        device: Box<dyn CaptureDevice>,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, BoardSightError> {
        config.validate().map_err(BoardSightError::Config)?;

        let reconciler = ResultReconciler::new(config.reconcile.stream_policy()?);
        let client = RequestClient::from_config(&config.service)?;
        let session = SessionController::new(
            device,
            connector,
            reconciler.clone(),
            SessionSettings::from_config(&config)?,
        );

        Ok(Self {
            config,
            session,
            client,
            reconciler,
        })
    }

    pub fn config(&self) -> &BoardSightConfig {
        &self.config
    }

    pub fn client(&self) -> &RequestClient {
        &self.client
    }

    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.session.session_id()
    }

    pub fn view(&self) -> ViewState {
        self.reconciler.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.reconciler.subscribe()
    }

    fn detector_or_default(&self, detector: Option<DetectorSelection>) -> Result<DetectorSelection, BoardSightError> {
        match detector {
            Some(detector) => Ok(detector),
            None => self.config.service.detector(),
        }
    }

    /// Start live streaming, replacing any running session.
    pub async fn start_stream(&self, detector: Option<DetectorSelection>) -> Result<Uuid, BoardSightError> {
        let detector = self.detector_or_default(detector)?;
        self.session.start(detector).await
    }

    pub async fn stop_stream(&self) {
        self.session.stop().await;
    }

    /// Analyze an uploaded image and show the result.
    pub async fn analyze_upload(
        &self,
        upload: &ImageUpload,
        detector: Option<DetectorSelection>,
    ) -> Result<DetectionResult, BoardSightError> {
        self.analyze_with(upload, detector, AnalyzeMode::default()).await
    }

    pub async fn analyze_with(
        &self,
        upload: &ImageUpload,
        detector: Option<DetectorSelection>,
        mode: AnalyzeMode,
    ) -> Result<DetectionResult, BoardSightError> {
        let detector = self.detector_or_default(detector)?;
        self.reconciler.set_status(status::ANALYZING_IMAGE);

        match self.client.analyze(upload, &detector, mode).await {
            Ok(result) => {
                self.reconciler.apply_one_shot(result.clone());
                Ok(result)
            }
            Err(e) => {
                self.reconciler
                    .set_status(format!("{}: {}", status::IMAGE_FAILED, e));
                Err(e)
            }
        }
    }

    /// Compute the best move for the displayed position.
    ///
    /// Uses the configured engine defaults when `options` is `None`. The
    /// answer is discarded if the displayed position changed meanwhile.
    pub async fn request_best_move(&self, options: Option<EngineOptions>) -> Result<BestMove, BoardSightError> {
        let Some(fen) = self.reconciler.current_fen() else {
            self.reconciler.set_status(status::NO_FEN);
            return Err(PreconditionError::MissingBoard.into());
        };
        let options = options.unwrap_or_else(|| self.config.engine.options());

        self.reconciler.set_status(status::COMPUTING_MOVE);
        match self.client.compute_best_move(&fen, &options).await {
            Ok(best) => {
                if self.reconciler.apply_best_move(&fen, &best) == Applied::Stale {
                    log::info!("Best move {} arrived after the position changed", best.uci);
                }
                Ok(best)
            }
            Err(e) => {
                self.reconciler
                    .set_status(format!("{}: {}", status::MOVE_FAILED, e));
                Err(e)
            }
        }
    }

    /// Probe the detection service.
    pub async fn health(&self) -> Result<bool, BoardSightError> {
        self.client.health().await
    }

    /// Write the displayed overlay image to `path`.
    pub fn save_overlay<P: AsRef<Path>>(&self, path: P) -> Result<(), BoardSightError> {
        let view = self.reconciler.snapshot();
        if view.board_encoding().is_none() {
            return Err(PreconditionError::MissingBoard.into());
        }
        // Streamed replies often carry no overlay at all.
        let overlay = view.overlay().ok_or(PreconditionError::MissingOverlay)?;
        overlay.save(path.as_ref())?;
        log::info!("Saved overlay to {:?}", path.as_ref());
        Ok(())
    }
}
