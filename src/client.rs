//! One-shot requests to the detection service
//!
//! Image analysis, best-move queries and the health probe. These calls are
//! independent of any streaming session.

use crate::config::ServiceConfig;
use crate::errors::{BoardSightError, PreconditionError, RequestError};
use crate::protocol::{error_message, BestMoveBody, BestMovePayload, DetectionPayload, HealthPayload};
use crate::types::{AnalyzeMode, BestMove, DetectionResult, DetectorSelection, EngineOptions, ResultOrigin};
use reqwest::multipart::{Form, Part};
use std::path::Path;
use std::time::Duration;

/// An image ready to be uploaded for analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    file_name: String,
    mime: &'static str,
    bytes: Vec<u8>,
}

impl ImageUpload {
    /// Wrap encoded image bytes, rejecting anything that is not an image.
    pub fn from_bytes(file_name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, PreconditionError> {
        if bytes.is_empty() {
            return Err(PreconditionError::InvalidImage("file is empty".to_string()));
        }
        let format = image::guess_format(&bytes)
            .map_err(|_| PreconditionError::InvalidImage("unrecognized image format".to_string()))?;
        let mime = match format {
            image::ImageFormat::Png => "image/png",
            image::ImageFormat::Jpeg => "image/jpeg",
            image::ImageFormat::WebP => "image/webp",
            image::ImageFormat::Gif => "image/gif",
            image::ImageFormat::Bmp => "image/bmp",
            image::ImageFormat::Tiff => "image/tiff",
            other => {
                return Err(PreconditionError::InvalidImage(format!(
                    "unsupported image format {:?}",
                    other
                )))
            }
        };

        Ok(Self {
            file_name: file_name.into(),
            mime,
            bytes,
        })
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, BoardSightError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Self::from_bytes(file_name, bytes)?)
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn mime_type(&self) -> &str {
        self.mime
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// HTTP client for the detection service.
#[derive(Debug, Clone)]
pub struct RequestClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl RequestClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BoardSightError> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        reqwest::Url::parse(&base_url)
            .map_err(|e| BoardSightError::Config(format!("invalid service address '{}': {}", base_url, e)))?;

        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| BoardSightError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url,
            timeout,
        })
    }

    pub fn from_config(config: &ServiceConfig) -> Result<Self, BoardSightError> {
        Self::new(&config.base_url, config.request_timeout())
    }

    /// Same connection pool, different timeout.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Upload an image for detection.
    pub async fn analyze(
        &self,
        image: &ImageUpload,
        detector: &DetectorSelection,
        mode: AnalyzeMode,
    ) -> Result<DetectionResult, BoardSightError> {
        let path = match mode {
            AnalyzeMode::Detect => "api/detect",
            AnalyzeMode::DetectAndMove => "api/detect_and_move",
        };

        let part = Part::bytes(image.bytes.clone())
            .file_name(image.file_name.clone())
            .mime_str(image.mime)
            .map_err(|e| RequestError::Transport(format!("failed to build upload: {}", e)))?;
        let form = Form::new().part("file", part);

        log::info!(
            "Analyzing {} ({} bytes) with {} via /{}",
            image.file_name,
            image.len(),
            detector,
            path
        );
        let request = self
            .http
            .post(self.endpoint(path))
            .query(&[("backend", detector.as_str())])
            .multipart(form);

        let body = self.execute(request).await?;
        let payload: DetectionPayload =
            serde_json::from_str(&body).map_err(|e| RequestError::Decode(e.to_string()))?;
        let result = payload
            .into_result(ResultOrigin::Upload)
            .map_err(RequestError::Decode)?;
        Ok(result)
    }

    /// Ask the engine for the best move in `fen`.
    ///
    /// An empty board encoding or out-of-range options fail before any
    /// network activity.
    pub async fn compute_best_move(
        &self,
        fen: &str,
        options: &EngineOptions,
    ) -> Result<BestMove, BoardSightError> {
        let fen = fen.trim();
        if fen.is_empty() {
            return Err(PreconditionError::MissingBoard.into());
        }
        options.validate()?;

        log::info!(
            "Requesting best move (depth {}, {}ms) for {}",
            options.depth,
            options.time_ms,
            fen
        );
        let request = self
            .http
            .post(self.endpoint("api/best_move"))
            .json(&BestMoveBody::new(fen, options));

        let body = self.execute(request).await?;
        let payload: BestMovePayload =
            serde_json::from_str(&body).map_err(|e| RequestError::Decode(e.to_string()))?;
        let best = payload
            .into_best_move()
            .ok_or_else(|| RequestError::Decode("response carries no move".to_string()))?;
        Ok(best)
    }

    /// Probe `GET /health`.
    pub async fn health(&self) -> Result<bool, BoardSightError> {
        let body = self.execute(self.http.get(self.endpoint("health"))).await?;
        let payload: HealthPayload =
            serde_json::from_str(&body).map_err(|e| RequestError::Decode(e.to_string()))?;
        Ok(payload.status.eq_ignore_ascii_case("ok"))
    }

    /// Send a request and read the body of a successful response.
    async fn execute(&self, request: reqwest::RequestBuilder) -> Result<String, RequestError> {
        let timeout = self.timeout;
        let exchange = async {
            let resp = request
                .send()
                .await
                .map_err(|e| RequestError::Transport(e.to_string()))?;

            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                let message = error_message(&body).unwrap_or_else(|| {
                    format!(
                        "HTTP {} {}",
                        status.as_u16(),
                        status.canonical_reason().unwrap_or("error")
                    )
                });
                log::warn!("Service rejected request ({}): {}", status, message);
                return Err(RequestError::Rejected {
                    status: status.as_u16(),
                    message,
                });
            }

            resp.text()
                .await
                .map_err(|e| RequestError::Transport(e.to_string()))
        };

        match tokio::time::timeout(timeout, exchange).await {
            Ok(result) => result,
            Err(_) => {
                log::warn!("Request timed out after {:?}", timeout);
                Err(RequestError::Timeout { after: timeout })
            }
        }
    }
}
