//! Streaming session lifecycle
//!
//! [`SessionController`] ties device acquisition, the streaming channel and
//! the capture loop together. At most one session is live at a time; a
//! running session is driven by a spawned task that owns the device and the
//! channel and hands the device back when it ends.

mod driver;

use crate::capture::{CaptureDevice, CaptureLoop, FrameEncoder};
use crate::config::BoardSightConfig;
use crate::errors::{BoardSightError, DeviceError};
use crate::reconciler::ResultReconciler;
use crate::status;
use crate::transport::{Connector, TransportChannel};
use crate::types::DetectorSelection;
use driver::{Driver, DriverOutcome};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Acquiring,
    Streaming,
    Stopping,
}

/// Timing and encoding parameters for new sessions.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub interval: Duration,
    pub encoder: FrameEncoder,
    pub connect_timeout: Duration,
}

impl SessionSettings {
    pub fn from_config(config: &BoardSightConfig) -> Result<Self, BoardSightError> {
        Ok(Self {
            interval: config.capture.interval(),
            encoder: FrameEncoder::from_config(&config.capture)?,
            connect_timeout: config.service.connect_timeout(),
        })
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(600),
            encoder: FrameEncoder::default(),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// State readable without taking the lifecycle lock.
#[derive(Debug)]
pub(crate) struct SessionShared {
    inner: Mutex<(SessionState, Option<Uuid>)>,
}

impl SessionShared {
    fn new() -> Self {
        Self {
            inner: Mutex::new((SessionState::Idle, None)),
        }
    }

    pub(crate) fn set(&self, state: SessionState, id: Option<Uuid>) {
        let mut guard = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        *guard = (state, id);
    }

    fn set_state(&self, state: SessionState) {
        let mut guard = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        guard.0 = state;
    }

    fn get(&self) -> (SessionState, Option<Uuid>) {
        *self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }
}

struct RunningSession {
    id: Uuid,
    stop_tx: oneshot::Sender<()>,
    handle: JoinHandle<DriverOutcome>,
}

struct Lifecycle {
    /// Present whenever no driver task owns the device
    device: Option<Box<dyn CaptureDevice>>,
    running: Option<RunningSession>,
}

pub struct SessionController {
    lifecycle: tokio::sync::Mutex<Lifecycle>,
    shared: Arc<SessionShared>,
    connector: Arc<dyn Connector>,
    reconciler: ResultReconciler,
    settings: SessionSettings,
}

impl SessionController {
    pub fn new(
        device: Box<dyn CaptureDevice>,
        connector: Arc<dyn Connector>,
        reconciler: ResultReconciler,
        settings: SessionSettings,
    ) -> Self {
        Self {
            lifecycle: tokio::sync::Mutex::new(Lifecycle {
                device: Some(device),
                running: None,
            }),
            shared: Arc::new(SessionShared::new()),
            connector,
            reconciler,
            settings,
        }
    }

    pub fn state(&self) -> SessionState {
        self.shared.get().0
    }

    /// Identifier of the live session, if any.
    pub fn session_id(&self) -> Option<Uuid> {
        self.shared.get().1
    }

    pub fn is_streaming(&self) -> bool {
        self.state() == SessionState::Streaming
    }

    pub fn reconciler(&self) -> &ResultReconciler {
        &self.reconciler
    }

    /// Start streaming with `detector`.
    ///
    /// A live session is stopped first and its resources released before
    /// new ones are acquired. On failure the controller is back to Idle with
    /// nothing held.
    pub async fn start(&self, detector: DetectorSelection) -> Result<Uuid, BoardSightError> {
        let mut life = self.lifecycle.lock().await;
        if self.shutdown(&mut life).await {
            log::info!("Replacing running session");
        }

        let mut device = life
            .device
            .take()
            .ok_or_else(|| DeviceError::Unavailable("capture device was lost".to_string()))?;

        let id = Uuid::new_v4();
        self.shared.set(SessionState::Acquiring, Some(id));
        self.reconciler.set_status(status::STARTING_CAMERA);
        log::info!("Session {} acquiring {}", id, device.name());

        if let Err(e) = device.acquire() {
            log::warn!("Session {} could not acquire {}: {}", id, device.name(), e);
            life.device = Some(device);
            self.shared.set(SessionState::Idle, None);
            self.reconciler
                .set_status(format!("{}: {}", status::CAMERA_UNAVAILABLE, e));
            return Err(e.into());
        }

        self.reconciler.set_status(status::CONNECTING);
        let channel = match TransportChannel::connect(
            self.connector.as_ref(),
            detector,
            self.settings.connect_timeout,
        )
        .await
        {
            Ok(channel) => channel,
            Err(e) => {
                log::warn!("Session {} could not open channel: {}", id, e);
                device.release();
                life.device = Some(device);
                self.shared.set(SessionState::Idle, None);
                self.reconciler
                    .set_status(format!("{}: {}", status::CHANNEL_FAILED, e));
                return Err(e.into());
            }
        };

        let (stop_tx, stop_rx) = oneshot::channel();
        let driver = Driver {
            id,
            device,
            channel,
            sampler: CaptureLoop::new(self.settings.interval, self.settings.encoder.clone()),
            reconciler: self.reconciler.clone(),
            shared: Arc::clone(&self.shared),
        };

        self.shared.set(SessionState::Streaming, Some(id));
        self.reconciler.set_status(status::STREAMING);
        let handle = tokio::spawn(driver.run(stop_rx));
        life.running = Some(RunningSession {
            id,
            stop_tx,
            handle,
        });

        Ok(id)
    }

    /// Stop the live session, if any.
    ///
    /// When this resolves the capture loop has halted, the channel is closed
    /// and the device released. Calling it while Idle does nothing.
    pub async fn stop(&self) {
        let mut life = self.lifecycle.lock().await;
        if self.shutdown(&mut life).await {
            self.reconciler.set_status(status::STOPPED);
        }
    }

    /// Tear down the running session and reclaim the device.
    ///
    /// Returns true when a live session was stopped, false when there was
    /// nothing running or the session had already ended by itself.
    async fn shutdown(&self, life: &mut Lifecycle) -> bool {
        let Some(running) = life.running.take() else {
            return false;
        };

        // A driver that failed on its own is already tearing down or Idle.
        let was_live = self.state() == SessionState::Streaming && !running.handle.is_finished();
        if was_live {
            self.shared.set_state(SessionState::Stopping);
            log::info!("Stopping session {}", running.id);
        }
        let _ = running.stop_tx.send(());

        match running.handle.await {
            Ok(outcome) => {
                if let Some(failure) = outcome.failure {
                    log::debug!("Reaped session {} (ended with: {})", running.id, failure);
                }
                life.device = Some(outcome.device);
            }
            Err(e) => {
                log::error!("Session {} task failed, device lost: {}", running.id, e);
            }
        }

        self.shared.set(SessionState::Idle, None);
        was_live
    }
}
