use super::{SessionShared, SessionState};
use crate::capture::{CaptureDevice, CaptureLoop};
use crate::errors::BoardSightError;
use crate::reconciler::ResultReconciler;
use crate::status;
use crate::transport::TransportChannel;
use tokio::sync::oneshot;
use tokio::time::Instant;
use uuid::Uuid;

/// What a finished driver hands back to the controller.
pub(crate) struct DriverOutcome {
    pub device: Box<dyn CaptureDevice>,
    pub failure: Option<BoardSightError>,
}

pub(crate) struct Driver {
    pub id: Uuid,
    pub device: Box<dyn CaptureDevice>,
    pub channel: TransportChannel,
    pub sampler: CaptureLoop,
    pub reconciler: ResultReconciler,
    pub shared: std::sync::Arc<SessionShared>,
}

enum Exit {
    Stopped,
    Failed(BoardSightError),
}

impl Driver {
    /// Run the capture loop and the reply handler until stopped or failed.
    ///
    /// Device and channel are always closed before this returns.
    pub async fn run(mut self, mut stop: oneshot::Receiver<()>) -> DriverOutcome {
        log::info!("Session {} streaming to {}", self.id, self.channel.endpoint());

        let detector = self.channel.detector().clone();
        let tick = tokio::time::sleep(std::time::Duration::ZERO);
        tokio::pin!(tick);

        let exit = loop {
            tokio::select! {
                biased;

                _ = &mut stop => break Exit::Stopped,

                reply = self.channel.next_reply() => match reply {
                    Ok(result) => {
                        log::debug!("Session {} applying reply for {}", self.id, result.fen);
                        self.reconciler.apply_streamed(result);
                    }
                    Err(e) => break Exit::Failed(e.into()),
                },

                _ = &mut tick => {
                    if !self.channel.is_open() {
                        log::debug!("Session {} channel unavailable, skipping cycle", self.id);
                    } else {
                        match self.sampler.sample(self.device.as_mut()) {
                            Ok(Some(frame)) => {
                                let sent = tokio::select! {
                                    biased;
                                    _ = &mut stop => break Exit::Stopped,
                                    sent = self.channel.send(&frame, &detector) => sent,
                                };
                                if let Err(e) = sent {
                                    log::warn!("Session {} failed to send frame #{}: {}", self.id, frame.sequence, e);
                                }
                            }
                            Ok(None) => {}
                            Err(e) => break Exit::Failed(e.into()),
                        }
                    }
                    tick.as_mut().reset(Instant::now() + self.sampler.interval());
                }
            }
        };

        if let Exit::Failed(e) = &exit {
            log::error!("Session {} aborted: {}", self.id, e);
            self.shared.set_state(SessionState::Stopping);
        }
        self.channel.close();
        self.device.release();

        let failure = match exit {
            Exit::Stopped => {
                log::info!("Session {} stopped after {} frames", self.id, self.sampler.last_sequence());
                None
            }
            Exit::Failed(e) => {
                let line = match &e {
                    BoardSightError::Device(_) => status::CAMERA_ERROR,
                    _ => status::CHANNEL_ERROR,
                };
                self.reconciler.set_status(format!("{}: {}", line, e));
                self.shared.set(SessionState::Idle, None);
                Some(e)
            }
        };

        DriverOutcome {
            device: self.device,
            failure,
        }
    }
}
