//! Result reconciliation
//!
//! Streamed replies and one-shot answers both land here. Every update is
//! applied under a single lock and published as a whole [`ViewState`], so the
//! board encoding and the overlay shown to the user always come from the same
//! [`DetectionResult`].

use crate::status;
use crate::types::{BestMove, DetectionResult, Overlay};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// How streamed results interact with user-requested one-shot results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPolicy {
    /// Last applied wins, whatever its source.
    ArrivalOrder,
    /// Streamed results arriving within `hold` of an applied one-shot result
    /// are dropped, so an on-demand answer is not immediately overwritten.
    HoldAfterOneShot { hold: Duration },
}

impl Default for StreamPolicy {
    fn default() -> Self {
        StreamPolicy::ArrivalOrder
    }
}

/// Which kind of update last touched the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateSource {
    Stream,
    Upload,
    BestMove,
}

/// Outcome of offering an update to the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Applied,
    /// Dropped by [`StreamPolicy::HoldAfterOneShot`]
    Held,
    /// Best move computed for a position that is no longer displayed
    Stale,
}

/// What the user sees: the latest detection plus a status line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    pub detection: Option<DetectionResult>,
    /// Move shown next to the board. Starts as the detection's recommended
    /// move and is replaced by best-move answers.
    pub displayed_move: Option<String>,
    pub status: String,
    /// Incremented on every published change
    pub revision: u64,
    pub last_update: Option<UpdateSource>,
}

impl ViewState {
    fn initial() -> Self {
        Self {
            status: status::READY.to_string(),
            ..Self::default()
        }
    }

    pub fn board_encoding(&self) -> Option<&str> {
        self.detection.as_ref().map(|d| d.fen.as_str())
    }

    pub fn overlay(&self) -> Option<&Overlay> {
        self.detection.as_ref().and_then(|d| d.overlay.as_ref())
    }

    pub fn confidence(&self) -> Option<f64> {
        self.detection.as_ref().and_then(|d| d.confidence)
    }
}

struct PolicyState {
    policy: StreamPolicy,
    last_one_shot: Option<Instant>,
}

/// Shared handle to the view. Cheap to clone.
#[derive(Clone)]
pub struct ResultReconciler {
    policy: Arc<Mutex<PolicyState>>,
    view: Arc<watch::Sender<ViewState>>,
}

impl ResultReconciler {
    pub fn new(policy: StreamPolicy) -> Self {
        let (tx, _rx) = watch::channel(ViewState::initial());
        Self {
            policy: Arc::new(Mutex::new(PolicyState {
                policy,
                last_one_shot: None,
            })),
            view: Arc::new(tx),
        }
    }

    pub fn policy(&self) -> StreamPolicy {
        self.lock_policy().policy
    }

    /// Current view.
    pub fn snapshot(&self) -> ViewState {
        self.view.borrow().clone()
    }

    /// Observe every published view change.
    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.view.subscribe()
    }

    pub fn current_fen(&self) -> Option<String> {
        self.view.borrow().board_encoding().map(str::to_string)
    }

    /// Apply a result pushed over the streaming channel.
    pub fn apply_streamed(&self, result: DetectionResult) -> Applied {
        let guard = self.lock_policy();
        if let (StreamPolicy::HoldAfterOneShot { hold }, Some(at)) =
            (guard.policy, guard.last_one_shot)
        {
            if at.elapsed() < hold {
                log::debug!("Holding streamed result for {} behind one-shot answer", result.fen);
                return Applied::Held;
            }
        }

        self.replace_detection(result, UpdateSource::Stream, status::FRAME_RECEIVED);
        Applied::Applied
    }

    /// Apply the answer to an explicit image analysis request.
    pub fn apply_one_shot(&self, result: DetectionResult) -> Applied {
        let mut guard = self.lock_policy();
        guard.last_one_shot = Some(Instant::now());
        self.replace_detection(result, UpdateSource::Upload, status::IMAGE_PROCESSED);
        Applied::Applied
    }

    /// Apply a best move computed for `fen`.
    ///
    /// Only the displayed move changes. The move is discarded when the view
    /// no longer shows `fen`.
    pub fn apply_best_move(&self, fen: &str, best: &BestMove) -> Applied {
        let mut guard = self.lock_policy();
        let mut outcome = Applied::Applied;
        self.view.send_modify(|view| {
            view.revision += 1;
            if view.board_encoding() != Some(fen) {
                outcome = Applied::Stale;
                view.status = status::MOVE_STALE.to_string();
                return;
            }
            view.displayed_move = Some(best.uci.clone());
            view.status = status::MOVE_UPDATED.to_string();
            view.last_update = Some(UpdateSource::BestMove);
        });
        if outcome == Applied::Applied {
            guard.last_one_shot = Some(Instant::now());
        } else {
            log::warn!("Discarding best move {} computed for a stale position", best.uci);
        }
        outcome
    }

    pub fn set_status(&self, message: impl Into<String>) {
        let message = message.into();
        let _guard = self.lock_policy();
        self.view.send_modify(|view| {
            view.status = message;
            view.revision += 1;
        });
    }

    fn replace_detection(&self, result: DetectionResult, source: UpdateSource, line: &str) {
        self.view.send_modify(|view| {
            view.displayed_move = result.recommended_move.clone();
            view.detection = Some(result);
            view.status = line.to_string();
            view.last_update = Some(source);
            view.revision += 1;
        });
    }

    fn lock_policy(&self) -> std::sync::MutexGuard<'_, PolicyState> {
        self.policy.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for ResultReconciler {
    fn default() -> Self {
        Self::new(StreamPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResultOrigin;

    fn result(fen: &str, overlay: Option<&str>, mv: Option<&str>, origin: ResultOrigin) -> DetectionResult {
        DetectionResult {
            fen: fen.to_string(),
            overlay: overlay.map(Overlay::from_base64),
            recommended_move: mv.map(str::to_string),
            san: None,
            score: None,
            confidence: Some(0.5),
            squares: Vec::new(),
            origin,
            received_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_initial_view() {
        let reconciler = ResultReconciler::default();
        let view = reconciler.snapshot();
        assert_eq!(view.status, status::READY);
        assert!(view.board_encoding().is_none());
        assert!(view.overlay().is_none());
        assert_eq!(view.revision, 0);
    }

    #[test]
    fn test_arrival_order_last_wins() {
        let reconciler = ResultReconciler::new(StreamPolicy::ArrivalOrder);
        reconciler.apply_streamed(result("A", Some("AAA"), Some("e2e4"), ResultOrigin::Stream));
        reconciler.apply_one_shot(result("B", Some("BBB"), None, ResultOrigin::Upload));
        assert_eq!(
            reconciler.apply_streamed(result("C", Some("CCC"), Some("d2d4"), ResultOrigin::Stream)),
            Applied::Applied
        );

        let view = reconciler.snapshot();
        assert_eq!(view.board_encoding(), Some("C"));
        assert_eq!(view.overlay().unwrap().as_base64(), "CCC");
        assert_eq!(view.displayed_move.as_deref(), Some("d2d4"));
        assert_eq!(view.last_update, Some(UpdateSource::Stream));
        assert_eq!(view.revision, 3);
    }

    #[test]
    fn test_overlay_never_outlives_its_board() {
        let reconciler = ResultReconciler::default();
        reconciler.apply_streamed(result("A", Some("AAA"), None, ResultOrigin::Stream));
        reconciler.apply_streamed(result("B", None, None, ResultOrigin::Stream));

        let view = reconciler.snapshot();
        assert_eq!(view.board_encoding(), Some("B"));
        assert!(view.overlay().is_none());
    }

    #[test]
    fn test_hold_after_one_shot_drops_streamed_results() {
        let reconciler = ResultReconciler::new(StreamPolicy::HoldAfterOneShot {
            hold: Duration::from_secs(60),
        });
        reconciler.apply_streamed(result("A", None, None, ResultOrigin::Stream));
        reconciler.apply_one_shot(result("U", Some("UUU"), Some("g1f3"), ResultOrigin::Upload));

        assert_eq!(
            reconciler.apply_streamed(result("S", None, None, ResultOrigin::Stream)),
            Applied::Held
        );
        let view = reconciler.snapshot();
        assert_eq!(view.board_encoding(), Some("U"));
        assert_eq!(view.last_update, Some(UpdateSource::Upload));
    }

    #[test]
    fn test_hold_window_expires() {
        let reconciler = ResultReconciler::new(StreamPolicy::HoldAfterOneShot {
            hold: Duration::from_millis(10),
        });
        reconciler.apply_one_shot(result("U", None, None, ResultOrigin::Upload));
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(
            reconciler.apply_streamed(result("S", None, None, ResultOrigin::Stream)),
            Applied::Applied
        );
        assert_eq!(reconciler.current_fen().as_deref(), Some("S"));
    }

    #[test]
    fn test_best_move_only_touches_the_move() {
        let reconciler = ResultReconciler::default();
        reconciler.apply_one_shot(result("rnbq", Some("OVR"), Some("e2e4"), ResultOrigin::Upload));
        let before = reconciler.snapshot();

        let best = BestMove {
            uci: "g1f3".to_string(),
            san: Some("Nf3".to_string()),
            score: None,
        };
        assert_eq!(reconciler.apply_best_move("rnbq", &best), Applied::Applied);

        let after = reconciler.snapshot();
        assert_eq!(after.displayed_move.as_deref(), Some("g1f3"));
        assert_eq!(after.detection, before.detection);
        assert_eq!(after.status, status::MOVE_UPDATED);
    }

    #[test]
    fn test_best_move_for_old_position_is_stale() {
        let reconciler = ResultReconciler::default();
        reconciler.apply_streamed(result("new", None, Some("a2a3"), ResultOrigin::Stream));

        let best = BestMove {
            uci: "g1f3".to_string(),
            san: None,
            score: None,
        };
        assert_eq!(reconciler.apply_best_move("old", &best), Applied::Stale);
        let view = reconciler.snapshot();
        assert_eq!(view.displayed_move.as_deref(), Some("a2a3"));
        assert_eq!(view.status, status::MOVE_STALE);
    }

    #[tokio::test]
    async fn test_subscribers_see_whole_updates() {
        let reconciler = ResultReconciler::default();
        let mut rx = reconciler.subscribe();

        reconciler.apply_streamed(result("A", Some("AAA"), None, ResultOrigin::Stream));
        rx.changed().await.unwrap();
        let view = rx.borrow_and_update().clone();
        assert_eq!(view.board_encoding(), Some("A"));
        assert_eq!(view.overlay().unwrap().as_base64(), "AAA");
    }
}
