//! Property-based tests for the session lifecycle
//!
//! Arbitrary start/stop sequences never hold more than one device or one
//! channel, and the final stop releases both.
//!
//! Run with: cargo test --test session_props

use boardsight::reconciler::ResultReconciler;
use boardsight::session::{SessionController, SessionSettings, SessionState};
use boardsight::testing::{MemoryConnector, SyntheticCamera};
use boardsight::types::DetectorSelection;
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
enum Op {
    Start,
    Stop,
    /// Let the capture loop run for a few cycles
    Pause(u64),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Start),
        3 => Just(Op::Stop),
        1 => (1u64..15).prop_map(Op::Pause),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// INVARIANT: at most one device and one channel are open at any instant,
    /// and both are released after the final stop
    #[test]
    fn start_stop_sequences_hold_single_resources(ops in prop::collection::vec(op(), 1..12)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let camera = SyntheticCamera::new(16, 16);
            let probe = camera.probe();
            let (connector, _server) = MemoryConnector::new();
            let controller = SessionController::new(
                Box::new(camera),
                Arc::new(connector.clone()),
                ResultReconciler::default(),
                SessionSettings {
                    interval: Duration::from_millis(2),
                    ..SessionSettings::default()
                },
            );

            for op in ops {
                match op {
                    Op::Start => {
                        controller.start(DetectorSelection::lichess()).await.unwrap();
                        assert_eq!(controller.state(), SessionState::Streaming);
                    }
                    Op::Stop => {
                        controller.stop().await;
                        assert_eq!(controller.state(), SessionState::Idle);
                        assert_eq!(probe.held(), 0);
                        assert_eq!(connector.open_links(), 0);
                    }
                    Op::Pause(ms) => tokio::time::sleep(Duration::from_millis(ms)).await,
                }
                assert!(probe.held() <= 1);
                assert!(connector.open_links() <= 1);
            }

            controller.stop().await;
            assert_eq!(probe.held(), 0);
            assert_eq!(connector.open_links(), 0);
            assert!(probe.max_held() <= 1);
            assert!(connector.max_open_links() <= 1);
            assert_eq!(probe.acquisitions(), probe.releases());
        });
    }

    /// INVARIANT: frame sequence numbers assigned by the capture loop only
    /// increase
    #[test]
    fn capture_sequences_increase(samples in 1usize..20, width in 0u32..48, height in 0u32..48) {
        use boardsight::capture::{CaptureDevice, CaptureLoop, FrameEncoder};

        let mut camera = SyntheticCamera::new(width, height);
        camera.acquire().unwrap();
        let mut sampler = CaptureLoop::new(Duration::from_millis(600), FrameEncoder::default());

        let mut last = 0;
        for _ in 0..samples {
            let frame = sampler.sample(&mut camera).unwrap().unwrap();
            prop_assert!(frame.sequence > last);
            prop_assert!(frame.width > 0 && frame.height > 0);
            last = frame.sequence;
        }
    }
}
