#[cfg(test)]
mod error_tests {
    use boardsight::errors::{
        BoardSightError, ChannelError, DeviceError, MalformedMessage, PreconditionError,
        RequestError,
    };
    use boardsight::types::{DetectorSelection, EngineOptions};
    use std::error::Error;
    use std::time::Duration;

    #[test]
    fn test_session_aborting_errors() {
        let device: BoardSightError = DeviceError::Capture("sensor unplugged".to_string()).into();
        assert!(device.aborts_session());
        assert!(device.to_string().contains("sensor unplugged"));

        let channel: BoardSightError = ChannelError::ConnectTimeout {
            endpoint: "ws://localhost:8000/ws/stream".to_string(),
            after: Duration::from_secs(5),
        }
        .into();
        assert!(channel.aborts_session());
        assert!(channel.to_string().contains("ws://localhost:8000/ws/stream"));
    }

    #[test]
    fn test_operation_scoped_errors() {
        let errors: Vec<BoardSightError> = vec![
            RequestError::Timeout {
                after: Duration::from_secs(30),
            }
            .into(),
            RequestError::Rejected {
                status: 400,
                message: "Invalid image".to_string(),
            }
            .into(),
            PreconditionError::MissingBoard.into(),
            MalformedMessage::new("expected value", 8).into(),
            BoardSightError::Config("bad policy".to_string()),
        ];
        for err in errors {
            assert!(!err.aborts_session(), "{} should not end a session", err);
        }
    }

    #[test]
    fn test_malformed_message_display() {
        let err = MalformedMessage::new("missing 'fen'", 42);
        assert_eq!(err.to_string(), "malformed reply (42 bytes): missing 'fen'");
    }

    #[test]
    fn test_io_error_source_is_kept() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err: BoardSightError = io.into();
        assert!(err.to_string().contains("no such file"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_precondition_errors_from_input_validation() {
        let err = DetectorSelection::new("   ").unwrap_err();
        assert!(matches!(err, PreconditionError::InvalidDetector(_)));

        let err = EngineOptions::new(0, 800).validate().unwrap_err();
        assert!(matches!(err, PreconditionError::EngineOptions(_)));
    }

    #[test]
    fn test_errors_are_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<BoardSightError>();
        assert_send_sync::<RequestError>();
    }
}
