use super::{Connector, InboundEvent};
use crate::capture::Frame;
use crate::errors::ChannelError;
use crate::protocol::{decode_stream_reply, StreamRequest};
use crate::types::{DetectionResult, DetectorSelection};
use std::time::Duration;
use tokio::sync::mpsc;

/// Frame/reply protocol over an open link.
///
/// Sends are fire-and-forget; replies arrive independently through
/// [`next_reply`](TransportChannel::next_reply).
pub struct TransportChannel {
    endpoint: String,
    detector: DetectorSelection,
    outbound: Option<mpsc::Sender<String>>,
    inbound: mpsc::Receiver<InboundEvent>,
    dropped_replies: u64,
}

impl TransportChannel {
    /// Open a channel for `detector`, giving up after `timeout`.
    pub async fn connect(
        connector: &dyn Connector,
        detector: DetectorSelection,
        timeout: Duration,
    ) -> Result<Self, ChannelError> {
        let endpoint = connector.endpoint().to_string();
        log::info!("Connecting to {} (detector {})", endpoint, detector);

        let link = match tokio::time::timeout(timeout, connector.connect()).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(ChannelError::ConnectTimeout {
                    endpoint,
                    after: timeout,
                })
            }
        };

        log::info!("Connected to {}", endpoint);
        Ok(Self {
            endpoint,
            detector,
            outbound: Some(link.outbound),
            inbound: link.inbound,
            dropped_replies: 0,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Detector the channel was opened for.
    pub fn detector(&self) -> &DetectorSelection {
        &self.detector
    }

    pub fn is_open(&self) -> bool {
        self.outbound.as_ref().map_or(false, |tx| !tx.is_closed())
    }

    /// Malformed replies seen so far.
    pub fn dropped_replies(&self) -> u64 {
        self.dropped_replies
    }

    /// Serialize and transmit one frame. No acknowledgement is awaited.
    pub async fn send(&self, frame: &Frame, detector: &DetectorSelection) -> Result<(), ChannelError> {
        let outbound = self.outbound.as_ref().ok_or(ChannelError::Closed)?;
        let data_url = frame.to_data_url();
        let message = serde_json::to_string(&StreamRequest {
            frame: &data_url,
            backend: detector.as_str(),
        })
        .map_err(|e| ChannelError::Encode(e.to_string()))?;

        outbound
            .send(message)
            .await
            .map_err(|_| ChannelError::Closed)?;
        log::debug!("Sent frame #{} to {}", frame.sequence, self.endpoint);
        Ok(())
    }

    /// Wait for the next well-formed reply.
    ///
    /// Malformed replies are logged and skipped. A transport error or a
    /// remote close is returned as an error; the channel is dead afterwards.
    /// Cancel-safe.
    pub async fn next_reply(&mut self) -> Result<DetectionResult, ChannelError> {
        loop {
            match self.inbound.recv().await {
                Some(InboundEvent::Text(text)) => match decode_stream_reply(&text) {
                    Ok(result) => return Ok(result),
                    Err(e) => {
                        self.dropped_replies += 1;
                        log::warn!("Dropping reply from {}: {}", self.endpoint, e);
                    }
                },
                Some(InboundEvent::Error(reason)) => return Err(ChannelError::Transport(reason)),
                Some(InboundEvent::Closed) | None => return Err(ChannelError::Closed),
            }
        }
    }

    /// Terminate the connection. Safe to call more than once.
    pub fn close(&mut self) {
        if self.outbound.take().is_some() {
            log::info!("Closing channel to {}", self.endpoint);
        }
        self.inbound.close();
    }
}

impl Drop for TransportChannel {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CapturedImage, FrameEncoder};
    use crate::testing::MemoryConnector;

    fn frame(sequence: u64) -> Frame {
        FrameEncoder::default()
            .encode(sequence, CapturedImage::blank(8, 8))
            .unwrap()
    }

    #[tokio::test]
    async fn test_send_serializes_frame_and_detector() {
        let (connector, mut server) = MemoryConnector::new();
        let channel = TransportChannel::connect(&connector, DetectorSelection::yolo(), Duration::from_secs(1))
            .await
            .unwrap();
        let mut peer = server.accept().await.unwrap();

        channel.send(&frame(1), channel.detector()).await.unwrap();
        let received = peer.next_frame().await.unwrap();
        assert_eq!(received.backend, "yolo");
        assert!(received.frame.starts_with("data:image/png;base64,"));
    }

    #[tokio::test]
    async fn test_malformed_reply_is_skipped() {
        let (connector, mut server) = MemoryConnector::new();
        let mut channel =
            TransportChannel::connect(&connector, DetectorSelection::lichess(), Duration::from_secs(1))
                .await
                .unwrap();
        let peer = server.accept().await.unwrap();

        peer.reply("{broken").await;
        peer.reply(r#"{"fen":"8/8/8/8/8/8/8/8 w - - 0 1"}"#).await;

        let result = channel.next_reply().await.unwrap();
        assert_eq!(result.fen, "8/8/8/8/8/8/8/8 w - - 0 1");
        assert_eq!(channel.dropped_replies(), 1);
    }

    #[tokio::test]
    async fn test_transport_error_and_remote_close() {
        let (connector, mut server) = MemoryConnector::new();
        let mut channel =
            TransportChannel::connect(&connector, DetectorSelection::lichess(), Duration::from_secs(1))
                .await
                .unwrap();
        let peer = server.accept().await.unwrap();
        peer.fail("connection reset").await;
        assert_eq!(
            channel.next_reply().await.unwrap_err(),
            ChannelError::Transport("connection reset".to_string())
        );

        let mut channel =
            TransportChannel::connect(&connector, DetectorSelection::lichess(), Duration::from_secs(1))
                .await
                .unwrap();
        let peer = server.accept().await.unwrap();
        peer.hang_up().await;
        assert_eq!(channel.next_reply().await.unwrap_err(), ChannelError::Closed);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (connector, mut server) = MemoryConnector::new();
        let mut channel =
            TransportChannel::connect(&connector, DetectorSelection::lichess(), Duration::from_secs(1))
                .await
                .unwrap();
        let _peer = server.accept().await.unwrap();
        assert!(channel.is_open());
        assert_eq!(connector.open_links(), 1);

        channel.close();
        channel.close();
        assert!(!channel.is_open());
        assert_eq!(connector.open_links(), 0);
        assert_eq!(
            channel.send(&frame(1), &DetectorSelection::lichess()).await.unwrap_err(),
            ChannelError::Closed
        );
    }

    #[tokio::test]
    async fn test_connect_refused_and_timeout() {
        let (connector, _server) = MemoryConnector::new();
        connector.refuse_connections(true);
        let err = TransportChannel::connect(&connector, DetectorSelection::lichess(), Duration::from_secs(1))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ChannelError::Connect { .. }));

        connector.refuse_connections(false);
        connector.set_connect_delay(Some(Duration::from_secs(5)));
        let err = TransportChannel::connect(&connector, DetectorSelection::lichess(), Duration::from_millis(20))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ChannelError::ConnectTimeout { .. }));
    }
}
