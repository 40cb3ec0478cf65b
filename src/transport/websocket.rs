use super::{Connector, InboundEvent, Link};
use crate::errors::ChannelError;
use futures::future::BoxFuture;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

const STREAM_PATH: &str = "ws/stream";
const INBOUND_BUFFER: usize = 32;

/// Streaming endpoint for a service base address.
///
/// `http://host:8000` becomes `ws://host:8000/ws/stream`, `https` maps to
/// `wss`. Any path on the base address is kept as a prefix.
pub fn stream_url(base_url: &str) -> Result<String, ChannelError> {
    let invalid = |reason: String| ChannelError::Connect {
        endpoint: base_url.to_string(),
        reason,
    };

    let mut url = reqwest::Url::parse(base_url.trim()).map_err(|e| invalid(e.to_string()))?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(invalid(format!("unsupported scheme '{}'", other))),
    };
    url.set_scheme(scheme)
        .map_err(|_| invalid(format!("cannot switch to {}", scheme)))?;

    let path = format!("{}/{}", url.path().trim_end_matches('/'), STREAM_PATH);
    url.set_path(&path);
    url.set_query(None);
    Ok(url.to_string())
}

/// Connects to the detection service over a WebSocket.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    url: String,
}

impl WebSocketConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn from_base_url(base_url: &str) -> Result<Self, ChannelError> {
        Ok(Self::new(stream_url(base_url)?))
    }
}

impl Connector for WebSocketConnector {
    fn endpoint(&self) -> &str {
        &self.url
    }

    fn connect(&self) -> BoxFuture<'_, Result<Link, ChannelError>> {
        Box::pin(async move {
            let (socket, _response) = tokio_tungstenite::connect_async(self.url.as_str())
                .await
                .map_err(|e| ChannelError::Connect {
                    endpoint: self.url.clone(),
                    reason: e.to_string(),
                })?;

            let (outbound_tx, outbound_rx) = mpsc::channel(1);
            let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_BUFFER);
            tokio::spawn(pump(socket, outbound_rx, inbound_tx, self.url.clone()));

            Ok(Link {
                outbound: outbound_tx,
                inbound: inbound_rx,
            })
        })
    }
}

/// Shuttle messages between the socket and the link until either side ends.
async fn pump(
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
    mut outbound: mpsc::Receiver<String>,
    inbound: mpsc::Sender<InboundEvent>,
    url: String,
) {
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            biased;

            message = outbound.recv() => match message {
                Some(text) => {
                    if let Err(e) = sink.send(Message::Text(text)).await {
                        let _ = inbound.send(InboundEvent::Error(e.to_string())).await;
                        break;
                    }
                }
                None => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if inbound.send(InboundEvent::Text(text)).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    let _ = inbound.send(InboundEvent::Closed).await;
                    break;
                }
                Some(Ok(Message::Binary(data))) => {
                    log::debug!("Ignoring {} byte binary message from {}", data.len(), url);
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    let _ = inbound.send(InboundEvent::Error(e.to_string())).await;
                    break;
                }
            },
            _ = inbound.closed() => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
        }
    }

    log::debug!("WebSocket pump for {} finished", url);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_url_from_base() {
        assert_eq!(
            stream_url("http://localhost:8000").unwrap(),
            "ws://localhost:8000/ws/stream"
        );
        assert_eq!(
            stream_url("https://chess.example.com/").unwrap(),
            "wss://chess.example.com/ws/stream"
        );
        assert_eq!(
            stream_url("http://10.0.0.2:9000/vision").unwrap(),
            "ws://10.0.0.2:9000/vision/ws/stream"
        );
    }

    #[test]
    fn test_stream_url_rejects_other_schemes() {
        assert!(stream_url("ftp://localhost").is_err());
        assert!(stream_url("not a url").is_err());
    }

    #[tokio::test]
    async fn test_connect_failure_is_channel_error() {
        // Port 9 (discard) is almost never listening on loopback.
        let connector = WebSocketConnector::new("ws://127.0.0.1:9/ws/stream");
        let err = connector.connect().await.unwrap_err();
        assert!(matches!(err, ChannelError::Connect { .. }));
    }
}
