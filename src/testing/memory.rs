//! In-memory streaming service
//!
//! [`MemoryConnector`] hands out links whose far ends appear on the paired
//! [`MemoryServer`] as [`MemoryPeer`]s, so tests can read the frames a session
//! sends and push replies back.

use crate::errors::ChannelError;
use crate::transport::{Connector, InboundEvent, Link};
use futures::future::BoxFuture;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

const ENDPOINT: &str = "memory://detector/ws/stream";
const LINK_BUFFER: usize = 256;

/// A frame message as the service receives it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReceivedFrame {
    pub frame: String,
    pub backend: String,
}

#[derive(Default)]
struct Shared {
    refuse: AtomicBool,
    delay: Mutex<Option<Duration>>,
    connects: AtomicU64,
    max_open: AtomicUsize,
    /// Service-side senders of every link; a link counts as open until the
    /// client stops listening.
    links: Mutex<Vec<mpsc::Sender<InboundEvent>>>,
}

impl Shared {
    fn open_links(&self) -> usize {
        self.links
            .lock()
            .map(|links| links.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }
}

/// Client half of the in-memory service.
#[derive(Clone)]
pub struct MemoryConnector {
    shared: Arc<Shared>,
    accept_tx: mpsc::UnboundedSender<MemoryPeer>,
}

/// Service half: yields one [`MemoryPeer`] per accepted link.
pub struct MemoryServer {
    accept_rx: mpsc::UnboundedReceiver<MemoryPeer>,
}

impl MemoryConnector {
    pub fn new() -> (Self, MemoryServer) {
        let (accept_tx, accept_rx) = mpsc::unbounded_channel();
        (
            Self {
                shared: Arc::new(Shared::default()),
                accept_tx,
            },
            MemoryServer { accept_rx },
        )
    }

    /// Reject subsequent connection attempts.
    pub fn refuse_connections(&self, refuse: bool) {
        self.shared.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Delay subsequent connection attempts.
    pub fn set_connect_delay(&self, delay: Option<Duration>) {
        if let Ok(mut slot) = self.shared.delay.lock() {
            *slot = delay;
        }
    }

    /// Links whose client side is still listening
    pub fn open_links(&self) -> usize {
        self.shared.open_links()
    }

    /// Highest number of links open at the same time
    pub fn max_open_links(&self) -> usize {
        self.shared.max_open.load(Ordering::SeqCst)
    }

    /// Successful connections so far
    pub fn connects(&self) -> u64 {
        self.shared.connects.load(Ordering::SeqCst)
    }
}

impl Connector for MemoryConnector {
    fn endpoint(&self) -> &str {
        ENDPOINT
    }

    fn connect(&self) -> BoxFuture<'_, Result<Link, ChannelError>> {
        Box::pin(async move {
            let delay = self.shared.delay.lock().ok().and_then(|slot| *slot);
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if self.shared.refuse.load(Ordering::SeqCst) {
                return Err(ChannelError::Connect {
                    endpoint: ENDPOINT.to_string(),
                    reason: "connection refused".to_string(),
                });
            }

            let (frames_tx, frames_rx) = mpsc::channel(LINK_BUFFER);
            let (events_tx, events_rx) = mpsc::channel(LINK_BUFFER);

            let open = {
                let mut links = self.shared.links.lock().map_err(|_| ChannelError::Connect {
                    endpoint: ENDPOINT.to_string(),
                    reason: "connector state poisoned".to_string(),
                })?;
                links.retain(|tx| !tx.is_closed());
                links.push(events_tx.clone());
                links.len()
            };
            self.shared.max_open.fetch_max(open, Ordering::SeqCst);
            self.shared.connects.fetch_add(1, Ordering::SeqCst);

            let _ = self.accept_tx.send(MemoryPeer {
                frames: frames_rx,
                events: events_tx,
            });

            Ok(Link {
                outbound: frames_tx,
                inbound: events_rx,
            })
        })
    }
}

impl MemoryServer {
    /// Wait for the next link.
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        self.accept_rx.recv().await
    }

    /// Take a link if one was already opened.
    pub fn try_accept(&mut self) -> Option<MemoryPeer> {
        self.accept_rx.try_recv().ok()
    }
}

/// Service end of one link.
pub struct MemoryPeer {
    frames: mpsc::Receiver<String>,
    events: mpsc::Sender<InboundEvent>,
}

impl MemoryPeer {
    /// Next frame sent by the client, `None` once the client closed the link.
    pub async fn next_frame(&mut self) -> Option<ReceivedFrame> {
        let raw = self.frames.recv().await?;
        serde_json::from_str(&raw).ok()
    }

    /// Next frame, giving up after `wait`.
    pub async fn next_frame_within(&mut self, wait: Duration) -> Option<ReceivedFrame> {
        tokio::time::timeout(wait, self.next_frame()).await.ok().flatten()
    }

    /// Push a text reply. Returns false when the client stopped listening.
    pub async fn reply(&self, body: impl Into<String>) -> bool {
        self.events.send(InboundEvent::Text(body.into())).await.is_ok()
    }

    pub async fn fail(&self, reason: impl Into<String>) -> bool {
        self.events.send(InboundEvent::Error(reason.into())).await.is_ok()
    }

    pub async fn hang_up(&self) -> bool {
        self.events.send(InboundEvent::Closed).await.is_ok()
    }

    /// Whether the client closed its side.
    pub fn client_closed(&self) -> bool {
        self.events.is_closed()
    }
}
