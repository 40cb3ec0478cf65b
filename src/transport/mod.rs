//! Streaming channel to the detection service
//!
//! A [`Connector`] opens a duplex text link; [`TransportChannel`] speaks the
//! frame/reply protocol over it. Production code uses the
//! [`WebSocketConnector`]; tests use the in-memory connector from
//! [`crate::testing`].

pub mod channel;
pub mod websocket;

pub use channel::TransportChannel;
pub use websocket::{stream_url, WebSocketConnector};

use crate::errors::ChannelError;
use futures::future::BoxFuture;
use tokio::sync::mpsc;

/// Something received from the far end of a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    Text(String),
    /// Transport-level failure; the link is unusable afterwards
    Error(String),
    /// The remote side closed the link
    Closed,
}

/// An open duplex link.
///
/// Dropping `outbound` asks the connector to close the link. Dropping or
/// closing `inbound` tells it nobody is listening anymore.
#[derive(Debug)]
pub struct Link {
    pub outbound: mpsc::Sender<String>,
    pub inbound: mpsc::Receiver<InboundEvent>,
}

/// Opens links to a fixed endpoint.
pub trait Connector: Send + Sync {
    /// Endpoint description used in logs and errors
    fn endpoint(&self) -> &str;

    fn connect(&self) -> BoxFuture<'_, Result<Link, ChannelError>>;
}
