//! Moves events between a local agent and a remote counterpart.
//!
//! A [`TransportBridge`] is an [`EventListener`]: registered on an agent it
//! forwards every fanned-out event, encoded with [`crate::wire`], to the
//! remote side. Messages arriving from the remote side are decoded and
//! ingested into a target listener, normally an agent's ingress.

mod channel;
mod udp;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    event::{Event, EventListener, EventPayload},
    wire::{self, WireError},
};

pub use channel::ChannelTransport;
pub use udp::UdpTransport;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Wire error: {0}")]
    Wire(#[from] WireError),
    #[error("transport closed")]
    Closed,
    #[error("received non UTF-8 message")]
    InvalidUtf8,
}

pub type TransportResult<T> = Result<T, TransportError>;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Human readable address of the remote side.
    fn peer(&self) -> String;

    async fn send(&self, message: String) -> TransportResult<()>;

    /// Next message, or `None` once the remote side is gone.
    async fn recv(&self) -> TransportResult<Option<String>>;
}

/// Pumps events between a local listener and a [`Transport`].
pub struct TransportBridge {
    outbound: mpsc::UnboundedSender<Event>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl TransportBridge {
    /// Starts the pump tasks. Must be called within a tokio runtime.
    /// `inbound` receives a `Connected` event first and a `Disconnected`
    /// event when the transport closes.
    pub fn spawn(transport: Arc<dyn Transport>, inbound: Arc<dyn EventListener>) -> Arc<Self> {
        let (outbound, mut pending) = mpsc::unbounded_channel::<Event>();
        let peer = transport.peer();

        let sender = transport.clone();
        let send_task = tokio::spawn(async move {
            while let Some(event) = pending.recv().await {
                let message = match wire::encode_string(&event) {
                    Ok(message) => message,
                    Err(e) => {
                        warn!(event_type = %event.event_type(), "Event not sent: {}", e);
                        continue;
                    }
                };
                if let Err(e) = sender.send(message).await {
                    warn!(peer = %sender.peer(), "Send failed: {}", e);
                }
            }
        });

        let receiver = transport;
        let recv_task = tokio::spawn(async move {
            inbound.on(&Event::new(EventPayload::Connected { peer: peer.clone() }));
            info!(%peer, "Transport connected");
            loop {
                match receiver.recv().await {
                    Ok(Some(message)) => match wire::decode_str(&message) {
                        Ok(event) => {
                            debug!(%peer, event_type = %event.event_type(), "Received");
                            inbound.on(&event);
                        }
                        Err(e) => warn!(%peer, "Dropped undecodable message: {}", e),
                    },
                    Ok(None) => break,
                    Err(e) => {
                        warn!(%peer, "Receive failed: {}", e);
                        break;
                    }
                }
            }
            inbound.on(&Event::new(EventPayload::Disconnected { peer: peer.clone() }));
            info!(%peer, "Transport disconnected");
        });

        Arc::new(Self {
            outbound,
            tasks: Mutex::new(vec![send_task, recv_task]),
        })
    }

    /// Stops both pump tasks.
    pub fn close(&self) {
        if let Ok(mut tasks) = self.tasks.lock() {
            for task in tasks.drain(..) {
                task.abort();
            }
        }
    }
}

impl EventListener for TransportBridge {
    fn on(&self, event: &Event) {
        if self.outbound.send(event.clone()).is_err() {
            debug!(event_type = %event.event_type(), "Bridge closed, event dropped");
        }
    }
}

impl Drop for TransportBridge {
    fn drop(&mut self) {
        self.close();
    }
}
