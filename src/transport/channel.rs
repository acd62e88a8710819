use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use super::{Transport, TransportError, TransportResult};

/// In-process transport. Useful for tests and for wiring two trees together.
pub struct ChannelTransport {
    name: String,
    tx: mpsc::UnboundedSender<String>,
    rx: Mutex<mpsc::UnboundedReceiver<String>>,
}

impl ChannelTransport {
    /// Two connected ends.
    pub fn pair() -> (Self, Self) {
        let (a_tx, b_rx) = mpsc::unbounded_channel();
        let (b_tx, a_rx) = mpsc::unbounded_channel();
        (
            Self {
                name: "channel:b".to_string(),
                tx: a_tx,
                rx: Mutex::new(a_rx),
            },
            Self {
                name: "channel:a".to_string(),
                tx: b_tx,
                rx: Mutex::new(b_rx),
            },
        )
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    fn peer(&self) -> String {
        self.name.clone()
    }

    async fn send(&self, message: String) -> TransportResult<()> {
        self.tx.send(message).map_err(|_| TransportError::Closed)
    }

    async fn recv(&self) -> TransportResult<Option<String>> {
        Ok(self.rx.lock().await.recv().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pair_is_bidirectional() {
        let (a, b) = ChannelTransport::pair();
        a.send("hello".into()).await.unwrap();
        b.send("world".into()).await.unwrap();
        assert_eq!(b.recv().await.unwrap().as_deref(), Some("hello"));
        assert_eq!(a.recv().await.unwrap().as_deref(), Some("world"));
    }

    #[tokio::test]
    async fn test_closed_end() {
        let (a, b) = ChannelTransport::pair();
        drop(b);
        assert!(matches!(a.send("lost".into()).await, Err(TransportError::Closed)));
        assert_eq!(a.recv().await.unwrap(), None);
    }
}
