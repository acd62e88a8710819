use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tracing::debug;

use crate::config::TransportConfig;

use super::{Transport, TransportError, TransportResult};

const MAX_DATAGRAM: usize = 64 * 1024;

/// One JSON message per datagram, exchanged with a single peer.
pub struct UdpTransport {
    socket: UdpSocket,
    peer: SocketAddr,
}

impl UdpTransport {
    pub async fn connect(config: &TransportConfig) -> TransportResult<Self> {
        let socket = UdpSocket::bind(config.bind_endpoint()).await?;
        socket.connect(config.server_endpoint()).await?;
        let peer = socket.peer_addr()?;
        debug!(local = ?socket.local_addr()?, %peer, "UDP transport ready");
        Ok(Self { socket, peer })
    }

    pub fn local_addr(&self) -> TransportResult<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }
}

#[async_trait]
impl Transport for UdpTransport {
    fn peer(&self) -> String {
        self.peer.to_string()
    }

    async fn send(&self, message: String) -> TransportResult<()> {
        self.socket.send(message.as_bytes()).await?;
        Ok(())
    }

    async fn recv(&self) -> TransportResult<Option<String>> {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        let len = self.socket.recv(&mut buf).await?;
        buf.truncate(len);
        String::from_utf8(buf)
            .map(Some)
            .map_err(|_| TransportError::InvalidUtf8)
    }
}
