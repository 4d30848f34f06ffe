//! Component A: the UDP datagram transport (§4.A).

use crate::error::Result;
use bytes::Bytes;
use std::net::SocketAddr;
use tokio::net::UdpSocket;

/// Owns a single UDP endpoint bound to an ephemeral local port, talking to
/// exactly one remote peer. Errors on `send` are logged by the caller and
/// never tear the session down; only a closed socket does that.
pub struct Transport {
    socket: UdpSocket,
    remote: SocketAddr,
}

impl Transport {
    pub async fn connect(remote: SocketAddr) -> Result<Self> {
        let bind_addr: SocketAddr = if remote.is_ipv6() {
            "[::]:0".parse().unwrap()
        } else {
            "0.0.0.0:0".parse().unwrap()
        };
        let socket = UdpSocket::bind(bind_addr).await?;
        Ok(Self { socket, remote })
    }

    pub fn remote(&self) -> SocketAddr {
        self.remote
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub async fn send(&self, bytes: &[u8]) -> Result<()> {
        self.socket.send_to(bytes, self.remote).await?;
        Ok(())
    }

    /// Waits for the next datagram actually sent by `remote`, silently
    /// discarding anything that arrives from elsewhere (off-path spoofed or
    /// stray packets on the bound ephemeral port).
    pub async fn recv(&self, buf: &mut [u8]) -> Result<(Bytes, SocketAddr)> {
        loop {
            let (len, from) = self.socket.recv_from(buf).await?;
            if from == self.remote {
                return Ok((Bytes::copy_from_slice(&buf[..len]), from));
            }
        }
    }
}
