//! Datagram sockets behind a small trait seam.
//!
//! A peer owns exactly one receive socket (bound to the shared port) and one
//! send socket (ephemeral port, broadcast enabled). Both come from a
//! [`SocketFactory`], so the real tokio UDP stack and the in-memory
//! [`sim`](super::sim) network are interchangeable.

use std::future::Future;
use std::io;
use std::net::{IpAddr, SocketAddr};

use tokio::net::UdpSocket;

/// Connectionless datagram socket.
pub trait DatagramSocket {
    /// Send `buf` to `target`.
    fn send_to(
        &self,
        buf: &[u8],
        target: SocketAddr,
    ) -> impl Future<Output = io::Result<usize>> + Send;

    /// Receive one datagram into `buf`, returning its length and sender.
    ///
    /// Datagrams longer than `buf` are truncated.
    fn recv_from(
        &self,
        buf: &mut [u8],
    ) -> impl Future<Output = io::Result<(usize, SocketAddr)>> + Send;

    /// Local address the socket is bound to.
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

/// Opens the pair of sockets a peer needs.
pub trait SocketFactory {
    /// Socket type produced.
    type Socket: DatagramSocket + Send + Sync;

    /// Bind the receive socket on the shared `port`.
    fn bind_receiver(&self, port: u16) -> impl Future<Output = io::Result<Self::Socket>> + Send;

    /// Open the send socket on an ephemeral port.
    fn open_sender(&self) -> impl Future<Output = io::Result<Self::Socket>> + Send;
}

impl DatagramSocket for UdpSocket {
    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> io::Result<usize> {
        UdpSocket::send_to(self, buf, target).await
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        UdpSocket::recv_from(self, buf).await
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        UdpSocket::local_addr(self)
    }
}

/// Tokio UDP sockets.
///
/// The send socket binds an ephemeral port, so it never contends for the
/// shared port and needs no address reuse.
#[derive(Debug, Clone)]
pub struct UdpFactory {
    bind_ip: IpAddr,
    broadcast: bool,
}

impl UdpFactory {
    /// Sockets bound on `bind_ip`, with broadcast enabled on the sender.
    pub fn new(bind_ip: IpAddr) -> Self {
        Self {
            bind_ip,
            broadcast: true,
        }
    }

    /// Enable or disable `SO_BROADCAST` on the send socket.
    pub fn broadcast(mut self, enabled: bool) -> Self {
        self.broadcast = enabled;
        self
    }
}

impl SocketFactory for UdpFactory {
    type Socket = UdpSocket;

    async fn bind_receiver(&self, port: u16) -> io::Result<UdpSocket> {
        UdpSocket::bind(SocketAddr::new(self.bind_ip, port)).await
    }

    async fn open_sender(&self) -> io::Result<UdpSocket> {
        let socket = UdpSocket::bind(SocketAddr::new(self.bind_ip, 0)).await?;
        if self.broadcast {
            socket.set_broadcast(true)?;
        }
        Ok(socket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn loopback() -> UdpFactory {
        UdpFactory::new(IpAddr::V4(Ipv4Addr::LOCALHOST))
    }

    #[tokio::test]
    async fn test_sender_binds_ephemeral_port() {
        let socket = loopback().open_sender().await.unwrap();
        let addr = DatagramSocket::local_addr(&socket).unwrap();
        assert!(addr.port() != 0);
        assert!(socket.broadcast().unwrap());
    }

    #[tokio::test]
    async fn test_broadcast_can_be_disabled() {
        let socket = loopback().broadcast(false).open_sender().await.unwrap();
        assert!(!socket.broadcast().unwrap());
    }

    #[tokio::test]
    async fn test_socket_send_recv() {
        let factory = loopback();
        let receiver = factory.bind_receiver(0).await.unwrap();
        let receiver_addr = DatagramSocket::local_addr(&receiver).unwrap();
        let sender = factory.open_sender().await.unwrap();

        let data = b":)hello";
        DatagramSocket::send_to(&sender, data, receiver_addr).await.unwrap();

        let mut buf = [0u8; 64];
        let (len, from) = DatagramSocket::recv_from(&receiver, &mut buf).await.unwrap();
        assert_eq!(&buf[..len], data);
        assert_eq!(from, DatagramSocket::local_addr(&sender).unwrap());
    }

    #[tokio::test]
    async fn test_receiver_port_is_exclusive() {
        let factory = loopback();
        let first = factory.bind_receiver(0).await.unwrap();
        let port = DatagramSocket::local_addr(&first).unwrap().port();

        let err = factory.bind_receiver(port).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AddrInUse);

        drop(first);
        assert!(factory.bind_receiver(port).await.is_ok());
    }
}
