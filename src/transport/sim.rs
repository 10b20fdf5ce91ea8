//! In-memory datagram network.
//!
//! A [`SimNetwork`] stands in for the LAN: every [`SimFactory`] is one host
//! (one IP address) whose sockets exchange datagrams through a shared hub.
//! The hub can drop datagrams, inject socket faults, and counts how many send
//! sockets each host has open, so delivery and reconnect behavior can be
//! exercised without touching the real network. [`SimLink`] is the matching
//! stand-in for network attachment.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;

use super::config::LinkSettings;
use super::error::PeerError;
use super::link::Link;
use super::socket::{DatagramSocket, SocketFactory};

const EPHEMERAL_BASE: u16 = 49152;

/// A datagram in flight, as seen by the loss filter.
#[derive(Debug, Clone)]
pub struct Datagram {
    /// Sending socket.
    pub from: SocketAddr,
    /// Destination as addressed (may be the broadcast address).
    pub to: SocketAddr,
    /// Full frame, namespace tag included.
    pub payload: Vec<u8>,
}

type LossFilter = Box<dyn FnMut(&Datagram) -> bool + Send>;
type Inbox = mpsc::UnboundedReceiver<(Vec<u8>, SocketAddr)>;

#[derive(Debug, Default, Clone, Copy)]
struct SenderCount {
    live: usize,
    peak: usize,
}

#[derive(Default)]
struct Hub {
    endpoints: HashMap<SocketAddr, mpsc::UnboundedSender<(Vec<u8>, SocketAddr)>>,
    next_ephemeral: u16,
    drop_next: usize,
    loss: Option<LossFilter>,
    send_faults: VecDeque<io::ErrorKind>,
    recv_faults: VecDeque<io::ErrorKind>,
    senders: HashMap<IpAddr, SenderCount>,
    opened: usize,
    delivered: usize,
    dropped: usize,
}

impl Hub {
    fn route(&mut self, datagram: Datagram) {
        if self.drop_next > 0 {
            self.drop_next -= 1;
            self.dropped += 1;
            return;
        }
        if let Some(loss) = self.loss.as_mut() {
            if loss(&datagram) {
                self.dropped += 1;
                return;
            }
        }

        let targets: Vec<SocketAddr> = if datagram.to.ip() == IpAddr::V4(Ipv4Addr::BROADCAST) {
            self.endpoints
                .keys()
                .filter(|addr| addr.port() == datagram.to.port())
                .copied()
                .collect()
        } else {
            vec![datagram.to]
        };

        for target in targets {
            // unicast to an unbound port vanishes, as UDP would
            if let Some(tx) = self.endpoints.get(&target) {
                if tx.send((datagram.payload.clone(), datagram.from)).is_ok() {
                    self.delivered += 1;
                }
            }
        }
    }

    fn ephemeral_port(&mut self) -> u16 {
        loop {
            let port = EPHEMERAL_BASE.wrapping_add(self.next_ephemeral);
            self.next_ephemeral = self.next_ephemeral.wrapping_add(1);
            if port >= EPHEMERAL_BASE {
                return port;
            }
        }
    }
}

fn lock(hub: &Mutex<Hub>) -> MutexGuard<'_, Hub> {
    hub.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Shared in-memory network.
#[derive(Clone, Default)]
pub struct SimNetwork {
    hub: Arc<Mutex<Hub>>,
}

impl SimNetwork {
    /// Empty network with perfect delivery.
    pub fn new() -> Self {
        Self::default()
    }

    /// Socket factory for a host at `ip`.
    pub fn host(&self, ip: impl Into<IpAddr>) -> SimFactory {
        SimFactory {
            network: self.clone(),
            ip: ip.into(),
        }
    }

    /// Silently drop the next `count` datagrams sent by anyone.
    pub fn drop_next(&self, count: usize) {
        lock(&self.hub).drop_next += count;
    }

    /// Drop every datagram for which `filter` returns true.
    pub fn set_loss(&self, filter: impl FnMut(&Datagram) -> bool + Send + 'static) {
        lock(&self.hub).loss = Some(Box::new(filter));
    }

    /// Remove the loss filter.
    pub fn clear_loss(&self) {
        lock(&self.hub).loss = None;
    }

    /// Fail the next `count` sends with `kind`.
    pub fn fail_sends(&self, count: usize, kind: io::ErrorKind) {
        lock(&self.hub).send_faults.extend(std::iter::repeat_n(kind, count));
    }

    /// Fail the next `count` receives with `kind`.
    pub fn fail_recvs(&self, count: usize, kind: io::ErrorKind) {
        lock(&self.hub).recv_faults.extend(std::iter::repeat_n(kind, count));
    }

    /// Send sockets currently open on `ip`.
    pub fn live_senders(&self, ip: impl Into<IpAddr>) -> usize {
        lock(&self.hub)
            .senders
            .get(&ip.into())
            .map_or(0, |count| count.live)
    }

    /// Most send sockets ever open at once on `ip`.
    pub fn peak_senders(&self, ip: impl Into<IpAddr>) -> usize {
        lock(&self.hub)
            .senders
            .get(&ip.into())
            .map_or(0, |count| count.peak)
    }

    /// Sockets opened over the network's lifetime.
    pub fn sockets_opened(&self) -> usize {
        lock(&self.hub).opened
    }

    /// Datagrams handed to a receiving socket.
    pub fn delivered(&self) -> usize {
        lock(&self.hub).delivered
    }

    /// Datagrams lost to `drop_next` or the loss filter.
    pub fn dropped(&self) -> usize {
        lock(&self.hub).dropped
    }

    fn bind(&self, addr: SocketAddr, sender: bool) -> io::Result<SimSocket> {
        let mut hub = lock(&self.hub);
        if hub.endpoints.contains_key(&addr) {
            return Err(io::Error::new(
                io::ErrorKind::AddrInUse,
                format!("{addr} already bound"),
            ));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        hub.endpoints.insert(addr, tx);
        hub.opened += 1;
        if sender {
            let count = hub.senders.entry(addr.ip()).or_default();
            count.live += 1;
            count.peak = count.peak.max(count.live);
        }

        Ok(SimSocket {
            addr,
            sender,
            hub: Arc::clone(&self.hub),
            inbox: tokio::sync::Mutex::new(rx),
        })
    }
}

impl std::fmt::Debug for SimNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let hub = lock(&self.hub);
        f.debug_struct("SimNetwork")
            .field("endpoints", &hub.endpoints.len())
            .field("delivered", &hub.delivered)
            .field("dropped", &hub.dropped)
            .finish()
    }
}

/// Socket factory for one simulated host.
#[derive(Debug, Clone)]
pub struct SimFactory {
    network: SimNetwork,
    ip: IpAddr,
}

impl SimFactory {
    /// Address of this host.
    pub fn ip(&self) -> IpAddr {
        self.ip
    }
}

impl SocketFactory for SimFactory {
    type Socket = SimSocket;

    async fn bind_receiver(&self, port: u16) -> io::Result<SimSocket> {
        self.network.bind(SocketAddr::new(self.ip, port), false)
    }

    async fn open_sender(&self) -> io::Result<SimSocket> {
        let port = lock(&self.network.hub).ephemeral_port();
        self.network.bind(SocketAddr::new(self.ip, port), true)
    }
}

/// Socket on a [`SimNetwork`]. Unbinds itself when dropped.
pub struct SimSocket {
    addr: SocketAddr,
    sender: bool,
    hub: Arc<Mutex<Hub>>,
    inbox: tokio::sync::Mutex<Inbox>,
}

impl std::fmt::Debug for SimSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimSocket").field("addr", &self.addr).finish()
    }
}

impl DatagramSocket for SimSocket {
    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> io::Result<usize> {
        let mut hub = lock(&self.hub);
        if let Some(kind) = hub.send_faults.pop_front() {
            return Err(io::Error::new(kind, "simulated send fault"));
        }
        hub.route(Datagram {
            from: self.addr,
            to: target,
            payload: buf.to_vec(),
        });
        Ok(buf.len())
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        let fault = lock(&self.hub).recv_faults.pop_front();
        if let Some(kind) = fault {
            return Err(io::Error::new(kind, "simulated receive fault"));
        }

        let mut inbox = self.inbox.lock().await;
        let (payload, from) = inbox
            .recv()
            .await
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "socket unbound"))?;

        let len = payload.len().min(buf.len());
        buf[..len].copy_from_slice(&payload[..len]);
        Ok((len, from))
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        Ok(self.addr)
    }
}

impl Drop for SimSocket {
    fn drop(&mut self) {
        let mut hub = lock(&self.hub);
        hub.endpoints.remove(&self.addr);
        if self.sender {
            if let Some(count) = hub.senders.get_mut(&self.addr.ip()) {
                count.live = count.live.saturating_sub(1);
            }
        }
    }
}

#[derive(Debug, Default)]
struct LinkStats {
    attaches: usize,
    detaches: usize,
    polls: usize,
    down_polls: u32,
    pending: u32,
    unreachable: bool,
}

/// Simulated network attachment. Clones share counters.
#[derive(Debug, Clone, Default)]
pub struct SimLink {
    stats: Arc<Mutex<LinkStats>>,
}

impl SimLink {
    /// Link that is up as soon as it is attached.
    pub fn new() -> Self {
        Self::default()
    }

    /// Link that reports down for `polls` polls after every attach.
    pub fn slow(polls: u32) -> Self {
        let link = Self::default();
        link.stats().down_polls = polls;
        link
    }

    /// Link that never comes up.
    pub fn unreachable() -> Self {
        let link = Self::default();
        link.stats().unreachable = true;
        link
    }

    /// Take the network away (or give it back) for every clone.
    pub fn set_reachable(&self, reachable: bool) {
        self.stats().unreachable = !reachable;
    }

    /// Completed attaches.
    pub fn attach_count(&self) -> usize {
        self.stats().attaches
    }

    /// Completed detaches.
    pub fn detach_count(&self) -> usize {
        self.stats().detaches
    }

    /// Status polls answered.
    pub fn poll_count(&self) -> usize {
        self.stats().polls
    }

    fn stats(&self) -> MutexGuard<'_, LinkStats> {
        self.stats.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Link for SimLink {
    async fn attach(&mut self, _settings: &LinkSettings) -> Result<(), PeerError> {
        let mut stats = self.stats();
        stats.attaches += 1;
        stats.pending = stats.down_polls;
        Ok(())
    }

    async fn is_connected(&mut self) -> Result<bool, PeerError> {
        let mut stats = self.stats();
        stats.polls += 1;
        if stats.unreachable {
            return Ok(false);
        }
        if stats.pending > 0 {
            stats.pending -= 1;
            return Ok(false);
        }
        Ok(true)
    }

    async fn detach(&mut self) -> Result<(), PeerError> {
        self.stats().detaches += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const PORT: u16 = 45123;

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    async fn recv(socket: &SimSocket) -> (Vec<u8>, SocketAddr) {
        let mut buf = [0u8; 256];
        let (len, from) = tokio::time::timeout(Duration::from_secs(1), socket.recv_from(&mut buf))
            .await
            .expect("datagram not delivered")
            .unwrap();
        (buf[..len].to_vec(), from)
    }

    #[tokio::test]
    async fn test_unicast_delivery() {
        let net = SimNetwork::new();
        let a = net.host(ip(1));
        let b = net.host(ip(2));

        let rx = b.bind_receiver(PORT).await.unwrap();
        let tx = a.open_sender().await.unwrap();
        tx.send_to(b"hi", SocketAddr::new(ip(2), PORT)).await.unwrap();

        let (payload, from) = recv(&rx).await;
        assert_eq!(payload, b"hi");
        assert_eq!(from, tx.local_addr().unwrap());
        assert_eq!(net.delivered(), 1);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_receiver_on_port() {
        let net = SimNetwork::new();
        let rx1 = net.host(ip(1)).bind_receiver(PORT).await.unwrap();
        let rx2 = net.host(ip(2)).bind_receiver(PORT).await.unwrap();
        let other = net.host(ip(3)).bind_receiver(PORT + 1).await.unwrap();
        let tx = net.host(ip(4)).open_sender().await.unwrap();

        tx.send_to(b"all", SocketAddr::new(IpAddr::V4(Ipv4Addr::BROADCAST), PORT))
            .await
            .unwrap();

        assert_eq!(recv(&rx1).await.0, b"all");
        assert_eq!(recv(&rx2).await.0, b"all");
        assert_eq!(net.delivered(), 2);
        drop(other);
    }

    #[tokio::test]
    async fn test_drop_next_and_loss_filter() {
        let net = SimNetwork::new();
        let rx = net.host(ip(2)).bind_receiver(PORT).await.unwrap();
        let tx = net.host(ip(1)).open_sender().await.unwrap();
        let to = SocketAddr::new(ip(2), PORT);

        net.drop_next(1);
        net.set_loss(|d| d.payload.starts_with(b"x"));
        tx.send_to(b"first", to).await.unwrap();
        tx.send_to(b"xray", to).await.unwrap();
        tx.send_to(b"kept", to).await.unwrap();

        assert_eq!(recv(&rx).await.0, b"kept");
        assert_eq!(net.dropped(), 2);
    }

    #[tokio::test]
    async fn test_injected_faults() {
        let net = SimNetwork::new();
        let host = net.host(ip(1));
        let socket = host.open_sender().await.unwrap();

        net.fail_sends(1, io::ErrorKind::NetworkDown);
        let err = socket.send_to(b"x", SocketAddr::new(ip(2), PORT)).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NetworkDown);
        assert!(socket.send_to(b"x", SocketAddr::new(ip(2), PORT)).await.is_ok());

        net.fail_recvs(1, io::ErrorKind::ConnectionReset);
        let mut buf = [0u8; 8];
        let err = socket.recv_from(&mut buf).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
    }

    #[tokio::test]
    async fn test_bind_conflict_and_release() {
        let net = SimNetwork::new();
        let host = net.host(ip(1));

        let first = host.bind_receiver(PORT).await.unwrap();
        let err = host.bind_receiver(PORT).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AddrInUse);

        drop(first);
        assert!(host.bind_receiver(PORT).await.is_ok());
    }

    #[tokio::test]
    async fn test_sender_counts() {
        let net = SimNetwork::new();
        let host = net.host(ip(1));

        let a = host.open_sender().await.unwrap();
        let b = host.open_sender().await.unwrap();
        assert_ne!(a.local_addr().unwrap(), b.local_addr().unwrap());
        assert_eq!(net.live_senders(ip(1)), 2);

        drop(a);
        drop(b);
        assert_eq!(net.live_senders(ip(1)), 0);
        assert_eq!(net.peak_senders(ip(1)), 2);
        assert_eq!(net.sockets_opened(), 2);
    }

    #[tokio::test]
    async fn test_slow_link() {
        let mut link = SimLink::slow(2);
        let observer = link.clone();

        link.attach(&LinkSettings::default()).await.unwrap();
        assert!(!link.is_connected().await.unwrap());
        assert!(!link.is_connected().await.unwrap());
        assert!(link.is_connected().await.unwrap());

        link.detach().await.unwrap();
        assert_eq!(observer.attach_count(), 1);
        assert_eq!(observer.detach_count(), 1);
        assert_eq!(observer.poll_count(), 3);
    }
}
