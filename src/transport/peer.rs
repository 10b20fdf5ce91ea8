//! The network peer.
//!
//! A [`NetworkPeer`] owns one [`Link`] and a receive/send socket pair opened
//! through a [`SocketFactory`]. Every outgoing frame carries the configured
//! namespace tag; incoming datagrams without it are discarded.
//!
//! # Insurance
//!
//! An insured send retransmits its frame until the receiver echoes the same
//! bytes back, waiting `latency` for each echo. An insured receive echoes every
//! accepted frame to its sender. Delivery is at-least-once: a lost echo means
//! the receiver sees the frame again.
//!
//! # Healing
//!
//! Faults matched by the configured [`RetryPolicy`](super::RetryPolicy) never
//! reach the caller. The peer tears down its sockets and link, waits
//! `retry_delay`, attaches again, reopens, and resumes the interrupted
//! operation. Everything else propagates.

use std::net::{IpAddr, SocketAddr};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::time::{Duration, Instant, timeout_at};

use super::config::PeerConfig;
use super::error::PeerError;
use super::link::Link;
use super::socket::{DatagramSocket, SocketFactory};
use crate::core::{BROADCAST_HOST, DecodeError};

/// Lifecycle of a peer.
///
/// `Detached -> Attached -> Live`, back to `Detached` while healing, and
/// `Closed` once [`NetworkPeer::disconnect`] has run. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    /// No link, no sockets.
    Detached,
    /// Link confirmed, sockets not open.
    Attached,
    /// Sockets open; send and receive work.
    Live,
    /// Explicitly disconnected.
    Closed,
}

/// How a [`NetworkPeer::scope`] body ended.
#[derive(Debug)]
pub enum ScopeOutcome<T> {
    /// The body returned normally; the peer is now closed.
    Completed(T),
    /// The body hit a retryable fault; the peer has been healed and is live.
    Healed(PeerError),
}

struct Sockets<S> {
    send: S,
    recv: S,
}

/// Namespaced UDP peer with optional at-least-once delivery.
pub struct NetworkPeer<L, F: SocketFactory> {
    config: PeerConfig,
    link: L,
    factory: F,
    state: PeerState,
    sockets: Option<Sockets<F::Socket>>,
    buffer: Vec<u8>,
    reconnects: u64,
}

impl<L: Link, F: SocketFactory> NetworkPeer<L, F> {
    /// Create a detached peer. Nothing touches the network yet.
    pub fn new(config: PeerConfig, link: L, factory: F) -> Result<Self, PeerError> {
        config.validate()?;
        // one spare byte so an oversized datagram shows up as a full buffer
        let buffer = vec![0u8; config.buffer_size + 1];
        Ok(Self {
            config,
            link,
            factory,
            state: PeerState::Detached,
            sockets: None,
            buffer,
            reconnects: 0,
        })
    }

    /// Create a peer, attach its link and open its sockets.
    pub async fn connect(config: PeerConfig, link: L, factory: F) -> Result<Self, PeerError> {
        let mut peer = Self::new(config, link, factory)?;
        peer.establish().await?;
        Ok(peer)
    }

    /// Bring the link up and wait until it reports connected.
    ///
    /// Polls at `poll_hz`; fails with [`PeerError::AttachTimeout`] once
    /// `max_polls` polls have all reported down.
    pub async fn attach(&mut self) -> Result<(), PeerError> {
        if self.state == PeerState::Closed {
            return Err(PeerError::Closed);
        }

        log::info!(
            "Attaching link (access point: {}, network: {:?})",
            self.config.link.enable_ap,
            self.config.link.credentials.as_ref().map(|c| c.ssid.as_str())
        );
        self.link.attach(&self.config.link).await?;

        let mut polls = 0;
        loop {
            polls += 1;
            if self.link.is_connected().await? {
                break;
            }
            if polls >= self.config.link.max_polls {
                log::error!("Link still down after {polls} polls");
                return Err(PeerError::AttachTimeout { tries: polls });
            }
            log::debug!("Waiting for link ({polls}/{})", self.config.link.max_polls);
            tokio::time::sleep(self.config.link.poll_interval()?).await;
        }

        self.state = PeerState::Attached;
        log::info!("Link attached");
        Ok(())
    }

    /// Open the receive socket on the shared port and a fresh send socket.
    ///
    /// Any sockets from an earlier open are closed first.
    pub async fn open(&mut self) -> Result<(), PeerError> {
        match self.state {
            PeerState::Closed => return Err(PeerError::Closed),
            PeerState::Detached => return Err(PeerError::NotAttached),
            PeerState::Attached | PeerState::Live => {}
        }

        self.sockets = None;
        let recv = self.factory.bind_receiver(self.config.port).await?;
        let send = self.factory.open_sender().await?;
        log::info!(
            "Peer live on port {} (sender {:?})",
            self.config.port,
            send.local_addr().ok()
        );

        self.sockets = Some(Sockets { send, recv });
        self.state = PeerState::Live;
        Ok(())
    }

    /// Close sockets and detach the link for good. Safe to call repeatedly.
    pub async fn disconnect(&mut self) {
        if self.state == PeerState::Closed {
            return;
        }
        self.teardown().await;
        self.state = PeerState::Closed;
        log::info!("Peer disconnected");
    }

    /// Send `payload`, tagged, to `destination` or the broadcast address.
    ///
    /// With `insurance`, retransmits every `latency` until the frame is echoed
    /// back. Returns the bytes written by the last transmission.
    ///
    /// A tagged frame longer than `buffer_size` fails with
    /// [`PeerError::PayloadTooLarge`] before anything is sent.
    pub async fn send(
        &mut self,
        payload: &[u8],
        destination: Option<IpAddr>,
        insurance: bool,
    ) -> Result<usize, PeerError> {
        let frame = self.config.namespace.frame(payload);
        if frame.len() > self.config.buffer_size {
            return Err(PeerError::PayloadTooLarge {
                len: frame.len(),
                max: self.config.buffer_size,
            });
        }
        let target = SocketAddr::new(
            destination.unwrap_or(IpAddr::V4(BROADCAST_HOST)),
            self.config.port,
        );

        loop {
            match self.transmit(&frame, target, insurance).await {
                Ok(sent) => return Ok(sent),
                Err(fault) if self.config.retry.is_retryable(&fault) => self.heal(&fault).await?,
                Err(fault) => return Err(fault),
            }
        }
    }

    /// Receive the next frame carrying this peer's tag.
    ///
    /// Returns the payload with the tag stripped, and the sender. With
    /// `insurance`, the full frame is echoed to the sender first.
    pub async fn receive(&mut self, insurance: bool) -> Result<(Vec<u8>, SocketAddr), PeerError> {
        loop {
            match self.accept(insurance).await {
                Ok(received) => return Ok(received),
                Err(fault) if self.config.retry.is_retryable(&fault) => self.heal(&fault).await?,
                Err(fault) => return Err(fault),
            }
        }
    }

    /// Send UTF-8 text.
    pub async fn send_str(
        &mut self,
        text: &str,
        destination: Option<IpAddr>,
        insurance: bool,
    ) -> Result<usize, PeerError> {
        self.send(text.as_bytes(), destination, insurance).await
    }

    /// Receive a payload as UTF-8 text.
    pub async fn recv_str(&mut self, insurance: bool) -> Result<(String, SocketAddr), PeerError> {
        let (payload, from) = self.receive(insurance).await?;
        let text = String::from_utf8(payload).map_err(DecodeError::from)?;
        Ok((text, from))
    }

    /// Send `value` as a JSON payload.
    pub async fn send_json<T: Serialize + ?Sized>(
        &mut self,
        value: &T,
        destination: Option<IpAddr>,
        insurance: bool,
    ) -> Result<usize, PeerError> {
        let payload = serde_json::to_vec(value).map_err(PeerError::Encode)?;
        self.send(&payload, destination, insurance).await
    }

    /// Receive a JSON payload.
    pub async fn recv_json<T: DeserializeOwned>(
        &mut self,
        insurance: bool,
    ) -> Result<(T, SocketAddr), PeerError> {
        let (payload, from) = self.receive(insurance).await?;
        let value = serde_json::from_slice(&payload).map_err(DecodeError::from)?;
        Ok((value, from))
    }

    /// Run `body` against this peer with guaranteed cleanup.
    ///
    /// A normal return disconnects the peer. A retryable fault is healed
    /// instead and reported as [`ScopeOutcome::Healed`], leaving the peer live
    /// so the caller can run the body again. Any other fault disconnects the
    /// peer and propagates.
    pub async fn scope<T, B>(&mut self, body: B) -> Result<ScopeOutcome<T>, PeerError>
    where
        B: AsyncFnOnce(&mut Self) -> Result<T, PeerError>,
    {
        match body(self).await {
            Ok(value) => {
                self.disconnect().await;
                Ok(ScopeOutcome::Completed(value))
            }
            Err(fault) if self.config.retry.is_retryable(&fault) => {
                if let Err(e) = self.heal(&fault).await {
                    self.disconnect().await;
                    return Err(e);
                }
                Ok(ScopeOutcome::Healed(fault))
            }
            Err(fault) => {
                self.disconnect().await;
                Err(fault)
            }
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PeerState {
        self.state
    }

    /// Successful reconnects since creation.
    pub fn reconnects(&self) -> u64 {
        self.reconnects
    }

    /// Peer configuration.
    pub fn config(&self) -> &PeerConfig {
        &self.config
    }

    /// Link backend.
    pub fn link(&self) -> &L {
        &self.link
    }

    /// Local `(receive, send)` addresses while live.
    pub fn local_addrs(&self) -> Option<(SocketAddr, SocketAddr)> {
        let sockets = self.sockets.as_ref()?;
        Some((sockets.recv.local_addr().ok()?, sockets.send.local_addr().ok()?))
    }

    async fn establish(&mut self) -> Result<(), PeerError> {
        self.attach().await?;
        self.open().await
    }

    async fn teardown(&mut self) {
        self.sockets = None;
        if let Err(e) = self.link.detach().await {
            log::debug!("Link detach failed: {e}");
        }
        if self.state != PeerState::Closed {
            self.state = PeerState::Detached;
        }
    }

    /// Reconnect after a retryable fault, repeating until it succeeds or a
    /// non-retryable fault occurs.
    async fn heal(&mut self, fault: &PeerError) -> Result<(), PeerError> {
        log::warn!(
            "Recovering from {fault}; reconnecting in {:?}",
            self.config.retry_delay
        );

        loop {
            self.teardown().await;
            tokio::time::sleep(self.config.retry_delay).await;

            match self.establish().await {
                Ok(()) => {
                    self.reconnects += 1;
                    log::info!("Reconnected (total {})", self.reconnects);
                    return Ok(());
                }
                Err(e) if self.config.retry.is_retryable(&e) => {
                    log::warn!("Reconnect failed: {e}; retrying in {:?}", self.config.retry_delay);
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn not_live(&self) -> PeerError {
        if self.state == PeerState::Closed {
            PeerError::Closed
        } else {
            PeerError::NotAttached
        }
    }

    async fn transmit(
        &mut self,
        frame: &[u8],
        target: SocketAddr,
        insurance: bool,
    ) -> Result<usize, PeerError> {
        let Some(sockets) = self.sockets.as_ref() else {
            return Err(self.not_live());
        };

        let mut sent = sockets.send.send_to(frame, target).await?;
        if !insurance {
            return Ok(sent);
        }

        let mut attempts = 1u32;
        while !wait_for_echo(&sockets.send, frame, self.config.latency, &mut self.buffer).await {
            log::debug!(
                "No echo from {target} within {:?}; retransmitting (attempt {})",
                self.config.latency,
                attempts + 1
            );
            sent = sockets.send.send_to(frame, target).await?;
            attempts += 1;
        }

        log::trace!("Frame to {target} confirmed after {attempts} attempt(s)");
        Ok(sent)
    }

    async fn accept(&mut self, insurance: bool) -> Result<(Vec<u8>, SocketAddr), PeerError> {
        let Some(sockets) = self.sockets.as_ref() else {
            return Err(self.not_live());
        };

        loop {
            let (len, from) = sockets.recv.recv_from(&mut self.buffer).await?;
            if len > self.config.buffer_size {
                log::debug!("Discarding oversized datagram from {from}");
                continue;
            }
            let datagram = &self.buffer[..len];

            let Some(payload) = self.config.namespace.strip(datagram) else {
                log::trace!("Discarding {len}-byte datagram from {from}: foreign namespace");
                continue;
            };

            if insurance {
                sockets.recv.send_to(datagram, from).await?;
            }
            return Ok((payload.to_vec(), from));
        }
    }
}

/// Wait up to `latency` for `frame` to come back on `socket`.
///
/// Unrelated datagrams are skipped. A receive error counts as no echo once the
/// window has elapsed.
async fn wait_for_echo<S: DatagramSocket>(
    socket: &S,
    frame: &[u8],
    latency: Duration,
    buf: &mut [u8],
) -> bool {
    let deadline = Instant::now() + latency;
    loop {
        match timeout_at(deadline, socket.recv_from(buf)).await {
            Err(_) => return false,
            Ok(Ok((len, _))) if buf[..len] == *frame => return true,
            Ok(Ok((len, from))) => {
                log::trace!("Ignoring {len}-byte datagram from {from} while awaiting echo");
            }
            Ok(Err(e)) => {
                log::debug!("Echo wait interrupted: {e}");
                tokio::time::sleep_until(deadline).await;
                return false;
            }
        }
    }
}

impl<L, F: SocketFactory> std::fmt::Debug for NetworkPeer<L, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkPeer")
            .field("port", &self.config.port)
            .field("namespace", &self.config.namespace)
            .field("state", &self.state)
            .field("reconnects", &self.reconnects)
            .finish()
    }
}
