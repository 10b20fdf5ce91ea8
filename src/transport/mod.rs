//! Muro - Transport Layer
//!
//! Application-level messaging over an unreliable, connectionless network:
//!
//! - **Framing**: [`Namespace`] tags every datagram; foreign tags are dropped silently
//! - **Link management**: [`Link`] attaches the host to a network ([`HostLink`], [`WifiLink`])
//! - **Sockets**: [`SocketFactory`] opens one receive and one send socket per peer
//! - **Messaging**: [`NetworkPeer`] sends and receives, with optional insurance
//!   (echo-and-retransmit, at-least-once) and reconnect-and-resume recovery
//! - **Simulation**: [`sim`] provides an in-memory lossy network for tests
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │        Telemetry / consumers            │
//! ├─────────────────────────────────────────┤
//! │           NetworkPeer                   │  ← This module
//! │  framing, insurance, fault recovery     │
//! ├──────────────────┬──────────────────────┤
//! │      Link        │   SocketFactory      │
//! ├──────────────────┴──────────────────────┤
//! │              UDP                        │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Peer lifecycle
//!
//! ```text
//! Detached ──attach──► Attached ──open──► Live
//!    ▲                                     │
//!    └──────── retryable fault ◄───────────┘
//!
//! any state ──disconnect──► Closed (terminal)
//! ```

mod config;
mod error;
mod frame;
mod link;
mod peer;
pub mod sim;
mod socket;

pub use config::*;
pub use error::*;
pub use frame::*;
pub use link::*;
pub use peer::*;
pub use socket::*;
