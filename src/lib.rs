//! # Muro
//!
//! Physical dials and buttons, bridged to a host over UDP.
//!
//! A small node reads potentiometers and push buttons, calibrates the dials
//! online (no factory calibration, no stored extrema), quantizes them into
//! discrete values with dead-zone hysteresis, and broadcasts a compact JSON
//! sample whenever anything changes. A host process receives the samples and
//! acts on them.
//!
//! - **Calibration**: online min/max rescaling and dead-zone quantization
//! - **Transport**: namespace-tagged datagrams, optional echo-and-retransmit
//!   delivery, reconnect-and-resume on recoverable faults
//! - **Telemetry**: hardware backends, the change-driven producer loop, and
//!   the consumer stream
//!
//! ## Feature Flags
//!
//! - `transport` (default): Network peer, link management, simulated network
//! - `telemetry` (default): Hardware backends, producer loop, configuration
//! - `cli` (default): `muro-node` and `muro-host` binaries
//!
//! ## Modules
//!
//! - [`core`]: Constants and error types (always included)
//! - [`calibrate`]: Normalizer and dial map (always included)
//! - [`transport`]: Network peer (requires `transport` feature)
//! - [`telemetry`]: Producer and consumer (requires `telemetry` feature)
//! - [`config`]: TOML configuration (requires `telemetry` feature)
//!
//! ## Example Usage
//!
//! ```rust
//! use muro::prelude::*;
//!
//! // Five settings, 20% of each zone reserved as a dead band.
//! let mut dial = DialMap::new(vec![10, 20, 30, 40, 50], 20.0, false).unwrap();
//!
//! // The first readings teach the map the dial's travel.
//! assert_eq!(*dial.lookup(0.0), 10);
//! assert_eq!(*dial.lookup(1000.0), 50);
//!
//! assert_eq!(*dial.lookup(450.0), 30);
//! // 170/1000 lands between the first two zones: keep the last value.
//! assert_eq!(*dial.lookup(170.0), 30);
//! assert_eq!(*dial.lookup(100.0), 10);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Core module (always included)
pub mod core;

// Calibration (always included)
pub mod calibrate;

// Transport layer (feature-gated)
#[cfg(feature = "transport")]
#[cfg_attr(docsrs, doc(cfg(feature = "transport")))]
pub mod transport;

// Telemetry producer/consumer (feature-gated)
#[cfg(feature = "telemetry")]
#[cfg_attr(docsrs, doc(cfg(feature = "telemetry")))]
pub mod telemetry;

// Configuration (feature-gated)
#[cfg(feature = "telemetry")]
#[cfg_attr(docsrs, doc(cfg(feature = "telemetry")))]
pub mod config;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::calibrate::*;
    pub use crate::core::*;

    #[cfg(feature = "transport")]
    pub use crate::transport::{
        Credentials, DatagramSocket, FaultKind, HostLink, Link, LinkSettings, Namespace,
        NetworkPeer, PeerConfig, PeerConfigBuilder, PeerError, PeerResult, PeerState,
        RetryPolicy, ScopeOutcome, SocketFactory, UdpFactory, WifiLink,
    };

    #[cfg(feature = "telemetry")]
    pub use crate::config::AppConfig;
    #[cfg(feature = "telemetry")]
    pub use crate::telemetry::*;
}

// Re-export commonly used items at crate root
pub use crate::calibrate::{DialMap, Normalizer};
pub use crate::core::{CalibrationError, DecodeError, MuroError, MuroResult};

#[cfg(feature = "transport")]
pub use crate::transport::{NetworkPeer, PeerConfig, PeerError, ScopeOutcome};

#[cfg(feature = "telemetry")]
pub use crate::telemetry::{TelemetryLoop, TelemetrySample};
