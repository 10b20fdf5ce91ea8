//! Muro - Telemetry
//!
//! The producer reads raw dial and button levels from an [`InputBackend`],
//! calibrates each dial through a [`Dial`], and sends a [`TelemetrySample`]
//! whenever any field changes:
//!
//! ```text
//! raw reading ─► Normalizer ─► DialMap ─► TelemetrySample ─► diff ─► NetworkPeer::send_json
//!                                                                          │
//!      actuation ◄── SampleUpdate ◄── SampleStream ◄── NetworkPeer::recv_json
//! ```

mod dial;
mod hardware;
mod runner;
mod sample;
mod stream;

pub use dial::*;
pub use hardware::*;
pub use runner::*;
pub use sample::*;
pub use stream::*;
