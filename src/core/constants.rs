//! Protocol and calibration defaults.
//!
//! Peers on both ends of a link MUST agree on the port and namespace tag;
//! the remaining values are local tuning knobs.

use std::time::Duration;

// =============================================================================
// NETWORK (wire format)
// =============================================================================

/// Shared UDP port for directed replies and broadcast discovery.
pub const DEFAULT_PORT: u16 = 45123;

/// Namespace tag prefixed to every frame.
pub const DEFAULT_NAMESPACE: &str = ":)";

/// Receive buffer size in bytes (one datagram).
pub const DEFAULT_BUFFER_SIZE: usize = 1024;

/// Limited broadcast address, used when the receiver's address is unknown.
pub const BROADCAST_HOST: std::net::Ipv4Addr = std::net::Ipv4Addr::BROADCAST;

/// Wildcard address the receive socket binds to.
pub const WILDCARD_HOST: std::net::Ipv4Addr = std::net::Ipv4Addr::UNSPECIFIED;

// =============================================================================
// TIMING (link recovery and insurance)
// =============================================================================

/// How long an insured send waits for the echo before retransmitting.
pub const DEFAULT_LATENCY: Duration = Duration::from_secs(5);

/// Pause between a retryable fault and the reconnect attempt.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Link status polls per second while attaching.
pub const DEFAULT_POLL_HZ: f64 = 1.0;

/// Link status polls before attach gives up.
pub const DEFAULT_MAX_POLLS: u32 = 50;

// =============================================================================
// CALIBRATION
// =============================================================================

/// Normalized domain width for dials with few items.
pub const DEFAULT_DIAL_SPAN: i64 = 100;

/// Above this many items the domain grows to `2 * count`.
pub const WIDE_DIAL_THRESHOLD: usize = 50;

/// Dead zone carved from each internal zone boundary, in percent.
pub const DEFAULT_DEADZONE_PERCENT: f64 = 25.0;
