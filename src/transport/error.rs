//! Transport layer error types and the retryable-fault policy.
//!
//! Faults fall in two classes. Those matched by the peer's [`RetryPolicy`] are
//! healed locally (log, wait, re-attach, re-open, resume the operation). All
//! others propagate to the caller and are fatal to the operation.

use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::DecodeError;

/// Transport layer errors.
#[derive(Debug, Error)]
pub enum PeerError {
    /// I/O error (socket operations).
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// Link never reported itself connected within the poll budget.
    /// Never retried.
    #[error("network not attached after {tries} polls")]
    AttachTimeout {
        /// Polls performed before giving up.
        tries: u32,
    },

    /// Link management command failed.
    #[error("link error: {0}")]
    Link(String),

    /// Peer configuration is unusable.
    #[error("configuration error: {0}")]
    Config(String),

    /// Sockets cannot open before the link is attached.
    #[error("link not attached")]
    NotAttached,

    /// Tagged frame does not fit the receive buffer.
    #[error("frame of {len} bytes exceeds the {max}-byte buffer")]
    PayloadTooLarge {
        /// Frame length including the namespace tag.
        len: usize,
        /// Configured buffer size.
        max: usize,
    },

    /// Peer was explicitly disconnected.
    #[error("peer closed")]
    Closed,

    /// Payload could not be serialized.
    #[error("encode error: {0}")]
    Encode(#[source] serde_json::Error),

    /// Payload could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
}

/// Kinds of fault that a [`RetryPolicy`] can mark as recoverable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    /// Any socket-level I/O error.
    AnyIo,
    /// Network interface is down.
    NetworkDown,
    /// No route to the network.
    NetworkUnreachable,
    /// No route to the host.
    HostUnreachable,
    /// Remote refused (ICMP port unreachable on some platforms).
    ConnectionRefused,
    /// Remote reset.
    ConnectionReset,
    /// Local address vanished (interface lost its lease).
    AddrNotAvailable,
    /// Port still held by a previous socket.
    AddrInUse,
    /// Socket operation timed out.
    TimedOut,
    /// Link management command failed.
    Link,
}

impl FaultKind {
    /// Whether this kind covers `err`.
    pub fn matches(&self, err: &PeerError) -> bool {
        match (self, err) {
            (FaultKind::AnyIo, PeerError::Io(_)) => true,
            (FaultKind::Link, PeerError::Link(_)) => true,
            (kind, PeerError::Io(e)) => kind.io_kind() == Some(e.kind()),
            _ => false,
        }
    }

    fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            FaultKind::NetworkDown => Some(io::ErrorKind::NetworkDown),
            FaultKind::NetworkUnreachable => Some(io::ErrorKind::NetworkUnreachable),
            FaultKind::HostUnreachable => Some(io::ErrorKind::HostUnreachable),
            FaultKind::ConnectionRefused => Some(io::ErrorKind::ConnectionRefused),
            FaultKind::ConnectionReset => Some(io::ErrorKind::ConnectionReset),
            FaultKind::AddrNotAvailable => Some(io::ErrorKind::AddrNotAvailable),
            FaultKind::AddrInUse => Some(io::ErrorKind::AddrInUse),
            FaultKind::TimedOut => Some(io::ErrorKind::TimedOut),
            FaultKind::AnyIo | FaultKind::Link => None,
        }
    }
}

/// The set of fault kinds a peer heals instead of propagating.
///
/// Empty by default: nothing is retried unless the caller opts in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RetryPolicy {
    kinds: Vec<FaultKind>,
}

impl RetryPolicy {
    /// A policy retrying the given kinds.
    pub fn new(kinds: impl IntoIterator<Item = FaultKind>) -> Self {
        Self {
            kinds: kinds.into_iter().collect(),
        }
    }

    /// A policy retrying nothing.
    pub fn none() -> Self {
        Self::default()
    }

    /// Retry every socket and link fault.
    pub fn all_network() -> Self {
        Self::new([FaultKind::AnyIo, FaultKind::Link])
    }

    /// Whether `err` should be healed locally.
    ///
    /// Attach timeouts, configuration errors, closed peers and payload
    /// errors are never retryable regardless of the configured kinds.
    pub fn is_retryable(&self, err: &PeerError) -> bool {
        self.kinds.iter().any(|kind| kind.matches(err))
    }

    /// Configured kinds.
    pub fn kinds(&self) -> &[FaultKind] {
        &self.kinds
    }
}

/// Result type for transport operations.
pub type PeerResult<T> = Result<T, PeerError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn io_err(kind: io::ErrorKind) -> PeerError {
        PeerError::Io(io::Error::new(kind, "test"))
    }

    #[test]
    fn test_empty_policy_retries_nothing() {
        let policy = RetryPolicy::none();
        assert!(!policy.is_retryable(&io_err(io::ErrorKind::NetworkDown)));
        assert!(!policy.is_retryable(&PeerError::Link("down".into())));
    }

    #[test]
    fn test_specific_kinds() {
        let policy = RetryPolicy::new([FaultKind::NetworkDown, FaultKind::ConnectionRefused]);

        assert!(policy.is_retryable(&io_err(io::ErrorKind::NetworkDown)));
        assert!(policy.is_retryable(&io_err(io::ErrorKind::ConnectionRefused)));
        assert!(!policy.is_retryable(&io_err(io::ErrorKind::PermissionDenied)));
        assert!(!policy.is_retryable(&PeerError::Link("nmcli failed".into())));
    }

    #[test]
    fn test_any_io_covers_all_io() {
        let policy = RetryPolicy::all_network();

        assert!(policy.is_retryable(&io_err(io::ErrorKind::PermissionDenied)));
        assert!(policy.is_retryable(&io_err(io::ErrorKind::Other)));
        assert!(policy.is_retryable(&PeerError::Link("nmcli failed".into())));
    }

    #[test]
    fn test_fatal_errors_never_retryable() {
        let policy = RetryPolicy::all_network();

        assert!(!policy.is_retryable(&PeerError::AttachTimeout { tries: 50 }));
        assert!(!policy.is_retryable(&PeerError::Closed));
        assert!(!policy.is_retryable(&PeerError::NotAttached));
        assert!(!policy.is_retryable(&PeerError::Config("bad".into())));
        assert!(!policy.is_retryable(&PeerError::PayloadTooLarge { len: 40, max: 16 }));
    }

    #[test]
    fn test_policy_serde_names() {
        let policy: RetryPolicy = serde_json::from_str(r#"["network_down", "any_io"]"#).unwrap();
        assert_eq!(policy.kinds(), &[FaultKind::NetworkDown, FaultKind::AnyIo]);
    }
}
