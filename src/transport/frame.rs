//! Namespace-tagged framing.
//!
//! Wire format:
//!
//! ```text
//! ┌──────────────────────┬──────────────────────────┐
//! │ Namespace tag        │ Application payload      │
//! │ (fixed, per config)  │ (opaque bytes)           │
//! └──────────────────────┴──────────────────────────┘
//! ```
//!
//! No length field and no checksum beyond UDP's own. A receiver accepts a
//! datagram only if it begins with exactly its own tag, which lets unrelated
//! users share a port without seeing each other's traffic.

use std::fmt;

use crate::core::DEFAULT_NAMESPACE;

/// Fixed byte prefix identifying frames of one protocol instance.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Namespace(Vec<u8>);

impl Namespace {
    /// Create a namespace from raw tag bytes.
    pub fn new(tag: impl Into<Vec<u8>>) -> Self {
        Self(tag.into())
    }

    /// Tag bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Tag length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the tag is empty (accepts every datagram).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Prefix `payload` with the tag.
    pub fn frame(&self, payload: &[u8]) -> Vec<u8> {
        let mut frame = Vec::with_capacity(self.0.len() + payload.len());
        frame.extend_from_slice(&self.0);
        frame.extend_from_slice(payload);
        frame
    }

    /// Payload of `datagram` if it carries this tag, `None` otherwise.
    pub fn strip<'a>(&self, datagram: &'a [u8]) -> Option<&'a [u8]> {
        datagram.strip_prefix(self.0.as_slice())
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Self::from(DEFAULT_NAMESPACE)
    }
}

impl From<&str> for Namespace {
    fn from(tag: &str) -> Self {
        Self(tag.as_bytes().to_vec())
    }
}

impl From<String> for Namespace {
    fn from(tag: String) -> Self {
        Self(tag.into_bytes())
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Namespace({:?})", String::from_utf8_lossy(&self.0))
    }
}
