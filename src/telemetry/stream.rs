//! Consumer side: turn received frames back into samples.

use std::net::SocketAddr;

use super::sample::{Field, TelemetrySample};
use crate::transport::{Link, NetworkPeer, PeerError, SocketFactory};

const ALL_FIELDS: [Field; 5] = [
    Field::Volume,
    Field::Brightness,
    Field::Pause,
    Field::Next,
    Field::Prev,
];

/// A received sample and what changed since the previous one.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleUpdate {
    /// The sample.
    pub sample: TelemetrySample,
    /// Producer address.
    pub from: SocketAddr,
    /// Fields that differ from the previous sample (all of them for the first).
    pub changed: Vec<Field>,
}

/// Reads samples from a peer, dropping malformed payloads and duplicates.
#[derive(Debug, Default)]
pub struct SampleStream {
    last: Option<TelemetrySample>,
    insurance: bool,
}

impl SampleStream {
    /// Create a stream; with `insurance`, every frame is echoed to its sender.
    pub fn new(insurance: bool) -> Self {
        Self {
            last: None,
            insurance,
        }
    }

    /// Wait for the next sample that changes at least one field.
    ///
    /// Payloads that are not samples are logged and skipped; duplicates from
    /// insured retransmission are skipped silently.
    pub async fn next<L: Link, F: SocketFactory>(
        &mut self,
        peer: &mut NetworkPeer<L, F>,
    ) -> Result<SampleUpdate, PeerError> {
        loop {
            let (sample, from) = match peer.recv_json::<TelemetrySample>(self.insurance).await {
                Ok(received) => received,
                Err(PeerError::Decode(e)) => {
                    log::warn!("Dropping malformed sample: {e}");
                    continue;
                }
                Err(e) => return Err(e),
            };

            let changed = match &self.last {
                Some(previous) => sample.changed_fields(previous),
                None => ALL_FIELDS.to_vec(),
            };
            if changed.is_empty() {
                log::trace!("Duplicate sample from {from}");
                continue;
            }

            self.last = Some(sample);
            return Ok(SampleUpdate {
                sample,
                from,
                changed,
            });
        }
    }

    /// Most recent sample.
    pub fn last(&self) -> Option<&TelemetrySample> {
        self.last.as_ref()
    }
}
