//! The producer loop: read, calibrate, diff, emit.

use std::net::IpAddr;
use std::time::Duration;

use super::dial::Dial;
use super::hardware::{HardwareError, InputBackend};
use super::sample::TelemetrySample;
use crate::config::{AppConfig, ButtonsConfig};
use crate::core::CalibrationError;
use crate::transport::{Link, NetworkPeer, PeerError, SocketFactory};

/// Periodically samples the inputs and sends each sample that differs from
/// the last one sent.
///
/// The loop has no retry logic of its own; recoverable network faults are
/// healed inside [`NetworkPeer`].
pub struct TelemetryLoop {
    backend: Box<dyn InputBackend + Send>,
    volume: Dial,
    brightness: Dial,
    buttons: ButtonsConfig,
    last: Option<TelemetrySample>,
    destination: Option<IpAddr>,
    insurance: bool,
    poll_interval: Duration,
}

impl TelemetryLoop {
    /// Build the loop around an already opened backend.
    pub fn new(
        backend: Box<dyn InputBackend + Send>,
        config: &AppConfig,
    ) -> Result<Self, CalibrationError> {
        Ok(Self {
            backend,
            volume: Dial::new(&config.dials.volume)?,
            brightness: Dial::new(&config.dials.brightness)?,
            buttons: config.buttons.clone(),
            last: None,
            destination: config.telemetry.destination,
            insurance: config.telemetry.insurance,
            poll_interval: Duration::from_millis(config.telemetry.poll_interval_ms),
        })
    }

    /// Read every input once.
    ///
    /// Buttons are wired active-low: a low pin reads as pressed.
    pub fn sample(&mut self) -> Result<TelemetrySample, HardwareError> {
        let volume_raw = self.backend.read_analog(self.volume.channel())?;
        let brightness_raw = self.backend.read_analog(self.brightness.channel())?;

        Ok(TelemetrySample {
            volume: self.volume.read(volume_raw),
            brightness: self.brightness.read(brightness_raw),
            pause: !self.backend.read_digital(self.buttons.pause)?,
            next: !self.backend.read_digital(self.buttons.next)?,
            prev: !self.backend.read_digital(self.buttons.prev)?,
        })
    }

    /// Read the inputs; `Some` only if the result differs from the last
    /// sample sent.
    pub fn poll(&mut self) -> Result<Option<TelemetrySample>, HardwareError> {
        let sample = self.sample()?;
        Ok((self.last != Some(sample)).then_some(sample))
    }

    /// One iteration: poll, and send the sample if it changed.
    ///
    /// Returns the sample sent, if any. A failed hardware read is logged and
    /// skipped.
    pub async fn step<L: Link, F: SocketFactory>(
        &mut self,
        peer: &mut NetworkPeer<L, F>,
    ) -> Result<Option<TelemetrySample>, PeerError> {
        let sample = match self.poll() {
            Ok(Some(sample)) => sample,
            Ok(None) => return Ok(None),
            Err(e) => {
                log::warn!("Skipping sample: {e}");
                return Ok(None);
            }
        };

        peer.send_json(&sample, self.destination, self.insurance).await?;
        log::debug!("Sent {sample:?}");
        self.last = Some(sample);
        Ok(Some(sample))
    }

    /// Step forever, pausing `poll_interval` between iterations.
    ///
    /// Returns only when the peer surfaces a fault it could not heal.
    pub async fn run<L: Link, F: SocketFactory>(
        &mut self,
        peer: &mut NetworkPeer<L, F>,
    ) -> Result<(), PeerError> {
        log::info!(
            "Telemetry loop running (every {:?}, insurance: {})",
            self.poll_interval,
            self.insurance
        );
        loop {
            self.step(peer).await?;
            if !self.poll_interval.is_zero() {
                tokio::time::sleep(self.poll_interval).await;
            }
        }
    }

    /// Last sample sent.
    pub fn last(&self) -> Option<&TelemetrySample> {
        self.last.as_ref()
    }
}

impl std::fmt::Debug for TelemetryLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryLoop")
            .field("backend", &self.backend.name())
            .field("last", &self.last)
            .field("destination", &self.destination)
            .field("insurance", &self.insurance)
            .finish()
    }
}
