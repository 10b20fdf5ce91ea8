//! Peer configuration.
//!
//! A [`PeerConfig`] is fixed once a [`NetworkPeer`](super::NetworkPeer) is built.

use std::time::Duration;

use super::error::{FaultKind, PeerError, RetryPolicy};
use super::frame::Namespace;
use crate::core::{
    DEFAULT_BUFFER_SIZE, DEFAULT_LATENCY, DEFAULT_MAX_POLLS, DEFAULT_POLL_HZ, DEFAULT_PORT,
    DEFAULT_RETRY_DELAY,
};

/// Credentials for joining an existing wireless network.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Network name.
    pub ssid: String,
    /// Passphrase, if the network is secured.
    pub password: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("ssid", &self.ssid)
            .field("password", &self.password.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

/// How the peer attaches to a network.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkSettings {
    /// Join this network, if set.
    pub credentials: Option<Credentials>,
    /// Bring up a local access point.
    pub enable_ap: bool,
    /// Link status polls per second while attaching.
    pub poll_hz: f64,
    /// Polls before attach fails with [`PeerError::AttachTimeout`].
    pub max_polls: u32,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            credentials: None,
            enable_ap: false,
            poll_hz: DEFAULT_POLL_HZ,
            max_polls: DEFAULT_MAX_POLLS,
        }
    }
}

impl LinkSettings {
    /// Interval between link status polls.
    ///
    /// Fails when `poll_hz` is not a usable frequency.
    pub fn poll_interval(&self) -> Result<Duration, PeerError> {
        Duration::try_from_secs_f64(1.0 / self.poll_hz)
            .ok()
            .filter(|interval| !interval.is_zero())
            .ok_or_else(|| {
                PeerError::Config(format!(
                    "poll frequency must be positive, got {}",
                    self.poll_hz
                ))
            })
    }
}

/// Peer configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerConfig {
    /// Shared UDP port for sending and receiving.
    pub port: u16,
    /// Namespace tag prefixed to every frame.
    pub namespace: Namespace,
    /// Receive buffer size (largest datagram accepted).
    pub buffer_size: usize,
    /// How long an insured send waits for its echo before retransmitting.
    pub latency: Duration,
    /// Pause between a retryable fault and the reconnect.
    pub retry_delay: Duration,
    /// Faults healed locally instead of propagated.
    pub retry: RetryPolicy,
    /// Network attachment.
    pub link: LinkSettings,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            namespace: Namespace::default(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            latency: DEFAULT_LATENCY,
            retry_delay: DEFAULT_RETRY_DELAY,
            retry: RetryPolicy::none(),
            link: LinkSettings::default(),
        }
    }
}

impl PeerConfig {
    /// Start building a configuration from defaults.
    pub fn builder() -> PeerConfigBuilder {
        PeerConfigBuilder::new()
    }

    /// Reject configurations no peer could operate under.
    pub fn validate(&self) -> Result<(), PeerError> {
        if self.buffer_size <= self.namespace.len() {
            return Err(PeerError::Config(format!(
                "buffer size {} cannot hold the {}-byte namespace tag and a payload",
                self.buffer_size,
                self.namespace.len()
            )));
        }
        self.link.poll_interval()?;
        if self.latency.is_zero() {
            return Err(PeerError::Config("latency must be non-zero".into()));
        }
        Ok(())
    }
}

/// Builder for [`PeerConfig`].
#[derive(Debug, Clone, Default)]
pub struct PeerConfigBuilder {
    config: PeerConfig,
}

impl PeerConfigBuilder {
    /// Create a new builder with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the shared UDP port.
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set the namespace tag.
    pub fn namespace(mut self, namespace: impl Into<Namespace>) -> Self {
        self.config.namespace = namespace.into();
        self
    }

    /// Set the receive buffer size.
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.config.buffer_size = size;
        self
    }

    /// Set the echo wait for insured sends.
    pub fn latency(mut self, latency: Duration) -> Self {
        self.config.latency = latency;
        self
    }

    /// Set the pause before reconnecting.
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.config.retry_delay = delay;
        self
    }

    /// Heal these fault kinds locally.
    pub fn retry_on(mut self, kinds: impl IntoIterator<Item = FaultKind>) -> Self {
        self.config.retry = RetryPolicy::new(kinds);
        self
    }

    /// Join a wireless network.
    pub fn credentials(mut self, ssid: impl Into<String>, password: Option<String>) -> Self {
        self.config.link.credentials = Some(Credentials {
            ssid: ssid.into(),
            password,
        });
        self
    }

    /// Enable the local access point.
    pub fn enable_ap(mut self, enabled: bool) -> Self {
        self.config.link.enable_ap = enabled;
        self
    }

    /// Set link polling: `poll_hz` polls per second, at most `max_polls`.
    pub fn link_polling(mut self, poll_hz: f64, max_polls: u32) -> Self {
        self.config.link.poll_hz = poll_hz;
        self.config.link.max_polls = max_polls;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> PeerConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PeerConfig::default();
        assert_eq!(config.port, 45123);
        assert_eq!(config.namespace.as_bytes(), b":)");
        assert_eq!(config.buffer_size, 1024);
        assert_eq!(config.latency, Duration::from_secs(5));
        assert!(config.retry.kinds().is_empty());
        assert_eq!(config.link.max_polls, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = PeerConfig::builder()
            .port(9000)
            .namespace("dial")
            .latency(Duration::from_millis(50))
            .retry_delay(Duration::from_millis(1))
            .retry_on([FaultKind::NetworkDown])
            .credentials("Here", Some("secret".into()))
            .link_polling(4.0, 5)
            .build();

        assert_eq!(config.port, 9000);
        assert_eq!(config.namespace, Namespace::from("dial"));
        assert_eq!(config.retry.kinds(), &[FaultKind::NetworkDown]);
        assert_eq!(config.link.poll_interval().unwrap(), Duration::from_millis(250));
        assert_eq!(config.link.credentials.unwrap().ssid, "Here");
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = Credentials {
            ssid: "Here".into(),
            password: Some("fevistick".into()),
        };
        let shown = format!("{creds:?}");
        assert!(shown.contains("Here"));
        assert!(!shown.contains("fevistick"));
    }

    #[test]
    fn test_validate_rejects_tiny_buffer() {
        let config = PeerConfig::builder().namespace("abcd").buffer_size(4).build();
        assert!(matches!(config.validate(), Err(PeerError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_poll_rate() {
        let config = PeerConfig::builder().link_polling(0.0, 5).build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unrepresentable_poll_interval() {
        for hz in [1e-300, f64::NAN, -2.0] {
            let config = PeerConfig::builder().link_polling(hz, 5).build();
            assert!(matches!(config.validate(), Err(PeerError::Config(_))), "{hz}");
            assert!(config.link.poll_interval().is_err());
        }
    }
}
