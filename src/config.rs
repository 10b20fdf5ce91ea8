//! Application configuration.
//!
//! Loaded from TOML, every section optional:
//!
//! ```toml
//! [network]
//! port = 45123
//! namespace = ":)"
//! retry_on = ["any_io", "link"]
//!
//! [link]
//! kind = "wifi"
//! ssid = "Here"
//! password = "secret"
//!
//! [hardware]
//! backend = "sysfs"
//!
//! [dials.volume]
//! channel = 3
//! min = 15
//! max = 180
//! mute_at_floor = true
//!
//! [buttons]
//! pause = 13
//! ```
//!
//! Search order when no path is given: `~/.config/muro/config.toml`, then
//! `/etc/muro/config.toml`, then built-in defaults. Environment overrides
//! (`MURO_PORT`, `MURO_NAMESPACE`, `MURO_BACKEND`) apply last.

use std::fs;
use std::io;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::{
    DEFAULT_BUFFER_SIZE, DEFAULT_DEADZONE_PERCENT, DEFAULT_LATENCY, DEFAULT_MAX_POLLS,
    DEFAULT_NAMESPACE, DEFAULT_POLL_HZ, DEFAULT_PORT, DEFAULT_RETRY_DELAY, WILDCARD_HOST,
};
use crate::transport::{Credentials, FaultKind, LinkSettings, PeerConfig, RetryPolicy};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// Config file is not valid TOML for this schema.
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range or an override could not be parsed.
    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Peer transport settings.
    pub network: NetworkConfig,
    /// Network attachment.
    pub link: LinkConfig,
    /// Input backend.
    pub hardware: HardwareConfig,
    /// Analog dials.
    pub dials: DialsConfig,
    /// Digital buttons.
    pub buttons: ButtonsConfig,
    /// Producer loop.
    pub telemetry: TelemetryConfig,
    /// Log output.
    pub logging: LoggingConfig,
}

/// `[network]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkConfig {
    /// Shared UDP port.
    pub port: u16,
    /// Namespace tag.
    pub namespace: String,
    /// Receive buffer size in bytes.
    pub buffer_size: usize,
    /// Echo wait for insured sends, in milliseconds.
    pub latency_ms: u64,
    /// Pause before reconnecting, in milliseconds.
    pub retry_delay_ms: u64,
    /// Fault kinds healed locally.
    pub retry_on: Vec<FaultKind>,
    /// Local address to bind.
    pub bind_ip: IpAddr,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            namespace: DEFAULT_NAMESPACE.to_string(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            latency_ms: DEFAULT_LATENCY.as_millis() as u64,
            retry_delay_ms: DEFAULT_RETRY_DELAY.as_millis() as u64,
            retry_on: vec![FaultKind::AnyIo, FaultKind::Link],
            bind_ip: IpAddr::V4(WILDCARD_HOST),
        }
    }
}

/// Link backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    /// The operating system manages connectivity.
    #[default]
    Host,
    /// NetworkManager wireless.
    Wifi,
}

/// `[link]`
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LinkConfig {
    /// Backend.
    pub kind: LinkKind,
    /// Network to join.
    pub ssid: Option<String>,
    /// Passphrase for `ssid`.
    pub password: Option<String>,
    /// Raise a local access point.
    pub enable_ap: bool,
    /// Interface used to join networks.
    pub station_interface: String,
    /// Interface used for the access point.
    pub ap_interface: String,
    /// Status polls per second while attaching.
    pub poll_hz: f64,
    /// Polls before attach gives up.
    pub max_polls: u32,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            kind: LinkKind::Host,
            ssid: None,
            password: None,
            enable_ap: false,
            station_interface: "wlan0".to_string(),
            ap_interface: "wlan0".to_string(),
            poll_hz: DEFAULT_POLL_HZ,
            max_polls: DEFAULT_MAX_POLLS,
        }
    }
}

impl std::fmt::Debug for LinkConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkConfig")
            .field("kind", &self.kind)
            .field("ssid", &self.ssid)
            .field("password", &self.password.as_ref().map(|_| "[redacted]"))
            .field("enable_ap", &self.enable_ap)
            .field("station_interface", &self.station_interface)
            .field("ap_interface", &self.ap_interface)
            .field("poll_hz", &self.poll_hz)
            .field("max_polls", &self.max_polls)
            .finish()
    }
}

/// Input backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Linux IIO ADC channels and sysfs GPIO.
    #[default]
    Sysfs,
    /// Seeded random walk, no hardware required.
    Simulated,
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sysfs" => Ok(Self::Sysfs),
            "simulated" => Ok(Self::Simulated),
            other => Err(ConfigError::Invalid(format!("unknown backend {other:?}"))),
        }
    }
}

/// `[hardware]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HardwareConfig {
    /// Backend.
    pub backend: BackendKind,
    /// IIO device directory holding `in_voltage{N}_raw`.
    pub iio_device: PathBuf,
    /// sysfs GPIO root.
    pub gpio_root: PathBuf,
    /// Simulation seed (0 = random).
    pub seed: u64,
    /// Largest raw reading the simulated ADC produces.
    pub max_raw: f64,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Sysfs,
            iio_device: PathBuf::from("/sys/bus/iio/devices/iio:device0"),
            gpio_root: PathBuf::from("/sys/class/gpio"),
            seed: 0,
            max_raw: 20000.0,
        }
    }
}

/// One analog dial. Items are `min..=max` stepping by `step`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DialConfig {
    /// ADC channel.
    pub channel: u32,
    /// Lowest item.
    pub min: i64,
    /// Highest item (inclusive).
    pub max: i64,
    /// Item spacing.
    pub step: i64,
    /// Dead-zone share of each item's zone, in percent.
    pub deadzone: f64,
    /// Report 0 whenever the dial sits on its lowest item.
    pub mute_at_floor: bool,
}

impl Default for DialConfig {
    fn default() -> Self {
        Self {
            channel: 0,
            min: 0,
            max: 100,
            step: 1,
            deadzone: DEFAULT_DEADZONE_PERCENT,
            mute_at_floor: false,
        }
    }
}

/// `[dials]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DialsConfig {
    /// Volume dial.
    pub volume: DialConfig,
    /// Brightness dial.
    pub brightness: DialConfig,
}

impl Default for DialsConfig {
    fn default() -> Self {
        Self {
            volume: DialConfig {
                channel: 3,
                min: 15,
                max: 180,
                mute_at_floor: true,
                ..DialConfig::default()
            },
            brightness: DialConfig::default(),
        }
    }
}

/// `[buttons]`: GPIO line numbers, wired active-low.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ButtonsConfig {
    /// Play/pause.
    pub pause: u32,
    /// Next track.
    pub next: u32,
    /// Previous track.
    pub prev: u32,
}

impl Default for ButtonsConfig {
    fn default() -> Self {
        Self {
            pause: 13,
            next: 14,
            prev: 12,
        }
    }
}

/// `[telemetry]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TelemetryConfig {
    /// Pause between input reads, in milliseconds (0 = none).
    pub poll_interval_ms: u64,
    /// Receiving host; broadcast when unset.
    pub destination: Option<IpAddr>,
    /// Send samples insured.
    pub insurance: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 10,
            destination: None,
            insurance: false,
        }
    }
}

/// `[logging]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Parse a config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&text)?)
    }

    /// Load `path`, or the first config found on the search path, or defaults;
    /// then apply environment overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match config_paths().into_iter().find(|p| p.exists()) {
                Some(found) => {
                    log::debug!("Using config {}", found.display());
                    Self::from_file(found)?
                }
                None => Self::default(),
            },
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `MURO_*` environment overrides.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`, keyed by environment variable name.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(port) = lookup("MURO_PORT") {
            self.network.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("MURO_PORT={port:?}")))?;
        }
        if let Some(namespace) = lookup("MURO_NAMESPACE") {
            self.network.namespace = namespace;
        }
        if let Some(backend) = lookup("MURO_BACKEND") {
            self.hardware.backend = backend.parse()?;
        }
        Ok(())
    }

    /// Reject values no component could run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let dials = [
            ("volume", &self.dials.volume),
            ("brightness", &self.dials.brightness),
        ];
        for (name, dial) in dials {
            if dial.step <= 0 {
                return Err(ConfigError::Invalid(format!(
                    "dials.{name}.step must be positive, got {}",
                    dial.step
                )));
            }
            if dial.max < dial.min {
                return Err(ConfigError::Invalid(format!(
                    "dials.{name} range {}..={} is empty",
                    dial.min, dial.max
                )));
            }
            if !(0.0..100.0).contains(&dial.deadzone) {
                return Err(ConfigError::Invalid(format!(
                    "dials.{name}.deadzone must be in [0, 100), got {}",
                    dial.deadzone
                )));
            }
        }
        if !(self.hardware.max_raw.is_finite() && self.hardware.max_raw > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "hardware.max_raw must be positive and finite, got {}",
                self.hardware.max_raw
            )));
        }
        self.peer_config()
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Peer configuration derived from `[network]` and `[link]`.
    pub fn peer_config(&self) -> PeerConfig {
        let credentials = self.link.ssid.as_ref().map(|ssid| Credentials {
            ssid: ssid.clone(),
            password: self.link.password.clone(),
        });

        PeerConfig {
            port: self.network.port,
            namespace: self.network.namespace.clone().into(),
            buffer_size: self.network.buffer_size,
            latency: Duration::from_millis(self.network.latency_ms),
            retry_delay: Duration::from_millis(self.network.retry_delay_ms),
            retry: RetryPolicy::new(self.network.retry_on.iter().copied()),
            link: LinkSettings {
                credentials,
                enable_ap: self.link.enable_ap,
                poll_hz: self.link.poll_hz,
                max_polls: self.link.max_polls,
            },
        }
    }
}

fn config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(home) = std::env::var_os("HOME") {
        paths.push(PathBuf::from(home).join(".config/muro/config.toml"));
    }
    paths.push(PathBuf::from("/etc/muro/config.toml"));
    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn write_config(text: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.network.port, 45123);
        assert_eq!(config.network.namespace, ":)");
        assert_eq!(config.link.kind, LinkKind::Host);
        assert_eq!(config.dials.volume.min, 15);
        assert_eq!(config.dials.volume.max, 180);
        assert!(config.dials.volume.mute_at_floor);
        assert_eq!(config.dials.brightness.max, 100);
        assert_eq!(config.buttons.next, 14);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let file = write_config(
            r#"
            [network]
            port = 9000
            retry_on = ["network_down"]

            [link]
            kind = "wifi"
            ssid = "Here"
            password = "fevistick"

            [hardware]
            backend = "simulated"
            seed = 7

            [dials.brightness]
            channel = 1
            "#,
        );

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.network.port, 9000);
        assert_eq!(config.network.namespace, ":)");
        assert_eq!(config.network.retry_on, vec![FaultKind::NetworkDown]);
        assert_eq!(config.link.kind, LinkKind::Wifi);
        assert_eq!(config.hardware.backend, BackendKind::Simulated);
        assert_eq!(config.hardware.seed, 7);
        assert_eq!(config.dials.brightness.channel, 1);
        assert_eq!(config.dials.volume.channel, 3);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let file = write_config("[network]\nprot = 1\n");
        assert!(matches!(
            AppConfig::from_file(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = AppConfig::from_file("/nonexistent/muro.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_load_explicit_path_validates() {
        let file = write_config("[dials.volume]\ndeadzone = 100.0\n");
        assert!(matches!(
            AppConfig::load(Some(file.path())),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("MURO_PORT", "5000"),
            ("MURO_NAMESPACE", "dial"),
            ("MURO_BACKEND", "Simulated"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.network.port, 5000);
        assert_eq!(config.network.namespace, "dial");
        assert_eq!(config.hardware.backend, BackendKind::Simulated);
    }

    #[test]
    fn test_bad_override() {
        let mut config = AppConfig::default();
        assert!(config
            .apply_overrides(|key| (key == "MURO_PORT").then(|| "lots".to_string()))
            .is_err());
        assert!(config
            .apply_overrides(|key| (key == "MURO_BACKEND").then(|| "gpio".to_string()))
            .is_err());
    }

    #[test]
    fn test_validate_dials() {
        let mut config = AppConfig::default();
        config.dials.volume.step = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.dials.brightness.min = 10;
        config.dials.brightness.max = 5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_non_finite_max_raw() {
        for value in ["inf", "nan", "-inf", "0.0"] {
            let file = write_config(&format!(
                "[hardware]\nbackend = \"simulated\"\nmax_raw = {value}\n"
            ));
            assert!(
                matches!(AppConfig::load(Some(file.path())), Err(ConfigError::Invalid(_))),
                "max_raw = {value}"
            );
        }
    }

    #[test]
    fn test_peer_config() {
        let mut config = AppConfig::default();
        config.network.latency_ms = 250;
        config.link.ssid = Some("Here".into());
        config.link.password = Some("fevistick".into());

        let peer = config.peer_config();
        assert_eq!(peer.port, 45123);
        assert_eq!(peer.latency, Duration::from_millis(250));
        assert_eq!(peer.retry.kinds(), &[FaultKind::AnyIo, FaultKind::Link]);
        let creds = peer.link.credentials.unwrap();
        assert_eq!(creds.ssid, "Here");
        assert_eq!(creds.password.as_deref(), Some("fevistick"));
    }

    #[test]
    fn test_debug_hides_password() {
        let mut config = AppConfig::default();
        config.link.password = Some("fevistick".into());
        assert!(!format!("{config:?}").contains("fevistick"));
    }
}
