//! Input backends.
//!
//! Two interchangeable implementations of [`InputBackend`], selected by
//! `[hardware] backend`:
//!
//! - [`SysfsBackend`]: ADC channels through the Linux IIO interface
//!   (`in_voltage{N}_raw`) and buttons through sysfs GPIO
//!   (`/sys/class/gpio/gpio{N}/value`).
//! - [`SimulatedBackend`]: a seeded random walk for the dials and released
//!   buttons, for running without hardware.
//!
//! Handles are created once at startup and passed to the telemetry loop.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use crate::config::{AppConfig, BackendKind, HardwareConfig};

/// Hardware access errors.
#[derive(Debug, Error)]
pub enum HardwareError {
    /// A device file could not be read or written.
    #[error("failed to access {}: {source}", path.display())]
    Io {
        /// Device file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// A device file held something other than a number.
    #[error("unexpected contents in {}: {content:?}", path.display())]
    Parse {
        /// Device file.
        path: PathBuf,
        /// What was read.
        content: String,
    },
}

/// Source of raw analog and digital readings.
pub trait InputBackend {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Raw ADC reading of `channel`.
    fn read_analog(&mut self, channel: u32) -> Result<f64, HardwareError>;

    /// Logic level of GPIO `pin` (`true` = high).
    fn read_digital(&mut self, pin: u32) -> Result<bool, HardwareError>;
}

/// Create the backend selected in `config`, preparing every button pin.
pub fn create_backend(config: &AppConfig) -> Result<Box<dyn InputBackend + Send>, HardwareError> {
    let backend: Box<dyn InputBackend + Send> = match config.hardware.backend {
        BackendKind::Sysfs => {
            let pins = [config.buttons.pause, config.buttons.next, config.buttons.prev];
            Box::new(SysfsBackend::open(&config.hardware, &pins)?)
        }
        BackendKind::Simulated => Box::new(SimulatedBackend::new(
            config.hardware.seed,
            config.hardware.max_raw,
        )),
    };
    log::info!("Input backend: {}", backend.name());
    Ok(backend)
}

/// Linux IIO + sysfs GPIO.
#[derive(Debug, Clone)]
pub struct SysfsBackend {
    iio_device: PathBuf,
    gpio_root: PathBuf,
}

impl SysfsBackend {
    /// Open the backend and configure `pins` as inputs, exporting them first
    /// if the kernel has not.
    pub fn open(config: &HardwareConfig, pins: &[u32]) -> Result<Self, HardwareError> {
        let backend = Self {
            iio_device: config.iio_device.clone(),
            gpio_root: config.gpio_root.clone(),
        };
        for &pin in pins {
            backend.export_input(pin)?;
        }
        log::debug!(
            "sysfs backend on {} with pins {pins:?}",
            backend.iio_device.display()
        );
        Ok(backend)
    }

    fn pin_dir(&self, pin: u32) -> PathBuf {
        self.gpio_root.join(format!("gpio{pin}"))
    }

    fn export_input(&self, pin: u32) -> Result<(), HardwareError> {
        if !self.pin_dir(pin).exists() {
            write(&self.gpio_root.join("export"), &pin.to_string())?;
        }
        write(&self.pin_dir(pin).join("direction"), "in")
    }
}

impl InputBackend for SysfsBackend {
    fn name(&self) -> &str {
        "sysfs"
    }

    fn read_analog(&mut self, channel: u32) -> Result<f64, HardwareError> {
        let path = self.iio_device.join(format!("in_voltage{channel}_raw"));
        let content = read(&path)?;
        content
            .parse()
            .map_err(|_| HardwareError::Parse { path, content })
    }

    fn read_digital(&mut self, pin: u32) -> Result<bool, HardwareError> {
        let path = self.pin_dir(pin).join("value");
        let content = read(&path)?;
        match content.as_str() {
            "0" => Ok(false),
            "1" => Ok(true),
            _ => Err(HardwareError::Parse { path, content }),
        }
    }
}

fn read(path: &Path) -> Result<String, HardwareError> {
    fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .map_err(|source| HardwareError::Io {
            path: path.to_path_buf(),
            source,
        })
}

fn write(path: &Path, value: &str) -> Result<(), HardwareError> {
    fs::write(path, value).map_err(|source| HardwareError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Random-walk dials and controllable buttons.
///
/// Every analog read moves the channel by at most 1% of `max_raw`, starting
/// mid-scale. Buttons read high (released) until set otherwise.
#[derive(Debug, Clone)]
pub struct SimulatedBackend {
    rng: StdRng,
    max_raw: f64,
    analog: HashMap<u32, f64>,
    held: HashMap<u32, f64>,
    digital: HashMap<u32, bool>,
}

impl SimulatedBackend {
    /// Create a simulation. A `seed` of 0 draws one from the OS.
    pub fn new(seed: u64, max_raw: f64) -> Self {
        let rng = if seed == 0 {
            StdRng::from_entropy()
        } else {
            StdRng::seed_from_u64(seed)
        };
        Self {
            rng,
            max_raw,
            analog: HashMap::new(),
            held: HashMap::new(),
            digital: HashMap::new(),
        }
    }

    /// Pin `channel` at `raw` instead of walking.
    pub fn hold_analog(&mut self, channel: u32, raw: f64) {
        self.held.insert(channel, raw);
    }

    /// Resume the random walk on `channel`.
    pub fn release_analog(&mut self, channel: u32) {
        self.held.remove(&channel);
    }

    /// Drive `pin` to `high`.
    pub fn set_digital(&mut self, pin: u32, high: bool) {
        self.digital.insert(pin, high);
    }
}

impl InputBackend for SimulatedBackend {
    fn name(&self) -> &str {
        "simulated"
    }

    fn read_analog(&mut self, channel: u32) -> Result<f64, HardwareError> {
        if let Some(&raw) = self.held.get(&channel) {
            return Ok(raw);
        }

        let max = self.max_raw;
        let stride = max / 100.0;
        let level = self.analog.entry(channel).or_insert(max / 2.0);
        *level = (*level + self.rng.gen_range(-stride..=stride)).clamp(0.0, max);
        Ok(*level)
    }

    fn read_digital(&mut self, pin: u32) -> Result<bool, HardwareError> {
        Ok(self.digital.get(&pin).copied().unwrap_or(true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_sysfs(pins: &[u32]) -> (tempfile::TempDir, HardwareConfig) {
        let dir = tempfile::tempdir().unwrap();
        let iio = dir.path().join("iio:device0");
        let gpio = dir.path().join("gpio");
        fs::create_dir_all(&iio).unwrap();
        fs::create_dir_all(&gpio).unwrap();
        for pin in pins {
            fs::create_dir_all(gpio.join(format!("gpio{pin}"))).unwrap();
        }

        let config = HardwareConfig {
            iio_device: iio,
            gpio_root: gpio,
            ..HardwareConfig::default()
        };
        (dir, config)
    }

    #[test]
    fn test_sysfs_reads() {
        let (_dir, config) = fake_sysfs(&[13]);
        fs::write(config.iio_device.join("in_voltage3_raw"), "1234\n").unwrap();
        fs::write(config.gpio_root.join("gpio13/value"), "0\n").unwrap();

        let mut backend = SysfsBackend::open(&config, &[13]).unwrap();
        assert_eq!(
            fs::read_to_string(config.gpio_root.join("gpio13/direction")).unwrap(),
            "in"
        );
        assert_eq!(backend.read_analog(3).unwrap(), 1234.0);
        assert!(!backend.read_digital(13).unwrap());

        fs::write(config.gpio_root.join("gpio13/value"), "1").unwrap();
        assert!(backend.read_digital(13).unwrap());
    }

    #[test]
    fn test_sysfs_exports_missing_pins() {
        let (_dir, config) = fake_sysfs(&[]);
        fs::write(config.gpio_root.join("export"), "").unwrap();

        // export is written, but no kernel creates the pin directory here
        let err = SysfsBackend::open(&config, &[14]).unwrap_err();
        assert!(matches!(err, HardwareError::Io { .. }));
        assert_eq!(
            fs::read_to_string(config.gpio_root.join("export")).unwrap(),
            "14"
        );
    }

    #[test]
    fn test_sysfs_errors() {
        let (_dir, config) = fake_sysfs(&[12]);
        fs::write(config.iio_device.join("in_voltage0_raw"), "n/a").unwrap();
        fs::write(config.gpio_root.join("gpio12/value"), "2").unwrap();

        let mut backend = SysfsBackend::open(&config, &[12]).unwrap();
        assert!(matches!(backend.read_analog(0), Err(HardwareError::Parse { .. })));
        assert!(matches!(backend.read_analog(7), Err(HardwareError::Io { .. })));
        assert!(matches!(backend.read_digital(12), Err(HardwareError::Parse { .. })));
    }

    #[test]
    fn test_simulated_walk_is_bounded_and_seeded() {
        let mut a = SimulatedBackend::new(42, 1000.0);
        let mut b = SimulatedBackend::new(42, 1000.0);

        let mut previous = 500.0;
        for _ in 0..1000 {
            let x = a.read_analog(0).unwrap();
            assert!((0.0..=1000.0).contains(&x));
            assert!((x - previous).abs() <= 10.0 + 1e-9);
            assert_eq!(x, b.read_analog(0).unwrap());
            previous = x;
        }
    }

    #[test]
    fn test_simulated_controls() {
        let mut sim = SimulatedBackend::new(1, 1000.0);
        assert!(sim.read_digital(13).unwrap());

        sim.set_digital(13, false);
        assert!(!sim.read_digital(13).unwrap());

        sim.hold_analog(3, 12.5);
        assert_eq!(sim.read_analog(3).unwrap(), 12.5);
        sim.release_analog(3);
        assert!(sim.read_analog(3).unwrap() >= 0.0);
    }

    #[test]
    fn test_create_simulated_backend() {
        let mut config = AppConfig::default();
        config.hardware.backend = BackendKind::Simulated;
        config.hardware.seed = 3;

        let backend = create_backend(&config).unwrap();
        assert_eq!(backend.name(), "simulated");
    }
}
