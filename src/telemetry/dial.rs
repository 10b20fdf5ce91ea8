//! A configured analog dial: channel, calibration and output items.

use crate::calibrate::DialMap;
use crate::config::DialConfig;
use crate::core::CalibrationError;

/// One physical dial mapped onto `min..=max` by `step`.
#[derive(Debug, Clone)]
pub struct Dial {
    channel: u32,
    map: DialMap<i64>,
    floor: i64,
    mute_at_floor: bool,
}

impl Dial {
    /// Build the dial described by `config`.
    pub fn new(config: &DialConfig) -> Result<Self, CalibrationError> {
        let step = usize::try_from(config.step)
            .ok()
            .filter(|&step| step > 0)
            .ok_or(CalibrationError::InvalidStep(config.step))?;
        let items: Vec<i64> = (config.min..=config.max).step_by(step).collect();

        Ok(Self {
            channel: config.channel,
            map: DialMap::new(items, config.deadzone, false)?,
            floor: config.min,
            mute_at_floor: config.mute_at_floor,
        })
    }

    /// ADC channel this dial is wired to.
    pub fn channel(&self) -> u32 {
        self.channel
    }

    /// Calibrated value for a raw reading.
    pub fn read(&mut self, raw: f64) -> i64 {
        let value = *self.map.lookup(raw);
        if self.mute_at_floor && value <= self.floor {
            0
        } else {
            value
        }
    }

    /// Underlying quantizer.
    pub fn map(&self) -> &DialMap<i64> {
        &self.map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(min: i64, max: i64, step: i64) -> DialConfig {
        DialConfig {
            min,
            max,
            step,
            deadzone: 0.0,
            ..DialConfig::default()
        }
    }

    #[test]
    fn test_items_follow_step() {
        let dial = Dial::new(&config(0, 100, 25)).unwrap();
        assert_eq!(dial.map().items(), &[0, 25, 50, 75, 100]);

        let dial = Dial::new(&config(15, 180, 1)).unwrap();
        assert_eq!(dial.map().items().len(), 166);
        assert_eq!(dial.map().span(), 332);
    }

    #[test]
    fn test_full_sweep_reaches_both_ends() {
        let mut dial = Dial::new(&config(0, 100, 25)).unwrap();
        assert_eq!(dial.read(0.0), 0);
        assert_eq!(dial.read(1000.0), 100);
        assert_eq!(dial.read(500.0), 50);
    }

    #[test]
    fn test_mute_at_floor() {
        let mut dial = Dial::new(&DialConfig {
            mute_at_floor: true,
            ..config(15, 180, 15)
        })
        .unwrap();

        assert_eq!(dial.read(0.0), 0);
        assert_eq!(dial.read(1000.0), 180);
        assert_eq!(dial.read(0.0), 0);
    }

    #[test]
    fn test_bad_configs() {
        assert_eq!(
            Dial::new(&config(0, 10, 0)).unwrap_err(),
            CalibrationError::InvalidStep(0)
        );
        assert!(matches!(
            Dial::new(&config(5, 5, 1)),
            Err(CalibrationError::TooFewItems { count: 1 })
        ));
    }
}
