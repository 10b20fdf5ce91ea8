//! Online min/max normalization.

use crate::core::CalibrationError;

/// Rescales an a-priori-unbounded input stream into `[start, stop]`.
///
/// Bounds are learned purely from observed extrema, both starting at `0`.
/// `min` never increases and `max` never decreases. While the observed range
/// has zero width the output is pinned to `start`.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalizer {
    start: f64,
    stop: f64,
    min: f64,
    max: f64,
    /// `(stop - start) / (max - min)`, absent while `max == min`.
    ratio: Option<f64>,
}

impl Normalizer {
    /// Create a normalizer targeting `[start, stop]`.
    pub fn new(start: f64, stop: f64) -> Result<Self, CalibrationError> {
        if !(start.is_finite() && stop.is_finite() && stop > start) {
            return Err(CalibrationError::EmptyOutputRange { start, stop });
        }

        Ok(Self {
            start,
            stop,
            min: 0.0,
            max: 0.0,
            ratio: None,
        })
    }

    /// Normalize `x`, widening the calibrated range first if `x` lies outside it.
    ///
    /// Non-finite input never touches the calibration and maps to NaN.
    pub fn normalize(&mut self, x: f64) -> f64 {
        if !x.is_finite() {
            return f64::NAN;
        }

        self.widen(x);

        match self.ratio {
            Some(ratio) => (x - self.min) * ratio + self.start,
            None => self.start,
        }
    }

    fn widen(&mut self, x: f64) {
        if x < self.min {
            self.min = x;
            self.refresh_ratio();
        } else if x > self.max {
            self.max = x;
            self.refresh_ratio();
        }
    }

    fn refresh_ratio(&mut self) {
        let width = self.max - self.min;
        self.ratio = (width > 0.0).then(|| (self.stop - self.start) / width);
    }

    /// Smallest input observed so far.
    pub fn min(&self) -> f64 {
        self.min
    }

    /// Largest input observed so far.
    pub fn max(&self) -> f64 {
        self.max
    }

    /// Target interval as `(start, stop)`.
    pub fn output_range(&self) -> (f64, f64) {
        (self.start, self.stop)
    }

    /// Whether the observed range has non-zero width.
    pub fn is_calibrated(&self) -> bool {
        self.ratio.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_zero_width_pins_to_start() {
        let mut nm = Normalizer::new(10.0, 20.0).unwrap();

        // min == max == 0 on a fresh instance
        assert_eq!(nm.normalize(0.0), 10.0);
        assert!(!nm.is_calibrated());
    }

    #[test]
    fn test_widens_on_new_extrema() {
        let mut nm = Normalizer::new(0.0, 100.0).unwrap();

        assert_eq!(nm.normalize(200.0), 100.0);
        assert_eq!(nm.max(), 200.0);
        assert_eq!(nm.normalize(100.0), 50.0);

        assert_eq!(nm.normalize(-200.0), 0.0);
        assert_eq!(nm.min(), -200.0);
        assert_eq!(nm.normalize(0.0), 50.0);
    }

    #[test]
    fn test_range_never_narrows() {
        let mut nm = Normalizer::new(0.0, 1.0).unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        let mut last_min = nm.min();
        let mut last_max = nm.max();
        for _ in 0..1000 {
            nm.normalize(rng.gen_range(-5000.0..5000.0));
            assert!(nm.min() <= last_min);
            assert!(nm.max() >= last_max);
            last_min = nm.min();
            last_max = nm.max();
        }
    }

    #[test]
    fn test_output_within_interval_once_calibrated() {
        let mut nm = Normalizer::new(15.0, 181.0).unwrap();
        let mut rng = StdRng::seed_from_u64(42);

        for _ in 0..1000 {
            let y = nm.normalize(rng.gen_range(-20000.0..20000.0));
            if nm.is_calibrated() {
                assert!(y >= 15.0 - 1e-9 && y <= 181.0 + 1e-9, "{y} out of range");
            }
        }
    }

    #[test]
    fn test_monotonic_for_fixed_bounds() {
        let mut nm = Normalizer::new(0.0, 100.0).unwrap();
        nm.normalize(-1000.0);
        nm.normalize(1000.0);

        let mut prev = f64::NEG_INFINITY;
        for x in (-1000..=1000).step_by(10) {
            let y = nm.normalize(x as f64);
            assert!(y > prev);
            prev = y;
        }
    }

    #[test]
    fn test_non_finite_input_ignored() {
        let mut nm = Normalizer::new(0.0, 100.0).unwrap();
        nm.normalize(50.0);

        assert!(nm.normalize(f64::NAN).is_nan());
        assert!(nm.normalize(f64::INFINITY).is_nan());
        assert_eq!(nm.max(), 50.0);
    }

    #[test]
    fn test_rejects_empty_interval() {
        assert!(matches!(
            Normalizer::new(5.0, 5.0),
            Err(CalibrationError::EmptyOutputRange { .. })
        ));
        assert!(Normalizer::new(10.0, 0.0).is_err());
    }
}
