//! Dead-zone quantization of normalized dial input.
//!
//! A dial's normalized domain `[0, span]` is cut into `count` equal zones,
//! one per output item. Each internal boundary loses a band of
//! `zone_width * deadzone / 100` from the upper edge of the zone below it.
//! Points in that band belong to no zone; a lookup landing there returns
//! whatever was returned last, which keeps a dial hovering on a boundary
//! from flickering between neighbours.

use std::cmp::Ordering;

use super::normalizer::Normalizer;
use crate::core::{CalibrationError, DEFAULT_DIAL_SPAN, WIDE_DIAL_THRESHOLD};

/// Half-open integer range `[start, end)` of domain points owned by one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Zone {
    /// First point in the zone.
    pub start: i64,
    /// One past the last point in the zone.
    pub end: i64,
}

impl Zone {
    fn new(start: i64, end: i64) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    /// Whether `point` falls inside this zone.
    pub fn contains(&self, point: i64) -> bool {
        self.start <= point && point < self.end
    }

    /// Number of points in the zone.
    pub fn width(&self) -> i64 {
        self.end - self.start
    }
}

/// Quantizes raw dial samples into one of `count` ordered items.
#[derive(Debug, Clone)]
pub struct DialMap<T> {
    normalizer: Normalizer,
    zones: Vec<Zone>,
    items: Vec<T>,
    current: T,
}

impl<T: Clone + PartialOrd> DialMap<T> {
    /// Build a dial map over `items`.
    ///
    /// `deadzone_percent` must lie in `[0, 100)`. With `autosort`, items are
    /// sorted ascending first so the lowest zone maps to the smallest item.
    /// The first item *as given* is the value returned before any sample
    /// lands inside a zone.
    pub fn new(
        items: Vec<T>,
        deadzone_percent: f64,
        autosort: bool,
    ) -> Result<Self, CalibrationError> {
        let count = items.len();
        if count < 2 {
            return Err(CalibrationError::TooFewItems { count });
        }
        if !(0.0..100.0).contains(&deadzone_percent) {
            return Err(CalibrationError::InvalidDeadzone(deadzone_percent));
        }

        let current = items[0].clone();
        let mut items = items;
        if autosort {
            items.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        }

        let span = span_for(count);
        let normalizer = Normalizer::new(0.0, span as f64)?;
        let zones = build_zones(span, count, deadzone_percent);

        Ok(Self {
            normalizer,
            zones,
            items,
            current,
        })
    }

    /// Map a raw sample to an item.
    ///
    /// Samples landing in a dead zone, and non-finite samples, return the
    /// previously selected item unchanged.
    pub fn lookup(&mut self, raw: f64) -> &T {
        if let Some(point) = self.domain_point(raw) {
            if let Some(index) = self.zone_index(point) {
                self.current = self.items[index].clone();
            }
        }
        &self.current
    }
}

impl<T> DialMap<T> {
    /// Normalize `raw` and truncate it onto the integer domain.
    fn domain_point(&mut self, raw: f64) -> Option<i64> {
        let normalized = self.normalizer.normalize(raw);
        normalized.is_finite().then(|| normalized.trunc() as i64)
    }

    /// Index of the zone owning `point`, if any.
    fn zone_index(&self, point: i64) -> Option<usize> {
        let index = self.zones.partition_point(|zone| zone.end <= point);
        self.zones
            .get(index)
            .filter(|zone| zone.contains(point))
            .map(|_| index)
    }

    /// Width of the normalized domain.
    pub fn span(&self) -> i64 {
        span_for(self.items.len())
    }

    /// Zones in ascending order, one per item.
    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    /// Items in zone order.
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Most recently selected item.
    pub fn current(&self) -> &T {
        &self.current
    }

    /// The underlying normalizer.
    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }
}

/// Keeps every zone at least two points wide for large item counts.
fn span_for(count: usize) -> i64 {
    if count > WIDE_DIAL_THRESHOLD {
        2 * count as i64
    } else {
        DEFAULT_DIAL_SPAN
    }
}

/// `num` evenly spaced points over `[start, stop]`, endpoints included.
fn linspace(start: f64, stop: f64, num: usize) -> Vec<f64> {
    let delta = (stop - start) / (num - 1) as f64;
    (0..num)
        .map(|i| if i == num - 1 { stop } else { start + delta * i as f64 })
        .collect()
}

fn build_zones(span: i64, count: usize, deadzone_percent: f64) -> Vec<Zone> {
    let bounds = linspace(0.0, span as f64, count + 1);
    let gap = (bounds[1] - bounds[0]) * (deadzone_percent / 100.0);

    let mut zones: Vec<Zone> = bounds
        .windows(2)
        .take(count - 1)
        .map(|w| Zone::new(w[0] as i64, (w[1] - gap) as i64))
        .collect();

    // Last zone keeps its right edge inclusive and carries no dead band.
    zones.push(Zone::new(bounds[count - 1] as i64, bounds[count] as i64 + 1));
    zones
}
