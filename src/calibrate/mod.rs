//! Muro - Calibration Layer
//!
//! Turns raw, unbounded analog samples into stable selections:
//!
//! - [`Normalizer`]: online min/max rescaler that widens as it observes input
//! - [`DialMap`]: quantizer over a normalizer with dead-zone hysteresis
//!
//! ```text
//! raw sample ──► Normalizer ──► domain point ──► Zone ──► item
//!                 (widens)       (truncated)     (or dead zone ⇒ last item)
//! ```
//!
//! Neither type has a reset; recalibrating means building a fresh instance.

mod dialmap;
mod normalizer;

pub use dialmap::*;
pub use normalizer::*;
