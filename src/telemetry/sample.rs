//! The telemetry record and its wire shape.
//!
//! Samples travel as one compact JSON object per frame:
//!
//! ```text
//! {"volume":120,"brightness":40,"pause":false,"next":false,"prev":false}
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// One reading of every input.
///
/// Button fields are `true` while pressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TelemetrySample {
    /// Calibrated volume dial (0 when muted at the floor).
    pub volume: i64,
    /// Calibrated brightness dial.
    pub brightness: i64,
    /// Play/pause button.
    pub pause: bool,
    /// Next-track button.
    pub next: bool,
    /// Previous-track button.
    pub prev: bool,
}

/// A field of [`TelemetrySample`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// `volume`
    Volume,
    /// `brightness`
    Brightness,
    /// `pause`
    Pause,
    /// `next`
    Next,
    /// `prev`
    Prev,
}

impl Field {
    /// Wire name of the field.
    pub fn name(&self) -> &'static str {
        match self {
            Field::Volume => "volume",
            Field::Brightness => "brightness",
            Field::Pause => "pause",
            Field::Next => "next",
            Field::Prev => "prev",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TelemetrySample {
    /// Fields whose value differs from `previous`, in declaration order.
    pub fn changed_fields(&self, previous: &TelemetrySample) -> Vec<Field> {
        let mut changed = Vec::new();
        if self.volume != previous.volume {
            changed.push(Field::Volume);
        }
        if self.brightness != previous.brightness {
            changed.push(Field::Brightness);
        }
        if self.pause != previous.pause {
            changed.push(Field::Pause);
        }
        if self.next != previous.next {
            changed.push(Field::Next);
        }
        if self.prev != previous.prev {
            changed.push(Field::Prev);
        }
        changed
    }
}
