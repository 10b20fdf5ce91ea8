//! Muro - Core constants and error types.
//!
//! This module has no I/O and no optional dependencies; every other layer
//! builds on the defaults and error aggregation defined here.

mod constants;
mod error;

pub use constants::*;
pub use error::*;
