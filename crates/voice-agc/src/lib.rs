//! Automatic gain control for mono 16-bit voice streams.
//!
//! An [`Agc`] tracks the long-term level of the incoming signal and adjusts a
//! digital gain so the output approaches a target level, with asymmetric
//! rate limits, transient protection and an output limiter that keeps
//! samples inside the 16-bit range.
//!
//! ```
//! use voice_agc::{Agc, Config};
//!
//! let mut agc = Agc::create()?;
//! let config = Config::default()
//!     .with_compression_gain_db(12)
//!     .with_target_level_dbfs(-3);
//! agc.initialize(16000, &config)?;
//!
//! let mut frame = [0_i16; 160];
//! agc.process(&mut frame)?;
//! agc.release()?;
//! # Ok::<(), voice_agc::Error>(())
//! ```

mod analog_level;
pub mod common;
mod config;
mod error;
mod gain_applier;
mod gain_controller;
mod level_estimator;
mod limiter;
mod limiter_gain_curve;
mod peak_envelope;
mod stats;
mod stream;
mod voice_activity;

pub use config::{AnalogLevelLimits, Config, Mode};
pub use error::{ConfigError, Error, Result};
pub use stats::AgcStats;
pub use stream::{Agc, State};
