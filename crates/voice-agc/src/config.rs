//! Stream configuration.
//!
//! A [`Config`] is validated as a whole at `initialize` and `reconfigure`;
//! a rejected configuration leaves the instance untouched.

use crate::common::{MAX_ANALOG_LEVEL, MAX_COMPRESSION_GAIN_DB, MAX_TARGET_LEVEL_HEADROOM_DB};
use crate::error::ConfigError;

/// How the controller turns level estimates into gain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Mode {
    /// Constant digital gain of `compression_gain_db`, no adaptation.
    FixedDigital,
    /// Gain adapts on the digital signal only.
    #[default]
    AdaptiveDigital,
    /// Adaptation drives an external analog gain stage through
    /// [`Agc::recommended_analog_level`](crate::Agc::recommended_analog_level);
    /// the digital gain stays at unity.
    AdaptiveAnalog,
}

/// Volume range of the external analog gain stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AnalogLevelLimits {
    pub minimum: i32,
    pub maximum: i32,
}

impl Default for AnalogLevelLimits {
    fn default() -> Self {
        Self {
            minimum: 0,
            maximum: 255,
        }
    }
}

impl AnalogLevelLimits {
    pub(crate) fn contains(&self, level: i32) -> bool {
        (self.minimum..=self.maximum).contains(&level)
    }
}

/// Parameters of one AGC stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Config {
    /// Maximum gain (dB) the controller may apply above unity.
    pub compression_gain_db: i32,
    /// Desired long-term level. The magnitude is the headroom below full
    /// scale: `3` and `-3` both mean -3 dBFS.
    pub target_level_dbfs: i32,
    /// Whether the limiter stage runs.
    pub limiter_enabled: bool,
    pub mode: Mode,
    /// Only used in [`Mode::AdaptiveAnalog`].
    pub analog_level_limits: AnalogLevelLimits,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            compression_gain_db: 9,
            target_level_dbfs: -3,
            limiter_enabled: true,
            mode: Mode::AdaptiveDigital,
            analog_level_limits: AnalogLevelLimits::default(),
        }
    }
}

impl Config {
    pub fn with_compression_gain_db(mut self, compression_gain_db: i32) -> Self {
        self.compression_gain_db = compression_gain_db;
        self
    }

    pub fn with_target_level_dbfs(mut self, target_level_dbfs: i32) -> Self {
        self.target_level_dbfs = target_level_dbfs;
        self
    }

    pub fn with_limiter(mut self, limiter_enabled: bool) -> Self {
        self.limiter_enabled = limiter_enabled;
        self
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_analog_level_limits(mut self, minimum: i32, maximum: i32) -> Self {
        self.analog_level_limits = AnalogLevelLimits { minimum, maximum };
        self
    }

    /// Checks every field; the first violation found is returned.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.compression_gain_db < 0 {
            return Err(ConfigError::NegativeCompressionGain(
                self.compression_gain_db,
            ));
        }
        if self.compression_gain_db > MAX_COMPRESSION_GAIN_DB {
            return Err(ConfigError::CompressionGainTooLarge(
                self.compression_gain_db,
            ));
        }
        if self.target_level_dbfs.unsigned_abs() > MAX_TARGET_LEVEL_HEADROOM_DB.unsigned_abs() {
            return Err(ConfigError::TargetLevelOutOfRange(self.target_level_dbfs));
        }
        let AnalogLevelLimits { minimum, maximum } = self.analog_level_limits;
        if minimum < 0 || maximum > MAX_ANALOG_LEVEL || minimum >= maximum {
            return Err(ConfigError::InvalidAnalogLevelLimits { minimum, maximum });
        }
        Ok(())
    }

    /// The target level as a (non-positive) dBFS value.
    pub fn target_dbfs(&self) -> f32 {
        -(self.target_level_dbfs.unsigned_abs() as f32)
    }
}
