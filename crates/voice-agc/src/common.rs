//! Shared constants and level conversions.
//!
//! # Sample formats
//!
//! | Name      | Type    | Range                          |
//! |-----------|---------|--------------------------------|
//! | S16       | `i16`   | \[-32768, 32767\]              |
//! | Float     | `f32`   | \[-1.0, 1.0\]                  |
//! | FloatS16  | `f32`   | \[-32768.0, 32768.0\]          |
//! | Dbfs      | `f32`   | \[-90.31, 0\] (approx)         |
//!
//! The engine works on FloatS16 internally; dBFS values are RMS levels
//! relative to a full-scale square wave (32768).

pub const MIN_FLOAT_S16_VALUE: f32 = -32768.0;
pub const MAX_FLOAT_S16_VALUE: f32 = 32767.0;
pub const MAX_ABS_FLOAT_S16_VALUE: f32 = 32768.0;

/// Minimum audio level in dBFS scale for S16 samples.
pub const MIN_LEVEL_DBFS: f32 = -90.31;

pub const FRAME_DURATION_MS: i32 = 10;
pub const SUB_FRAMES_IN_FRAME: usize = 20;

/// Sample rates accepted by `initialize`.
pub const SUPPORTED_SAMPLE_RATES_HZ: [u32; 4] = [8000, 16000, 32000, 48000];
pub const MAXIMAL_NUMBER_OF_SAMPLES_PER_FRAME: usize = 480;

// Level estimator time constants.
pub const FAST_LEVEL_TIME_CONSTANT_MS: f32 = 40.0;
pub const SLOW_LEVEL_RISE_TIME_CONSTANT_MS: f32 = 400.0;
pub const SLOW_LEVEL_FALL_TIME_CONSTANT_MS: f32 = 1000.0;

// Gain controller rate limits.
pub const MAX_GAIN_INCREASE_DB_PER_SECOND: f32 = 10.0;
pub const MAX_GAIN_DECREASE_DB_PER_SECOND: f32 = 30.0;
pub const TRANSIENT_GAIN_DECREASE_DB_PER_SECOND: f32 = 120.0;

/// Projected peak level above which a transient makes the controller stop
/// raising the gain and pull it down at the transient rate.
pub const LIMITER_THRESHOLD_FOR_AGC_GAIN_DBFS: f32 = -1.0;
/// Minimum excess of the fast level over the slow level for a frame to count
/// as a transient. Peaks of steady signals are left to the limiter.
pub const TRANSIENT_LEVEL_RISE_DB: f32 = 6.0;

/// Largest `compression_gain_db` accepted by the configuration.
pub const MAX_COMPRESSION_GAIN_DB: i32 = 90;
/// Largest headroom magnitude accepted for `target_level_dbfs`.
pub const MAX_TARGET_LEVEL_HEADROOM_DB: i32 = 31;

// Voice activity gate.
pub const VOICE_ACTIVITY_THRESHOLD_DBFS: f32 = -60.0;
/// Minimum number of adjacent active frames before the gain may increase.
pub const ADJACENT_SPEECH_FRAMES_THRESHOLD: i32 = 12;

// Limiter gain curve.
pub const LIMITER_MAX_INPUT_LEVEL_DB_FS: f64 = 1.0;
pub const LIMITER_KNEE_SMOOTHNESS_DB: f64 = 1.0;
pub const LIMITER_COMPRESSION_RATIO: f64 = 5.0;
/// Time (ms) for the limiter envelope to fall by 1 dB.
pub const LIMITER_DECAY_MS_PER_DB: f32 = 20.0;

// Analog level recommendation.
pub const MAX_ANALOG_LEVEL: i32 = 65535;
pub const ANALOG_GAIN_RANGE_DB: f32 = 40.0;
pub const ANALOG_UPDATE_WAIT_FRAMES: i32 = 100;
pub const ANALOG_SPEECH_RATIO_THRESHOLD: f32 = 0.8;
pub const ANALOG_MAX_ABS_LEVEL_ERROR_DB: f32 = 15.0;
pub const ANALOG_CLIPPED_RATIO_THRESHOLD: f32 = 0.1;
pub const ANALOG_CLIPPED_LEVEL_STEP: i32 = 15;
/// Volume error tolerated (presumably due to OS quantization) before a level
/// change is treated as a manual adjustment.
pub const ANALOG_VOLUME_QUANTIZATION_SLACK: i32 = 25;

/// Returns the number of samples in one 10 ms frame at `sample_rate_hz`.
#[inline]
pub const fn frame_len(sample_rate_hz: u32) -> usize {
    (sample_rate_hz / 100) as usize
}

/// Converts a dB value to a linear ratio.
#[inline]
pub fn db_to_ratio(v: f32) -> f32 {
    10.0_f32.powf(v / 20.0)
}

/// Converts a linear ratio (> 0) to dB.
#[inline]
pub fn ratio_to_db(v: f32) -> f32 {
    debug_assert!(v > 0.0);
    20.0 * v.log10()
}

/// Converts dBFS to FloatS16 scale.
#[inline]
pub fn dbfs_to_float_s16(v: f32) -> f32 {
    db_to_ratio(v) * MAX_ABS_FLOAT_S16_VALUE
}

pub(crate) fn dbfs_to_float_s16_f64(v: f64) -> f64 {
    10.0_f64.powf(v / 20.0) * MAX_ABS_FLOAT_S16_VALUE as f64
}

/// Converts a FloatS16 amplitude (>= 0) to dBFS, flooring at
/// [`MIN_LEVEL_DBFS`].
#[inline]
pub fn float_s16_to_dbfs(v: f32) -> f32 {
    debug_assert!(v >= 0.0);
    if v <= 1.0 {
        return MIN_LEVEL_DBFS;
    }
    20.0 * v.log10() + MIN_LEVEL_DBFS
}

pub(crate) fn float_s16_to_dbfs_f64(v: f64) -> f64 {
    debug_assert!(v >= 0.0);
    if v <= 1.0 {
        return MIN_LEVEL_DBFS as f64;
    }
    20.0 * v.log10() + MIN_LEVEL_DBFS as f64
}

/// Converts a mean-square FloatS16 energy to an RMS level in dBFS.
#[inline]
pub fn energy_to_dbfs(energy: f32) -> f32 {
    float_s16_to_dbfs(energy.max(0.0).sqrt())
}

/// Converts a FloatS16 sample to S16, rounding to nearest.
#[inline]
pub fn float_s16_to_s16(v: f32) -> i16 {
    let v = v.clamp(MIN_FLOAT_S16_VALUE, MAX_FLOAT_S16_VALUE);
    (v + f32::copysign(0.5, v)) as i16
}

#[inline]
pub fn float_to_float_s16(v: f32) -> f32 {
    v * MAX_ABS_FLOAT_S16_VALUE
}

#[inline]
pub fn float_s16_to_float(v: f32) -> f32 {
    v / MAX_ABS_FLOAT_S16_VALUE
}

/// Returns the per-sample smoothing coefficient of an exponential moving
/// average with time constant `time_constant_ms`.
#[inline]
pub fn smoothing_coefficient(time_constant_ms: f32, sample_rate_hz: u32) -> f32 {
    debug_assert!(time_constant_ms > 0.0);
    (-1000.0 / (time_constant_ms * sample_rate_hz as f32)).exp()
}
