//! Fast and slow signal level tracking.
//!
//! The fast envelope is a per-sample exponential moving average of the
//! squared signal. The slow envelope is updated once per frame from the frame
//! mean square, rising faster than it falls. Smoothing coefficients are
//! derived from the sample rate so the time constants are rate independent.

use crate::common::{
    FAST_LEVEL_TIME_CONSTANT_MS, MIN_LEVEL_DBFS, SLOW_LEVEL_FALL_TIME_CONSTANT_MS,
    SLOW_LEVEL_RISE_TIME_CONSTANT_MS, energy_to_dbfs, float_s16_to_dbfs, frame_len,
    smoothing_coefficient,
};

/// Level estimates for one frame, in RMS dBFS (peak in peak dBFS).
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct LevelEstimate {
    /// Short-term level (tens of milliseconds).
    pub(crate) fast_dbfs: f32,
    /// Long-term level (around a second).
    pub(crate) slow_dbfs: f32,
    /// Largest absolute sample of the frame.
    pub(crate) peak_dbfs: f32,
}

impl LevelEstimate {
    pub(crate) const SILENCE: Self = Self {
        fast_dbfs: MIN_LEVEL_DBFS,
        slow_dbfs: MIN_LEVEL_DBFS,
        peak_dbfs: MIN_LEVEL_DBFS,
    };
}

/// Tracks fast and slow energy envelopes of a FloatS16 stream.
#[derive(Debug)]
pub(crate) struct LevelEstimator {
    fast_energy: f32,
    slow_energy: f32,
    fast_coefficient: f32,
    slow_rise_coefficient: f32,
    slow_fall_coefficient: f32,
    samples_in_frame: usize,
    last_estimate: LevelEstimate,
}

impl LevelEstimator {
    pub(crate) fn new(sample_rate_hz: u32) -> Self {
        let samples_in_frame = frame_len(sample_rate_hz);
        let per_frame = |time_constant_ms| {
            smoothing_coefficient(time_constant_ms, sample_rate_hz).powi(samples_in_frame as i32)
        };
        Self {
            fast_energy: 0.0,
            slow_energy: 0.0,
            fast_coefficient: smoothing_coefficient(FAST_LEVEL_TIME_CONSTANT_MS, sample_rate_hz),
            slow_rise_coefficient: per_frame(SLOW_LEVEL_RISE_TIME_CONSTANT_MS),
            slow_fall_coefficient: per_frame(SLOW_LEVEL_FALL_TIME_CONSTANT_MS),
            samples_in_frame,
            last_estimate: LevelEstimate::SILENCE,
        }
    }

    /// Updates the envelopes with a FloatS16 frame and returns the new
    /// estimates.
    pub(crate) fn compute_level(&mut self, frame: &[f32]) -> LevelEstimate {
        debug_assert_eq!(frame.len(), self.samples_in_frame);

        let mut peak = 0.0_f32;
        let mut sum_of_squares = 0.0_f32;
        let a = self.fast_coefficient;
        for &sample in frame {
            let power = sample * sample;
            self.fast_energy = a * self.fast_energy + (1.0 - a) * power;
            sum_of_squares += power;
            peak = peak.max(sample.abs());
        }

        let frame_energy = sum_of_squares / self.samples_in_frame as f32;
        let b = if frame_energy > self.slow_energy {
            self.slow_rise_coefficient
        } else {
            self.slow_fall_coefficient
        };
        self.slow_energy = b * self.slow_energy + (1.0 - b) * frame_energy;

        self.last_estimate = LevelEstimate {
            fast_dbfs: energy_to_dbfs(self.fast_energy),
            slow_dbfs: energy_to_dbfs(self.slow_energy),
            peak_dbfs: float_s16_to_dbfs(peak),
        };
        self.last_estimate
    }

    #[cfg(test)]
    pub(crate) fn last_estimate(&self) -> LevelEstimate {
        self.last_estimate
    }
}
