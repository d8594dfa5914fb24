//! Recommends the volume of an external analog gain stage.
//!
//! Used in [`Mode::AdaptiveAnalog`](crate::Mode::AdaptiveAnalog). The
//! recommendation moves once per update period, by an amount derived from the
//! slow level error, and drops immediately when the input clips.

use crate::common::{
    ANALOG_CLIPPED_LEVEL_STEP, ANALOG_CLIPPED_RATIO_THRESHOLD, ANALOG_GAIN_RANGE_DB,
    ANALOG_MAX_ABS_LEVEL_ERROR_DB, ANALOG_SPEECH_RATIO_THRESHOLD, ANALOG_UPDATE_WAIT_FRAMES,
    ANALOG_VOLUME_QUANTIZATION_SLACK, MAX_FLOAT_S16_VALUE, MIN_FLOAT_S16_VALUE,
};
use crate::config::AnalogLevelLimits;

/// Returns the proportion of samples at full scale (and presumably clipped).
pub(crate) fn compute_clipped_ratio(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    let num_clipped = frame
        .iter()
        .filter(|&&s| s >= MAX_FLOAT_S16_VALUE || s <= MIN_FLOAT_S16_VALUE)
        .count();
    num_clipped as f32 / frame.len() as f32
}

#[derive(Debug)]
pub(crate) struct AnalogLevelRecommender {
    limits: AnalogLevelLimits,
    target_dbfs: f32,
    /// dB of analog gain per volume step.
    step_db: f32,
    /// Upper bound, lowered after clipping.
    max_level: i32,
    recommended_level: i32,
    last_recommended_level: i32,
    frames_since_update: i32,
    speech_frames_since_update: i32,
    saturation_warning: bool,
}

impl AnalogLevelRecommender {
    pub(crate) fn new(limits: AnalogLevelLimits, target_dbfs: f32) -> Self {
        let initial_level = limits.minimum + (limits.maximum - limits.minimum) / 2;
        Self {
            limits,
            target_dbfs,
            step_db: step_db(limits),
            max_level: limits.maximum,
            recommended_level: initial_level,
            last_recommended_level: initial_level,
            frames_since_update: 0,
            speech_frames_since_update: 0,
            saturation_warning: false,
        }
    }

    /// Takes new limits and target, keeping the current level when it still
    /// fits.
    pub(crate) fn configure(&mut self, limits: AnalogLevelLimits, target_dbfs: f32) {
        self.target_dbfs = target_dbfs;
        if limits == self.limits {
            return;
        }
        self.limits = limits;
        self.step_db = step_db(limits);
        self.max_level = limits.maximum;
        let level = self.recommended_level.clamp(limits.minimum, limits.maximum);
        self.recommended_level = level;
        self.last_recommended_level = level;
        self.reset_counters();
    }

    /// Records the volume the caller applied. A level far from the last
    /// recommendation is taken as a manual adjustment and becomes the new
    /// reference.
    pub(crate) fn set_applied_level(&mut self, level: i32) {
        debug_assert!(self.limits.contains(level));
        if (level - self.last_recommended_level).abs() > ANALOG_VOLUME_QUANTIZATION_SLACK {
            tracing::debug!(
                level,
                last_recommended_level = self.last_recommended_level,
                "manual analog level change detected"
            );
            self.last_recommended_level = level;
            self.recommended_level = level;
            self.max_level = self.max_level.max(level);
            self.reset_counters();
        }
    }

    pub(crate) fn recommended_level(&self) -> i32 {
        self.recommended_level
    }

    #[cfg(test)]
    pub(crate) fn saturation_warning(&self) -> bool {
        self.saturation_warning
    }

    /// Feeds one frame's analysis.
    pub(crate) fn process(&mut self, slow_level_dbfs: f32, voice_active: bool, clipped_ratio: f32) {
        self.saturation_warning = clipped_ratio >= ANALOG_CLIPPED_RATIO_THRESHOLD;
        if self.saturation_warning {
            self.handle_clipping();
            return;
        }

        if voice_active {
            self.speech_frames_since_update += 1;
        }
        self.frames_since_update += 1;
        if self.frames_since_update < ANALOG_UPDATE_WAIT_FRAMES {
            return;
        }

        let speech_ratio =
            self.speech_frames_since_update as f32 / ANALOG_UPDATE_WAIT_FRAMES as f32;
        self.reset_counters();
        if speech_ratio >= ANALOG_SPEECH_RATIO_THRESHOLD {
            let error_db = (self.target_dbfs - slow_level_dbfs)
                .clamp(-ANALOG_MAX_ABS_LEVEL_ERROR_DB, ANALOG_MAX_ABS_LEVEL_ERROR_DB);
            let steps = (error_db / self.step_db).round() as i32;
            self.set_level(self.last_recommended_level + steps);
        }
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::new(self.limits, self.target_dbfs);
    }

    fn handle_clipping(&mut self) {
        self.max_level = self
            .limits
            .minimum
            .max(self.max_level - ANALOG_CLIPPED_LEVEL_STEP);
        self.set_level(self.last_recommended_level - ANALOG_CLIPPED_LEVEL_STEP);
        self.reset_counters();
    }

    fn set_level(&mut self, level: i32) {
        let level = level.clamp(self.limits.minimum, self.max_level);
        self.recommended_level = level;
        self.last_recommended_level = level;
    }

    fn reset_counters(&mut self) {
        self.frames_since_update = 0;
        self.speech_frames_since_update = 0;
    }
}

fn step_db(limits: AnalogLevelLimits) -> f32 {
    debug_assert!(limits.maximum > limits.minimum);
    ANALOG_GAIN_RANGE_DB / (limits.maximum - limits.minimum) as f32
}
