//! Per-sample gain application with linear ramping between frames.

use crate::common::MAX_FLOAT_S16_VALUE;

/// Returns true when the gain factor is so close to 1 that it would not
/// affect int16 samples.
fn gain_close_to_one(gain_factor: f32) -> bool {
    let threshold = 1.0 / MAX_FLOAT_S16_VALUE;
    (1.0 - threshold..=1.0 + threshold).contains(&gain_factor)
}

fn apply_gain_with_ramping(last_gain: f32, gain_at_end: f32, signal: &mut [f32]) {
    if last_gain == gain_at_end {
        if !gain_close_to_one(gain_at_end) {
            for sample in signal.iter_mut() {
                *sample *= gain_at_end;
            }
        }
        return;
    }

    // Ramp linearly to avoid discontinuities.
    let increment = (gain_at_end - last_gain) / signal.len() as f32;
    let mut gain = last_gain;
    for sample in signal.iter_mut() {
        *sample *= gain;
        gain += increment;
    }
}

/// Applies a linear gain factor, ramping from the previous frame's factor to
/// the current one across the frame.
#[derive(Debug)]
pub(crate) struct GainApplier {
    last_gain_factor: f32,
    current_gain_factor: f32,
}

impl GainApplier {
    pub(crate) fn new(initial_gain_factor: f32) -> Self {
        debug_assert!(initial_gain_factor > 0.0);
        Self {
            last_gain_factor: initial_gain_factor,
            current_gain_factor: initial_gain_factor,
        }
    }

    pub(crate) fn apply_gain(&mut self, signal: &mut [f32]) {
        if signal.is_empty() {
            return;
        }
        apply_gain_with_ramping(self.last_gain_factor, self.current_gain_factor, signal);
        self.last_gain_factor = self.current_gain_factor;
    }

    /// Sets the factor reached at the end of the next frame.
    pub(crate) fn set_gain_factor(&mut self, gain_factor: f32) {
        debug_assert!(gain_factor > 0.0);
        self.current_gain_factor = gain_factor;
    }

    #[cfg(test)]
    pub(crate) fn gain_factor(&self) -> f32 {
        self.current_gain_factor
    }
}
