//! Output limiter with per-sample gain interpolation and hard clipping.

use crate::common::{
    MAX_FLOAT_S16_VALUE, MAXIMAL_NUMBER_OF_SAMPLES_PER_FRAME, MIN_FLOAT_S16_VALUE,
    SUB_FRAMES_IN_FRAME, frame_len,
};
use crate::limiter_gain_curve::LimiterGainCurve;
use crate::peak_envelope::PeakEnvelope;

/// Power used for interpolation of the first sub-frame during attack.
/// Reduces the chances of over-shooting (and hence saturation).
const ATTACK_FIRST_SUBFRAME_INTERPOLATION_POWER: f32 = 8.0;

fn interpolate_first_subframe(last_factor: f32, current_factor: f32, subframe: &mut [f32]) {
    let n = subframe.len() as f32;
    let p = ATTACK_FIRST_SUBFRAME_INTERPOLATION_POWER;
    for (i, factor) in subframe.iter_mut().enumerate() {
        let t = i as f32 / n;
        *factor = (1.0 - t).powf(p) * (last_factor - current_factor) + current_factor;
    }
}

fn compute_per_sample_subframe_factors(
    scaling_factors: &[f32],
    per_sample_scaling_factors: &mut [f32],
) {
    let num_subframes = scaling_factors.len() - 1;
    let subframe_size = per_sample_scaling_factors.len() / num_subframes;
    debug_assert_eq!(per_sample_scaling_factors.len() % num_subframes, 0);

    // Handle first sub-frame differently in case of attack.
    let is_attack = scaling_factors[0] > scaling_factors[1];
    if is_attack {
        interpolate_first_subframe(
            scaling_factors[0],
            scaling_factors[1],
            &mut per_sample_scaling_factors[..subframe_size],
        );
    }

    let start = usize::from(is_attack);
    for (i, subframe) in per_sample_scaling_factors
        .chunks_exact_mut(subframe_size)
        .enumerate()
        .skip(start)
    {
        let scaling_start = scaling_factors[i];
        let scaling_diff = (scaling_factors[i + 1] - scaling_start) / subframe_size as f32;
        for (j, factor) in subframe.iter_mut().enumerate() {
            *factor = scaling_start + scaling_diff * j as f32;
        }
    }
}

fn scale_samples(per_sample_scaling_factors: &[f32], signal: &mut [f32]) {
    debug_assert_eq!(signal.len(), per_sample_scaling_factors.len());
    for (sample, &factor) in signal.iter_mut().zip(per_sample_scaling_factors) {
        *sample = (*sample * factor).clamp(MIN_FLOAT_S16_VALUE, MAX_FLOAT_S16_VALUE);
    }
}

/// Keeps FloatS16 frames inside the 16-bit range with a smooth gain
/// reduction near full scale.
#[derive(Debug)]
pub(crate) struct Limiter {
    gain_curve: LimiterGainCurve,
    envelope: PeakEnvelope,
    scaling_factors: [f32; SUB_FRAMES_IN_FRAME + 1],
    per_sample_scaling_factors: [f32; MAXIMAL_NUMBER_OF_SAMPLES_PER_FRAME],
    samples_in_frame: usize,
    last_scaling_factor: f32,
    min_scaling_factor: f32,
}

impl Limiter {
    pub(crate) fn new(sample_rate_hz: u32) -> Self {
        let samples_in_frame = frame_len(sample_rate_hz);
        debug_assert!(samples_in_frame <= MAXIMAL_NUMBER_OF_SAMPLES_PER_FRAME);
        Self {
            gain_curve: LimiterGainCurve::default(),
            envelope: PeakEnvelope::new(sample_rate_hz),
            scaling_factors: [1.0; SUB_FRAMES_IN_FRAME + 1],
            per_sample_scaling_factors: [1.0; MAXIMAL_NUMBER_OF_SAMPLES_PER_FRAME],
            samples_in_frame,
            last_scaling_factor: 1.0,
            min_scaling_factor: 1.0,
        }
    }

    /// Applies the limiter and hard-clips `signal` to the FloatS16 range.
    pub(crate) fn process(&mut self, signal: &mut [f32]) {
        debug_assert_eq!(signal.len(), self.samples_in_frame);
        let envelope = self.envelope.compute_envelope(signal);

        self.scaling_factors[0] = self.last_scaling_factor;
        for (factor, &level) in self.scaling_factors[1..].iter_mut().zip(&envelope) {
            *factor = self.gain_curve.gain_to_apply(level);
        }
        self.min_scaling_factor = self.scaling_factors[1..]
            .iter()
            .fold(1.0_f32, |min, &f| min.min(f));

        let per_sample_scaling_factors =
            &mut self.per_sample_scaling_factors[..self.samples_in_frame];
        compute_per_sample_subframe_factors(&self.scaling_factors, per_sample_scaling_factors);
        scale_samples(per_sample_scaling_factors, signal);

        self.last_scaling_factor = self.scaling_factors[SUB_FRAMES_IN_FRAME];
    }

    /// Smallest sub-frame gain of the last frame (1 when idle).
    pub(crate) fn min_scaling_factor(&self) -> f32 {
        self.min_scaling_factor
    }

    pub(crate) fn reset(&mut self) {
        self.envelope.reset();
        self.last_scaling_factor = 1.0;
        self.min_scaling_factor = 1.0;
    }
}
