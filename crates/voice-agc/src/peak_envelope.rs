//! Sub-frame peak envelope that drives the limiter.
//!
//! Each 10 ms frame is split into [`SUB_FRAMES_IN_FRAME`] sub-frames. The
//! envelope follows the sub-frame peaks with instant attack and an
//! exponential release of [`LIMITER_DECAY_MS_PER_DB`].

use crate::common::{FRAME_DURATION_MS, LIMITER_DECAY_MS_PER_DB, SUB_FRAMES_IN_FRAME, frame_len};

const SUB_FRAME_DURATION_MS: f32 = FRAME_DURATION_MS as f32 / SUB_FRAMES_IN_FRAME as f32;

/// Per-sub-frame release factor, `10 ** (-sub_frame_ms / decay_ms_per_db / 20)`.
fn decay_filter_constant() -> f32 {
    10.0_f32.powf(-SUB_FRAME_DURATION_MS / LIMITER_DECAY_MS_PER_DB / 20.0)
}

#[derive(Debug)]
pub(crate) struct PeakEnvelope {
    filter_state_level: f32,
    decay_filter_constant: f32,
    samples_in_sub_frame: usize,
}

impl PeakEnvelope {
    pub(crate) fn new(sample_rate_hz: u32) -> Self {
        let samples_in_frame = frame_len(sample_rate_hz);
        debug_assert_eq!(samples_in_frame % SUB_FRAMES_IN_FRAME, 0);
        let samples_in_sub_frame = samples_in_frame / SUB_FRAMES_IN_FRAME;
        debug_assert!(samples_in_sub_frame > 1);
        Self {
            filter_state_level: 0.0,
            decay_filter_constant: decay_filter_constant(),
            samples_in_sub_frame,
        }
    }

    /// Returns one smoothed peak level (FloatS16) per sub-frame of `frame`.
    pub(crate) fn compute_envelope(&mut self, frame: &[f32]) -> [f32; SUB_FRAMES_IN_FRAME] {
        debug_assert_eq!(frame.len(), self.samples_in_sub_frame * SUB_FRAMES_IN_FRAME);

        let mut envelope = [0.0_f32; SUB_FRAMES_IN_FRAME];
        for (env, sub_frame) in envelope
            .iter_mut()
            .zip(frame.chunks_exact(self.samples_in_sub_frame))
        {
            *env = sub_frame.iter().fold(0.0_f32, |peak, s| peak.max(s.abs()));
        }

        // Raise the envelope one sub-frame early so the gain interpolation
        // has already come down when a sudden peak arrives.
        for sub_frame in 0..SUB_FRAMES_IN_FRAME - 1 {
            if envelope[sub_frame] < envelope[sub_frame + 1] {
                envelope[sub_frame] = envelope[sub_frame + 1];
            }
        }

        for env in &mut envelope {
            if *env < self.filter_state_level {
                *env = *env * (1.0 - self.decay_filter_constant)
                    + self.filter_state_level * self.decay_filter_constant;
            }
            self.filter_state_level = *env;
        }

        envelope
    }

    pub(crate) fn reset(&mut self) {
        self.filter_state_level = 0.0;
    }

    #[cfg(test)]
    pub(crate) fn last_level(&self) -> f32 {
        self.filter_state_level
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{SUPPORTED_SAMPLE_RATES_HZ, dbfs_to_float_s16};

    const INPUT_LEVEL: f32 = 10000.0;

    #[test]
    fn constant_level_is_tracked() {
        for rate in SUPPORTED_SAMPLE_RATES_HZ {
            let mut envelope = PeakEnvelope::new(rate);
            let frame = vec![INPUT_LEVEL; frame_len(rate)];
            for _ in 0..50 {
                for level in envelope.compute_envelope(&frame) {
                    assert!((level - INPUT_LEVEL).abs() <= INPUT_LEVEL * 0.01);
                }
            }
            assert_eq!(envelope.last_level(), INPUT_LEVEL);
        }
    }

    #[test]
    fn attack_is_instant_and_one_sub_frame_early() {
        let mut envelope = PeakEnvelope::new(16000);
        let mut frame = vec![0.0_f32; 160];
        // Peak in the sixth sub-frame (8 samples each).
        frame[5 * 8 + 3] = -INPUT_LEVEL;
        let levels = envelope.compute_envelope(&frame);
        assert_eq!(levels[3], 0.0);
        assert_eq!(levels[4], INPUT_LEVEL);
        assert_eq!(levels[5], INPUT_LEVEL);
        assert!(levels[6] < INPUT_LEVEL);
    }

    /// Milliseconds for the envelope to fall by `level_reduction_db`.
    fn time_ms_to_decrease_level(sample_rate_hz: u32, level_reduction_db: f32) -> f32 {
        let input_level_db = -40.0;
        let mut envelope = PeakEnvelope::new(sample_rate_hz);
        let frame = vec![dbfs_to_float_s16(input_level_db); frame_len(sample_rate_hz)];
        for _ in 0..50 {
            envelope.compute_envelope(&frame);
        }

        let silence = vec![0.0_f32; frame_len(sample_rate_hz)];
        let reduced_level = dbfs_to_float_s16(input_level_db - level_reduction_db);
        let mut last_level = envelope.last_level();
        let mut sub_frames = 0;
        'outer: loop {
            for level in envelope.compute_envelope(&silence) {
                assert!(level < last_level, "level should decrease monotonically");
                sub_frames += 1;
                last_level = level;
                if last_level <= reduced_level {
                    break 'outer;
                }
            }
        }
        sub_frames as f32 * SUB_FRAME_DURATION_MS
    }

    #[test]
    fn decay_follows_release_time() {
        let level_reduction_db = 25.0;
        let expected_time = level_reduction_db * LIMITER_DECAY_MS_PER_DB;
        for rate in SUPPORTED_SAMPLE_RATES_HZ {
            let time = time_ms_to_decrease_level(rate, level_reduction_db);
            assert!(
                (time - expected_time).abs() <= expected_time * 0.02,
                "{rate}: {time} vs {expected_time}"
            );
        }
    }

    #[test]
    fn reset_forgets_the_peak() {
        let mut envelope = PeakEnvelope::new(8000);
        envelope.compute_envelope(&[INPUT_LEVEL; 80]);
        envelope.reset();
        assert_eq!(envelope.last_level(), 0.0);
        assert_eq!(envelope.compute_envelope(&[0.0; 80]), [0.0; SUB_FRAMES_IN_FRAME]);
    }
}
