//! Adaptive gain controller.
//!
//! Selects the target gain from the slow level estimate, decides how quickly
//! to move toward it and applies the current gain to 10 ms frames.
//!
//! All gain arithmetic is done in dB and accumulated additively; the linear
//! factor is computed only when handing the gain to the [`GainApplier`].

use crate::common::{
    FRAME_DURATION_MS, LIMITER_THRESHOLD_FOR_AGC_GAIN_DBFS, MAX_GAIN_DECREASE_DB_PER_SECOND,
    MAX_GAIN_INCREASE_DB_PER_SECOND, TRANSIENT_GAIN_DECREASE_DB_PER_SECOND,
    TRANSIENT_LEVEL_RISE_DB, db_to_ratio,
};
use crate::config::{Config, Mode};
use crate::gain_applier::GainApplier;
use crate::level_estimator::LevelEstimate;
use crate::voice_activity::VoiceActivityGate;

const fn per_frame(db_per_second: f32) -> f32 {
    db_per_second * FRAME_DURATION_MS as f32 / 1000.0
}

pub(crate) const MAX_GAIN_INCREASE_DB_PER_FRAME: f32 = per_frame(MAX_GAIN_INCREASE_DB_PER_SECOND);
pub(crate) const MAX_GAIN_DECREASE_DB_PER_FRAME: f32 = per_frame(MAX_GAIN_DECREASE_DB_PER_SECOND);
pub(crate) const TRANSIENT_GAIN_DECREASE_DB_PER_FRAME: f32 =
    per_frame(TRANSIENT_GAIN_DECREASE_DB_PER_SECOND);

/// Computes the gain that brings `input_level_dbfs` to `target_dbfs`,
/// clamped to [0, `max_gain_db`].
fn compute_gain_db(input_level_dbfs: f32, target_dbfs: f32, max_gain_db: f32) -> f32 {
    // If the level is very low, apply the maximum gain.
    if input_level_dbfs < target_dbfs - max_gain_db {
        return max_gain_db;
    }
    // We expect to end up here most of the time: the level is below the
    // target, but we can boost it to the target.
    if input_level_dbfs < target_dbfs {
        return target_dbfs - input_level_dbfs;
    }
    // The level is at or above the target and we never attenuate.
    0.0
}

/// Lowers `target_gain_db` so that `peak_dbfs` stays below
/// [`LIMITER_THRESHOLD_FOR_AGC_GAIN_DBFS`] after the gain is applied.
fn limit_gain_by_peak(target_gain_db: f32, peak_dbfs: f32) -> f32 {
    let max_allowed_gain_db = (LIMITER_THRESHOLD_FOR_AGC_GAIN_DBFS - peak_dbfs).max(0.0);
    target_gain_db.min(max_allowed_gain_db)
}

/// Whether the frame is an abrupt onset whose peak, at `gain_db`, would
/// reach [`LIMITER_THRESHOLD_FOR_AGC_GAIN_DBFS`].
///
/// Steady signals never qualify, however high their crest factor, so the
/// gain settles on the slow-level target and the limiter shapes the peaks.
fn is_transient(level: &LevelEstimate, gain_db: f32) -> bool {
    level.fast_dbfs - level.slow_dbfs > TRANSIENT_LEVEL_RISE_DB
        && level.peak_dbfs + gain_db > LIMITER_THRESHOLD_FOR_AGC_GAIN_DBFS
}

/// Computes how the gain should change during this frame.
fn compute_gain_change_this_frame_db(
    target_gain_db: f32,
    last_gain_db: f32,
    gain_increase_allowed: bool,
    max_gain_decrease_db: f32,
    max_gain_increase_db: f32,
) -> f32 {
    debug_assert!(max_gain_decrease_db > 0.0);
    debug_assert!(max_gain_increase_db > 0.0);
    let mut target_gain_difference_db = target_gain_db - last_gain_db;
    if !gain_increase_allowed {
        target_gain_difference_db = target_gain_difference_db.min(0.0);
    }
    target_gain_difference_db.clamp(-max_gain_decrease_db, max_gain_increase_db)
}

/// Outcome of one controller step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct GainUpdate {
    /// Gain reached at the end of the frame.
    pub(crate) gain_db: f32,
    /// Gain the controller was aiming for.
    pub(crate) target_gain_db: f32,
    /// Whether the transient guard engaged.
    pub(crate) transient: bool,
}

#[derive(Debug)]
pub(crate) struct GainController {
    gain_applier: GainApplier,
    mode: Mode,
    target_dbfs: f32,
    max_gain_db: f32,
    last_gain_db: f32,
}

impl GainController {
    pub(crate) fn new(config: &Config) -> Self {
        let mut controller = Self {
            gain_applier: GainApplier::new(1.0),
            mode: config.mode,
            target_dbfs: config.target_dbfs(),
            max_gain_db: config.compression_gain_db as f32,
            last_gain_db: 0.0,
        };
        controller.reset();
        controller
    }

    /// Takes the new target and bounds while keeping the current gain.
    pub(crate) fn configure(&mut self, config: &Config) {
        self.mode = config.mode;
        self.target_dbfs = config.target_dbfs();
        self.max_gain_db = config.compression_gain_db as f32;
        let clamped_gain_db = self.last_gain_db.clamp(0.0, self.max_gain_db);
        if clamped_gain_db != self.last_gain_db {
            self.last_gain_db = clamped_gain_db;
            self.gain_applier.set_gain_factor(db_to_ratio(self.last_gain_db));
        }
    }

    /// Starts from unity gain, or from the fixed gain in
    /// [`Mode::FixedDigital`].
    pub(crate) fn reset(&mut self) {
        self.last_gain_db = match self.mode {
            Mode::FixedDigital => self.max_gain_db,
            Mode::AdaptiveDigital | Mode::AdaptiveAnalog => 0.0,
        };
        self.gain_applier = GainApplier::new(db_to_ratio(self.last_gain_db));
    }

    pub(crate) fn gain_db(&self) -> f32 {
        self.last_gain_db
    }

    /// Updates the gain from `level` and applies it to a FloatS16 `frame`.
    pub(crate) fn process(
        &mut self,
        level: &LevelEstimate,
        gate: &VoiceActivityGate,
        frame: &mut [f32],
    ) -> GainUpdate {
        let mut transient = false;
        let mut max_gain_decrease_db = MAX_GAIN_DECREASE_DB_PER_FRAME;
        let (target_gain_db, gain_increase_allowed) = match self.mode {
            Mode::FixedDigital => (self.max_gain_db, true),
            // The external analog stage does the boosting.
            Mode::AdaptiveAnalog => (0.0, false),
            Mode::AdaptiveDigital => {
                let mut target_gain_db =
                    compute_gain_db(level.slow_dbfs, self.target_dbfs, self.max_gain_db);
                let mut gain_increase_allowed = gate.gain_increase_allowed();
                if is_transient(level, self.last_gain_db) {
                    // An abrupt onset that the current gain would push into
                    // the limiter: stop boosting and back off quickly.
                    transient = true;
                    target_gain_db = limit_gain_by_peak(target_gain_db, level.peak_dbfs);
                    gain_increase_allowed = false;
                    max_gain_decrease_db = TRANSIENT_GAIN_DECREASE_DB_PER_FRAME;
                } else if !gate.is_active() {
                    // Hold the gain during pauses.
                    target_gain_db = self.last_gain_db;
                }
                (target_gain_db, gain_increase_allowed)
            }
        };

        let gain_change_this_frame_db = compute_gain_change_this_frame_db(
            target_gain_db,
            self.last_gain_db,
            gain_increase_allowed,
            max_gain_decrease_db,
            MAX_GAIN_INCREASE_DB_PER_FRAME,
        );

        // Avoid calling math functions if the gain does not change.
        if gain_change_this_frame_db != 0.0 {
            self.last_gain_db =
                (self.last_gain_db + gain_change_this_frame_db).clamp(0.0, self.max_gain_db);
            self.gain_applier.set_gain_factor(db_to_ratio(self.last_gain_db));
        }

        self.gain_applier.apply_gain(frame);

        GainUpdate {
            gain_db: self.last_gain_db,
            target_gain_db,
            transient,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ADJACENT_SPEECH_FRAMES_THRESHOLD;

    const FRAME_LEN_10MS_8KHZ: usize = 80;
    const FRAME_LEN_10MS_48KHZ: usize = 480;

    // Number of additional frames to process to ensure convergence.
    const NUM_EXTRA_FRAMES: i32 = 10;

    fn default_config() -> Config {
        Config::default()
            .with_compression_gain_db(30)
            .with_target_level_dbfs(-10)
    }

    /// A level whose slow estimate sits `below_target_db` under the target
    /// and whose peak is far from clipping.
    fn level_below_target(config: &Config, below_target_db: f32) -> LevelEstimate {
        let slow_dbfs = config.target_dbfs() - below_target_db;
        LevelEstimate {
            fast_dbfs: slow_dbfs,
            slow_dbfs,
            peak_dbfs: slow_dbfs,
        }
    }

    fn active_gate() -> VoiceActivityGate {
        let mut gate = VoiceActivityGate::new(1);
        gate.update(&LevelEstimate {
            fast_dbfs: -20.0,
            slow_dbfs: -20.0,
            peak_dbfs: -17.0,
        });
        gate
    }

    /// Processes a unit frame and returns the gain applied to its last sample.
    fn process_unit_frame(
        controller: &mut GainController,
        level: &LevelEstimate,
        gate: &VoiceActivityGate,
        samples: usize,
    ) -> f32 {
        let mut frame = vec![1.0_f32; samples];
        controller.process(level, gate, &mut frame);
        frame[samples - 1]
    }

    #[test]
    fn compute_gain_db_is_clamped() {
        assert_eq!(compute_gain_db(-80.0, -10.0, 30.0), 30.0);
        assert!((compute_gain_db(-25.0, -10.0, 30.0) - 15.0).abs() < 1e-6);
        assert_eq!(compute_gain_db(-5.0, -10.0, 30.0), 0.0);
        assert_eq!(compute_gain_db(5.0, -10.0, 30.0), 0.0);
    }

    #[test]
    fn max_gain_applied() {
        let config = default_config();
        let mut controller = GainController::new(&config);
        let gate = active_gate();
        let level = level_below_target(&config, 60.0);
        let num_frames_to_adapt =
            (config.compression_gain_db as f32 / MAX_GAIN_INCREASE_DB_PER_FRAME) as i32
                + NUM_EXTRA_FRAMES;
        let mut applied_gain = 0.0_f32;
        for _ in 0..num_frames_to_adapt {
            applied_gain = process_unit_frame(&mut controller, &level, &gate, FRAME_LEN_10MS_8KHZ);
        }
        let applied_gain_db = 20.0 * applied_gain.log10();
        assert!(
            (applied_gain_db - config.compression_gain_db as f32).abs() < 0.1,
            "applied_gain_db={applied_gain_db}"
        );
        assert!((controller.gain_db() - config.compression_gain_db as f32).abs() < 1e-4);
    }

    #[test]
    fn gain_converges_to_target_gap() {
        let config = default_config();
        let mut controller = GainController::new(&config);
        let gate = active_gate();
        let level = level_below_target(&config, 12.0);
        for _ in 0..200 {
            process_unit_frame(&mut controller, &level, &gate, FRAME_LEN_10MS_8KHZ);
        }
        assert!((controller.gain_db() - 12.0).abs() < 1e-3);
    }

    #[test]
    fn gain_does_not_change_fast() {
        let config = default_config();
        let mut controller = GainController::new(&config);
        let gate = active_gate();

        let num_frames_to_adapt = 400;
        let mut last_gain_db = controller.gain_db();
        let low = level_below_target(&config, 25.0);
        for _ in 0..num_frames_to_adapt {
            let mut frame = vec![1.0_f32; FRAME_LEN_10MS_8KHZ];
            let update = controller.process(&low, &gate, &mut frame);
            assert!(update.gain_db - last_gain_db <= MAX_GAIN_INCREASE_DB_PER_FRAME + 1e-5);
            assert!(update.gain_db >= last_gain_db);
            last_gain_db = update.gain_db;
        }

        // Decreasing, without transients, is bounded by the release rate.
        let high = level_below_target(&config, -5.0);
        let high = LevelEstimate {
            peak_dbfs: -40.0,
            ..high
        };
        for _ in 0..num_frames_to_adapt {
            let mut frame = vec![1.0_f32; FRAME_LEN_10MS_8KHZ];
            let update = controller.process(&high, &gate, &mut frame);
            assert!(!update.transient);
            assert!(last_gain_db - update.gain_db <= MAX_GAIN_DECREASE_DB_PER_FRAME + 1e-5);
            last_gain_db = update.gain_db;
        }
        assert_eq!(last_gain_db, 0.0);
    }

    #[test]
    fn decrease_is_faster_than_increase() {
        assert!(MAX_GAIN_DECREASE_DB_PER_FRAME > MAX_GAIN_INCREASE_DB_PER_FRAME);
        assert!(TRANSIENT_GAIN_DECREASE_DB_PER_FRAME > MAX_GAIN_DECREASE_DB_PER_FRAME);
    }

    #[test]
    fn gain_is_ramped_in_a_frame() {
        let config = default_config();
        let mut controller = GainController::new(&config);
        let gate = active_gate();

        let mut frame = vec![1.0_f32; FRAME_LEN_10MS_48KHZ];
        controller.process(&level_below_target(&config, 25.0), &gate, &mut frame);
        let mut maximal_difference = 0.0_f32;
        let mut current_value = 1.0_f32;
        for &x in &frame {
            maximal_difference = maximal_difference.max((x - current_value).abs());
            current_value = x;
        }
        let max_change_per_sample =
            (db_to_ratio(MAX_GAIN_INCREASE_DB_PER_FRAME) - 1.0) / FRAME_LEN_10MS_48KHZ as f32;
        assert!(
            maximal_difference <= max_change_per_sample + 1e-6,
            "maximal_difference {maximal_difference} > {max_change_per_sample}"
        );
    }

    #[test]
    fn gain_held_while_inactive() {
        let config = default_config();
        let mut controller = GainController::new(&config);
        let gate = active_gate();
        let level = level_below_target(&config, 5.0);
        for _ in 0..100 {
            process_unit_frame(&mut controller, &level, &gate, FRAME_LEN_10MS_8KHZ);
        }
        let held_gain_db = controller.gain_db();
        assert!(held_gain_db > 0.0);

        let mut silent_gate = VoiceActivityGate::new(ADJACENT_SPEECH_FRAMES_THRESHOLD);
        silent_gate.update(&LevelEstimate::SILENCE);
        for _ in 0..100 {
            let mut frame = vec![0.0_f32; FRAME_LEN_10MS_8KHZ];
            let update = controller.process(&LevelEstimate::SILENCE, &silent_gate, &mut frame);
            assert_eq!(update.gain_db, held_gain_db);
            assert!(frame.iter().all(|&x| x == 0.0));
        }
    }

    #[test]
    fn do_not_increase_gain_with_too_few_speech_frames() {
        for threshold in [1, 7, 31, ADJACENT_SPEECH_FRAMES_THRESHOLD] {
            let config = default_config();
            let mut controller = GainController::new(&config);
            let mut gate = VoiceActivityGate::new(threshold);
            let level = level_below_target(&config, 12.0);

            for i in 0..threshold - 1 {
                gate.update(&level);
                process_unit_frame(&mut controller, &level, &gate, FRAME_LEN_10MS_48KHZ);
                assert_eq!(controller.gain_db(), 0.0, "threshold {threshold} frame {i}");
            }

            gate.update(&level);
            process_unit_frame(&mut controller, &level, &gate, FRAME_LEN_10MS_48KHZ);
            assert!(controller.gain_db() > 0.0, "threshold {threshold}");
        }
    }

    #[test]
    fn transient_drops_gain_at_transient_rate() {
        let config = default_config();
        let mut controller = GainController::new(&config);
        let gate = active_gate();
        let quiet = level_below_target(&config, 40.0);
        for _ in 0..400 {
            process_unit_frame(&mut controller, &quiet, &gate, FRAME_LEN_10MS_8KHZ);
        }
        assert!((controller.gain_db() - 30.0).abs() < 1e-4);

        // A near full-scale onset at an otherwise quiet slow level.
        let transient = LevelEstimate {
            fast_dbfs: -10.0,
            peak_dbfs: -3.0,
            ..quiet
        };
        let mut frame = vec![1.0_f32; FRAME_LEN_10MS_8KHZ];
        let update = controller.process(&transient, &gate, &mut frame);
        assert!(update.transient);
        // Only 2 dB of gain keep a -3 dBFS peak under the limiter threshold.
        assert!((update.target_gain_db - 2.0).abs() < 1e-4);
        assert!((update.gain_db - (30.0 - TRANSIENT_GAIN_DECREASE_DB_PER_FRAME)).abs() < 1e-4);
    }

    #[test]
    fn steady_peaks_do_not_cap_the_gain() {
        let config = default_config();
        let mut controller = GainController::new(&config);
        let gate = active_gate();
        // 20 dB below the target with a 15 dB crest factor: the wanted gain
        // puts the peaks at +5 dBFS.
        let steady = LevelEstimate {
            peak_dbfs: -15.0,
            ..level_below_target(&config, 20.0)
        };
        let mut last_gain_db = controller.gain_db();
        for _ in 0..400 {
            let mut frame = vec![1.0_f32; FRAME_LEN_10MS_8KHZ];
            let update = controller.process(&steady, &gate, &mut frame);
            assert!(!update.transient);
            assert!(update.gain_db >= last_gain_db);
            last_gain_db = update.gain_db;
        }
        assert!((last_gain_db - 20.0).abs() < 1e-3, "gain {last_gain_db}");
    }

    #[test]
    fn transient_needs_fast_level_rise() {
        let level = LevelEstimate {
            fast_dbfs: -20.0,
            slow_dbfs: -20.0,
            peak_dbfs: -5.0,
        };
        assert!(!is_transient(&level, 10.0));
        let onset = LevelEstimate {
            slow_dbfs: -20.0 - TRANSIENT_LEVEL_RISE_DB - 1.0,
            ..level
        };
        assert!(is_transient(&onset, 10.0));
        // Quiet enough peaks are never a transient.
        assert!(!is_transient(&onset, 3.0));
    }

    #[test]
    fn fixed_digital_applies_compression_gain() {
        let config = default_config()
            .with_mode(Mode::FixedDigital)
            .with_compression_gain_db(6);
        let mut controller = GainController::new(&config);
        let gain = process_unit_frame(
            &mut controller,
            &LevelEstimate::SILENCE,
            &VoiceActivityGate::new(1),
            FRAME_LEN_10MS_8KHZ,
        );
        assert!((gain - db_to_ratio(6.0)).abs() < 1e-5);
        // Loud input does not move a fixed gain.
        let loud = LevelEstimate {
            fast_dbfs: -1.0,
            slow_dbfs: -1.0,
            peak_dbfs: 0.0,
        };
        for _ in 0..50 {
            process_unit_frame(&mut controller, &loud, &active_gate(), FRAME_LEN_10MS_8KHZ);
        }
        assert_eq!(controller.gain_db(), 6.0);
    }

    #[test]
    fn adaptive_analog_keeps_digital_gain_at_unity() {
        let config = default_config().with_mode(Mode::AdaptiveAnalog);
        let mut controller = GainController::new(&config);
        let level = level_below_target(&config, 20.0);
        for _ in 0..100 {
            let gain = process_unit_frame(&mut controller, &level, &active_gate(), 80);
            assert_eq!(gain, 1.0);
        }
    }

    #[test]
    fn configure_keeps_gain_and_applies_new_bounds() {
        let config = default_config();
        let mut controller = GainController::new(&config);
        let gate = active_gate();
        let level = level_below_target(&config, 20.0);
        for _ in 0..300 {
            process_unit_frame(&mut controller, &level, &gate, 80);
        }
        assert!((controller.gain_db() - 20.0).abs() < 1e-3);

        controller.configure(&config);
        assert!((controller.gain_db() - 20.0).abs() < 1e-3);

        controller.configure(&config.with_compression_gain_db(8));
        assert_eq!(controller.gain_db(), 8.0);

        controller.reset();
        assert_eq!(controller.gain_db(), 0.0);
    }
}
