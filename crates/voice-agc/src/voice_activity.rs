//! Voice activity gate used to hold the gain during pauses.
//!
//! A frame counts as active when both its short-term level and its peak are
//! above [`VOICE_ACTIVITY_THRESHOLD_DBFS`], so a silent frame is inactive even
//! while the short-term envelope is still decaying. Gain increases are only
//! allowed after a run of adjacent active frames, so isolated clicks and the
//! start of a pause never pull the gain up.

use crate::common::VOICE_ACTIVITY_THRESHOLD_DBFS;
use crate::level_estimator::LevelEstimate;

#[derive(Debug)]
pub(crate) struct VoiceActivityGate {
    adjacent_speech_frames_threshold: i32,
    frames_to_gain_increase_allowed: i32,
    active: bool,
}

impl VoiceActivityGate {
    pub(crate) fn new(adjacent_speech_frames_threshold: i32) -> Self {
        debug_assert!(adjacent_speech_frames_threshold >= 1);
        Self {
            adjacent_speech_frames_threshold,
            frames_to_gain_increase_allowed: adjacent_speech_frames_threshold,
            active: false,
        }
    }

    /// Classifies the frame described by `level`.
    pub(crate) fn update(&mut self, level: &LevelEstimate) {
        self.active = level.fast_dbfs > VOICE_ACTIVITY_THRESHOLD_DBFS
            && level.peak_dbfs > VOICE_ACTIVITY_THRESHOLD_DBFS;
        if !self.active {
            self.frames_to_gain_increase_allowed = self.adjacent_speech_frames_threshold;
        } else if self.frames_to_gain_increase_allowed > 0 {
            self.frames_to_gain_increase_allowed -= 1;
        }
    }

    /// Whether the last frame was active.
    pub(crate) fn is_active(&self) -> bool {
        self.active
    }

    /// Whether enough adjacent active frames were seen to raise the gain.
    pub(crate) fn gain_increase_allowed(&self) -> bool {
        self.active && self.frames_to_gain_increase_allowed == 0
    }
}
