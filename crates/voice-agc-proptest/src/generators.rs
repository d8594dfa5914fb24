//! Frame and parameter generators for property-based testing.
//!
//! Configuration parameters are generated as plain values so that the
//! generators do not depend on the engine crate; tests assemble them into a
//! `Config`.

use proptest::prelude::*;
use test_strategy::Arbitrary;

/// A supported sample rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub enum SampleRate {
    #[weight(1)]
    Hz8000,
    #[weight(1)]
    Hz16000,
    #[weight(1)]
    Hz32000,
    #[weight(1)]
    Hz48000,
}

impl SampleRate {
    pub fn hz(self) -> u32 {
        match self {
            Self::Hz8000 => 8000,
            Self::Hz16000 => 16000,
            Self::Hz32000 => 32000,
            Self::Hz48000 => 48000,
        }
    }

    /// Number of samples in a 10 ms frame at this rate.
    pub fn frame_size(self) -> usize {
        (self.hz() / 100) as usize
    }
}

/// Which gain mode a generated configuration uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub enum ModeParam {
    #[weight(1)]
    FixedDigital,
    #[weight(3)]
    AdaptiveDigital,
    #[weight(1)]
    AdaptiveAnalog,
}

/// Valid configuration values.
#[derive(Debug, Clone, Copy, Arbitrary)]
pub struct ConfigParams {
    #[strategy(0..=90_i32)]
    pub compression_gain_db: i32,
    #[strategy(-31..=31_i32)]
    pub target_level_dbfs: i32,
    pub limiter_enabled: bool,
    pub mode: ModeParam,
}

/// A mono i16 frame with its sample rate.
#[derive(Debug, Clone, Arbitrary)]
pub struct MonoFrameI16 {
    pub sample_rate: SampleRate,
    #[strategy(audio_frame_i16(#sample_rate.hz()))]
    pub samples: Vec<i16>,
}

/// A mono f32 frame with its sample rate.
#[derive(Debug, Clone, Arbitrary)]
pub struct MonoFrameF32 {
    pub sample_rate: SampleRate,
    #[strategy(audio_frame_f32(#sample_rate.hz()))]
    pub samples: Vec<f32>,
}

/// A short stream of i16 frames at one sample rate.
#[derive(Debug, Clone, Arbitrary)]
pub struct StreamI16 {
    pub sample_rate: SampleRate,
    #[strategy(audio_stream_i16(#sample_rate.hz(), 1..=30))]
    pub frames: Vec<Vec<i16>>,
}

/// Generate a mono i16 frame at a given sample rate (10 ms).
pub fn audio_frame_i16(sample_rate: u32) -> impl Strategy<Value = Vec<i16>> {
    let frame_size = (sample_rate / 100) as usize;
    proptest::collection::vec(i16::MIN..=i16::MAX, frame_size..=frame_size)
}

/// Generate a mono f32 frame at a given sample rate (10 ms).
pub fn audio_frame_f32(sample_rate: u32) -> impl Strategy<Value = Vec<f32>> {
    let frame_size = (sample_rate / 100) as usize;
    proptest::collection::vec(-1.0f32..=1.0f32, frame_size..=frame_size)
}

/// Generate a stream of i16 frames, mixing full-range noise with quiet
/// and silent frames.
pub fn audio_stream_i16(
    sample_rate: u32,
    num_frames: std::ops::RangeInclusive<usize>,
) -> impl Strategy<Value = Vec<Vec<i16>>> {
    let frame_size = (sample_rate / 100) as usize;
    let frame = prop_oneof![
        3 => audio_frame_i16(sample_rate),
        1 => proptest::collection::vec(-300_i16..=300, frame_size..=frame_size),
        1 => Just(vec![0_i16; frame_size]),
    ];
    proptest::collection::vec(frame, num_frames)
}

/// Generate a frame length that is not 10 ms at `sample_rate`.
pub fn wrong_frame_len(sample_rate: u32) -> impl Strategy<Value = usize> {
    let frame_size = (sample_rate / 100) as usize;
    (0..=2 * frame_size).prop_filter("must differ from the 10 ms length", move |&len| {
        len != frame_size
    })
}
