//! Error types.

use thiserror::Error;

use crate::config::Mode;
use crate::stream::State;

/// Errors returned by [`Agc`](crate::Agc) operations.
///
/// Every error is scoped to the offending call; none is retried internally
/// and the instance state is left as it was before the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    /// A configuration field is outside its valid range.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    /// The sample rate is not one of 8000, 16000, 32000 or 48000 Hz.
    #[error("unsupported sample rate {0} Hz")]
    UnsupportedSampleRate(u32),
    /// The operation is not allowed in the instance's current state.
    #[error("`{operation}` is not allowed in state {state:?}")]
    Lifecycle {
        operation: &'static str,
        state: State,
    },
    /// The frame passed to `process` is not exactly 10 ms long.
    #[error("frame length mismatch: expected {expected} samples, got {actual}")]
    FrameLength { expected: usize, actual: usize },
    /// Per-instance buffers could not be allocated.
    #[error("failed to allocate stream instance")]
    Resource,
}

/// Configuration validation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("compression gain {0} dB is negative")]
    NegativeCompressionGain(i32),
    #[error("compression gain {0} dB exceeds the maximum of {max} dB", max = crate::common::MAX_COMPRESSION_GAIN_DB)]
    CompressionGainTooLarge(i32),
    #[error("target level {0} dBFS is outside -31..=31")]
    TargetLevelOutOfRange(i32),
    #[error("analog level limits {minimum}..={maximum} are invalid")]
    InvalidAnalogLevelLimits { minimum: i32, maximum: i32 },
    #[error("analog level {level} is outside {minimum}..={maximum}")]
    AnalogLevelOutOfRange {
        level: i32,
        minimum: i32,
        maximum: i32,
    },
    #[error("analog level control requires adaptive analog mode, current mode is {0:?}")]
    AnalogModeRequired(Mode),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
