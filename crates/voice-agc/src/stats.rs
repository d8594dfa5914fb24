//! Per-stream statistics.

/// Snapshot of an active stream after its most recent frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AgcStats {
    /// Digital gain applied at the end of the last frame.
    pub gain_db: f32,
    /// Short-term input level.
    pub fast_level_dbfs: f32,
    /// Long-term input level.
    pub slow_level_dbfs: f32,
    /// Largest absolute input sample of the last frame.
    pub peak_level_dbfs: f32,
    /// Whether the last frame was classified as active.
    pub voice_active: bool,
    /// Strongest limiter reduction in the last frame (0 when idle, negative
    /// otherwise).
    pub limiter_gain_db: f32,
    /// Input clipping seen in the last frame.
    pub saturation_warning: bool,
    pub frames_processed: u64,
}
