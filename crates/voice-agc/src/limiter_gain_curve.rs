//! Static gain curve of the limiter.
//!
//! The curve maps an input peak level to an output level in dB and has four
//! regions: identity, a quadratic knee, linear compression up to
//! [`LIMITER_MAX_INPUT_LEVEL_DB_FS`] and saturation beyond it, where the
//! output is pinned to full scale.

use crate::common::{
    LIMITER_COMPRESSION_RATIO, LIMITER_KNEE_SMOOTHNESS_DB, LIMITER_MAX_INPUT_LEVEL_DB_FS,
    MAX_ABS_FLOAT_S16_VALUE, dbfs_to_float_s16_f64, float_s16_to_dbfs_f64,
};

fn compute_knee_start(
    max_input_level_db: f64,
    knee_smoothness_db: f64,
    compression_ratio: f64,
) -> f64 {
    debug_assert!(
        (compression_ratio - 1.0) * knee_smoothness_db / (2.0 * compression_ratio)
            < max_input_level_db
    );
    -knee_smoothness_db / 2.0 - max_input_level_db / (compression_ratio - 1.0)
}

/// Coefficients `[a, b, c]` of the knee polynomial `ax^2 + bx + c`.
fn compute_knee_region_polynomial(
    knee_start_dbfs: f64,
    knee_smoothness_db: f64,
    compression_ratio: f64,
) -> [f64; 3] {
    let a = (1.0 - compression_ratio) / (2.0 * knee_smoothness_db * compression_ratio);
    let b = 1.0 - 2.0 * a * knee_start_dbfs;
    let c = a * knee_start_dbfs * knee_start_dbfs;
    [a, b, c]
}

#[derive(Debug)]
pub(crate) struct LimiterGainCurve {
    knee_start_dbfs: f64,
    knee_start_linear: f64,
    limiter_start_dbfs: f64,
    max_input_level_linear: f64,
    knee_region_polynomial: [f64; 3],
}

impl Default for LimiterGainCurve {
    fn default() -> Self {
        let knee_start_dbfs = compute_knee_start(
            LIMITER_MAX_INPUT_LEVEL_DB_FS,
            LIMITER_KNEE_SMOOTHNESS_DB,
            LIMITER_COMPRESSION_RATIO,
        );
        let limiter_start_dbfs = knee_start_dbfs + LIMITER_KNEE_SMOOTHNESS_DB;
        debug_assert!(LIMITER_MAX_INPUT_LEVEL_DB_FS >= limiter_start_dbfs);
        Self {
            knee_start_dbfs,
            knee_start_linear: dbfs_to_float_s16_f64(knee_start_dbfs),
            limiter_start_dbfs,
            max_input_level_linear: dbfs_to_float_s16_f64(LIMITER_MAX_INPUT_LEVEL_DB_FS),
            knee_region_polynomial: compute_knee_region_polynomial(
                knee_start_dbfs,
                LIMITER_KNEE_SMOOTHNESS_DB,
                LIMITER_COMPRESSION_RATIO,
            ),
        }
    }
}

impl LimiterGainCurve {
    #[cfg(test)]
    pub(crate) fn knee_start_dbfs(&self) -> f64 {
        self.knee_start_dbfs
    }

    /// Output level in dBFS for an input level in dBFS, up to the maximum
    /// input level.
    pub(crate) fn output_level_dbfs(&self, input_level_dbfs: f64) -> f64 {
        if input_level_dbfs < self.knee_start_dbfs {
            input_level_dbfs
        } else if input_level_dbfs < self.limiter_start_dbfs {
            let [a, b, c] = self.knee_region_polynomial;
            a * input_level_dbfs * input_level_dbfs + b * input_level_dbfs + c
        } else {
            (input_level_dbfs - LIMITER_MAX_INPUT_LEVEL_DB_FS) / LIMITER_COMPRESSION_RATIO
        }
    }

    /// Linear gain for a FloatS16 peak level.
    pub(crate) fn gain_to_apply(&self, input_level: f32) -> f32 {
        let input_level = f64::from(input_level);
        if input_level < self.knee_start_linear {
            return 1.0;
        }
        if input_level > self.max_input_level_linear {
            // Saturation: bring the peak exactly to full scale.
            return (f64::from(MAX_ABS_FLOAT_S16_VALUE) / input_level) as f32;
        }
        let output_level =
            dbfs_to_float_s16_f64(self.output_level_dbfs(float_s16_to_dbfs_f64(input_level)));
        (output_level / input_level) as f32
    }
}
