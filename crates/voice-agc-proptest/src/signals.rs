//! Deterministic test signals and level measurements.

use std::f64::consts::PI;

const FULL_SCALE: f64 = 32768.0;

/// Generates consecutive 10 ms frames of a sine tone.
#[derive(Debug, Clone)]
pub struct ToneGenerator {
    sample_rate_hz: u32,
    frequency_hz: f64,
    amplitude: f64,
    phase: f64,
}

impl ToneGenerator {
    /// `amplitude` is the peak value in i16 units.
    pub fn new(sample_rate_hz: u32, frequency_hz: f64, amplitude: f64) -> Self {
        Self {
            sample_rate_hz,
            frequency_hz,
            amplitude,
            phase: 0.0,
        }
    }

    /// Tone whose peak is `fraction` of full scale.
    pub fn with_full_scale_fraction(sample_rate_hz: u32, frequency_hz: f64, fraction: f64) -> Self {
        Self::new(sample_rate_hz, frequency_hz, fraction * FULL_SCALE)
    }

    pub fn frame_size(&self) -> usize {
        (self.sample_rate_hz / 100) as usize
    }

    pub fn next_frame_i16(&mut self) -> Vec<i16> {
        self.next_frame()
            .into_iter()
            .map(|x| x.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16)
            .collect()
    }

    /// Next frame scaled to `[-1, 1]`.
    pub fn next_frame_f32(&mut self) -> Vec<f32> {
        self.next_frame()
            .into_iter()
            .map(|x| (x / FULL_SCALE) as f32)
            .collect()
    }

    fn next_frame(&mut self) -> Vec<f64> {
        let step = 2.0 * PI * self.frequency_hz / self.sample_rate_hz as f64;
        (0..self.frame_size())
            .map(|_| {
                let sample = self.amplitude * self.phase.sin();
                self.phase = (self.phase + step) % (2.0 * PI);
                sample
            })
            .collect()
    }
}

/// RMS level in dBFS (full scale 32768), or `None` for digital silence.
pub fn rms_dbfs(samples: &[i16]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    let mean_square = samples
        .iter()
        .map(|&s| f64::from(s) * f64::from(s))
        .sum::<f64>()
        / samples.len() as f64;
    (mean_square > 0.0).then(|| 10.0 * (mean_square / (FULL_SCALE * FULL_SCALE)).log10())
}

/// Largest absolute sample, as an `i32` so `i16::MIN` is representable.
pub fn peak_abs(samples: &[i16]) -> i32 {
    samples
        .iter()
        .map(|&s| i32::from(s).abs())
        .max()
        .unwrap_or(0)
}
