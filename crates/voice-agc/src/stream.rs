//! Stream instance: lifecycle and the per-frame pipeline.
//!
//! An [`Agc`] is created `Uninitialized`, becomes `Active` once
//! [`Agc::initialize`] accepts a sample rate and configuration, and ends
//! `Released`. Every failed call leaves the instance as it was.
//!
//! Each 10 ms frame runs through level estimation, the voice activity gate,
//! the gain controller (which applies the gain) and, if enabled, the limiter.

use crate::analog_level::{AnalogLevelRecommender, compute_clipped_ratio};
use crate::common::{
    ANALOG_CLIPPED_RATIO_THRESHOLD, ADJACENT_SPEECH_FRAMES_THRESHOLD,
    MAXIMAL_NUMBER_OF_SAMPLES_PER_FRAME, SUPPORTED_SAMPLE_RATES_HZ, db_to_ratio,
    float_s16_to_float, float_s16_to_s16, float_to_float_s16, frame_len, ratio_to_db,
};
use crate::config::{Config, Mode};
use crate::error::{ConfigError, Error, Result};
use crate::gain_controller::GainController;
use crate::level_estimator::LevelEstimator;
use crate::limiter::Limiter;
use crate::stats::AgcStats;
use crate::voice_activity::VoiceActivityGate;

/// Lifecycle state of an [`Agc`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    Uninitialized,
    Active,
    Released,
}

fn validate_config(config: &Config) -> Result<()> {
    config.validate().map_err(|err| {
        tracing::warn!(%err, ?config, "rejecting AGC configuration");
        Error::Config(err)
    })
}

/// Engine state of an active stream.
#[derive(Debug)]
struct Pipeline {
    sample_rate_hz: u32,
    config: Config,
    level_estimator: LevelEstimator,
    voice_activity: VoiceActivityGate,
    gain_controller: GainController,
    limiter: Limiter,
    analog_level: AnalogLevelRecommender,
    stats: AgcStats,
}

impl Pipeline {
    fn new(sample_rate_hz: u32, config: &Config) -> Self {
        Self {
            sample_rate_hz,
            config: *config,
            level_estimator: LevelEstimator::new(sample_rate_hz),
            voice_activity: VoiceActivityGate::new(ADJACENT_SPEECH_FRAMES_THRESHOLD),
            gain_controller: GainController::new(config),
            limiter: Limiter::new(sample_rate_hz),
            analog_level: AnalogLevelRecommender::new(
                config.analog_level_limits,
                config.target_dbfs(),
            ),
            stats: AgcStats::default(),
        }
    }

    fn reconfigure(&mut self, config: &Config) {
        let previous = std::mem::replace(&mut self.config, *config);
        self.gain_controller.configure(config);
        self.analog_level
            .configure(config.analog_level_limits, config.target_dbfs());
        if config.mode == Mode::AdaptiveAnalog && previous.mode != Mode::AdaptiveAnalog {
            self.analog_level.reset();
        }
        if config.limiter_enabled && !previous.limiter_enabled {
            self.limiter.reset();
        }
        self.stats.gain_db = self.gain_controller.gain_db();
    }

    /// Runs one FloatS16 frame through the pipeline in place.
    fn process(&mut self, frame: &mut [f32]) {
        let clipped_ratio = compute_clipped_ratio(frame);
        let level = self.level_estimator.compute_level(frame);
        self.voice_activity.update(&level);
        if self.config.mode == Mode::AdaptiveAnalog {
            self.analog_level.process(
                level.slow_dbfs,
                self.voice_activity.is_active(),
                clipped_ratio,
            );
        }

        let update = self
            .gain_controller
            .process(&level, &self.voice_activity, frame);
        if update.transient {
            tracing::trace!(
                peak_dbfs = level.peak_dbfs,
                fast_dbfs = level.fast_dbfs,
                slow_dbfs = level.slow_dbfs,
                gain_db = update.gain_db,
                target_gain_db = update.target_gain_db,
                "transient guard engaged"
            );
        }

        let limiter_gain_db = if self.config.limiter_enabled {
            self.limiter.process(frame);
            ratio_to_db(self.limiter.min_scaling_factor())
        } else {
            0.0
        };

        self.stats = AgcStats {
            gain_db: update.gain_db,
            fast_level_dbfs: level.fast_dbfs,
            slow_level_dbfs: level.slow_dbfs,
            peak_level_dbfs: level.peak_dbfs,
            voice_active: self.voice_activity.is_active(),
            limiter_gain_db,
            saturation_warning: clipped_ratio >= ANALOG_CLIPPED_RATIO_THRESHOLD,
            frames_processed: self.stats.frames_processed + 1,
        };
    }

    fn check_analog_level(&self, level: Option<i32>) -> Result<(), ConfigError> {
        if self.config.mode != Mode::AdaptiveAnalog {
            return Err(ConfigError::AnalogModeRequired(self.config.mode));
        }
        let limits = self.config.analog_level_limits;
        match level {
            Some(level) if !limits.contains(level) => Err(ConfigError::AnalogLevelOutOfRange {
                level,
                minimum: limits.minimum,
                maximum: limits.maximum,
            }),
            _ => Ok(()),
        }
    }
}

/// Automatic gain control for one mono 16-bit stream.
#[derive(derive_more::Debug)]
pub struct Agc {
    state: State,
    pipeline: Option<Pipeline>,
    #[debug(skip)]
    scratch: Vec<f32>,
}

impl Agc {
    /// Creates an uninitialized instance with its frame buffer allocated.
    pub fn create() -> Result<Self> {
        let mut scratch = Vec::new();
        scratch
            .try_reserve_exact(MAXIMAL_NUMBER_OF_SAMPLES_PER_FRAME)
            .map_err(|_| Error::Resource)?;
        Ok(Self {
            state: State::Uninitialized,
            pipeline: None,
            scratch,
        })
    }

    /// Validates `sample_rate_hz` and `config` and (re)starts the stream from
    /// unity gain and silent levels.
    pub fn initialize(&mut self, sample_rate_hz: u32, config: &Config) -> Result<()> {
        if self.state == State::Released {
            return Err(Error::Lifecycle {
                operation: "initialize",
                state: self.state,
            });
        }
        if !SUPPORTED_SAMPLE_RATES_HZ.contains(&sample_rate_hz) {
            tracing::warn!(sample_rate_hz, "rejecting unsupported sample rate");
            return Err(Error::UnsupportedSampleRate(sample_rate_hz));
        }
        validate_config(config)?;

        self.pipeline = Some(Pipeline::new(sample_rate_hz, config));
        self.state = State::Active;
        tracing::debug!(sample_rate_hz, ?config, "AGC stream initialized");
        Ok(())
    }

    /// Applies a new configuration without resetting adaptive state.
    pub fn reconfigure(&mut self, config: &Config) -> Result<()> {
        let pipeline = self.active_pipeline_mut("reconfigure")?;
        if pipeline.config == *config {
            return Ok(());
        }
        validate_config(config)?;
        pipeline.reconfigure(config);
        tracing::debug!(?config, "AGC stream reconfigured");
        Ok(())
    }

    /// Same as [`Agc::reconfigure`].
    pub fn set_config(&mut self, config: &Config) -> Result<()> {
        self.reconfigure(config)
    }

    /// Processes one 10 ms frame of 16-bit samples in place.
    pub fn process(&mut self, frame: &mut [i16]) -> Result<()> {
        let Self {
            state,
            pipeline,
            scratch,
        } = self;
        let pipeline = pipeline.as_mut().ok_or(Error::Lifecycle {
            operation: "process",
            state: *state,
        })?;
        check_frame_len(pipeline.sample_rate_hz, frame.len())?;

        scratch.clear();
        scratch.extend(frame.iter().map(|&s| f32::from(s)));
        pipeline.process(scratch);
        for (dst, &src) in frame.iter_mut().zip(scratch.iter()) {
            *dst = float_s16_to_s16(src);
        }
        Ok(())
    }

    /// Processes one 10 ms frame of Float samples in place.
    ///
    /// Input is clamped to `[-1, 1]` and NaN is treated as silence. With the
    /// limiter enabled the output stays within `[-1, 1]`.
    pub fn process_f32(&mut self, frame: &mut [f32]) -> Result<()> {
        let pipeline = self.active_pipeline_mut("process_f32")?;
        check_frame_len(pipeline.sample_rate_hz, frame.len())?;

        for sample in frame.iter_mut() {
            let v = if sample.is_nan() {
                0.0
            } else {
                sample.clamp(-1.0, 1.0)
            };
            *sample = float_to_float_s16(v);
        }
        pipeline.process(frame);
        for sample in frame.iter_mut() {
            *sample = float_s16_to_float(*sample);
        }
        Ok(())
    }

    /// Drops all engine state. Every later call fails.
    pub fn release(&mut self) -> Result<()> {
        if self.state == State::Released {
            return Err(Error::Lifecycle {
                operation: "release",
                state: self.state,
            });
        }
        self.pipeline = None;
        self.scratch = Vec::new();
        self.state = State::Released;
        tracing::debug!("AGC stream released");
        Ok(())
    }

    /// Reports the analog volume the caller applied.
    pub fn set_stream_analog_level(&mut self, level: i32) -> Result<()> {
        let pipeline = self.active_pipeline_mut("set_stream_analog_level")?;
        pipeline.check_analog_level(Some(level))?;
        pipeline.analog_level.set_applied_level(level);
        Ok(())
    }

    /// Next analog volume the caller should apply.
    pub fn recommended_analog_level(&self) -> Result<i32> {
        let pipeline = self.active_pipeline("recommended_analog_level")?;
        pipeline.check_analog_level(None)?;
        Ok(pipeline.analog_level.recommended_level())
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn config(&self) -> Option<&Config> {
        self.pipeline.as_ref().map(|p| &p.config)
    }

    pub fn sample_rate_hz(&self) -> Option<u32> {
        self.pipeline.as_ref().map(|p| p.sample_rate_hz)
    }

    /// Samples per 10 ms frame.
    pub fn frame_len(&self) -> Option<usize> {
        self.sample_rate_hz().map(frame_len)
    }

    pub fn current_gain_db(&self) -> Option<f32> {
        self.pipeline.as_ref().map(|p| p.gain_controller.gain_db())
    }

    pub fn current_gain_linear(&self) -> Option<f32> {
        self.current_gain_db().map(db_to_ratio)
    }

    pub fn stats(&self) -> Option<AgcStats> {
        self.pipeline.as_ref().map(|p| p.stats)
    }

    fn active_pipeline(&self, operation: &'static str) -> Result<&Pipeline> {
        self.pipeline.as_ref().ok_or(Error::Lifecycle {
            operation,
            state: self.state,
        })
    }

    fn active_pipeline_mut(&mut self, operation: &'static str) -> Result<&mut Pipeline> {
        self.pipeline.as_mut().ok_or(Error::Lifecycle {
            operation,
            state: self.state,
        })
    }
}

fn check_frame_len(sample_rate_hz: u32, actual: usize) -> Result<()> {
    let expected = frame_len(sample_rate_hz);
    if actual != expected {
        return Err(Error::FrameLength { expected, actual });
    }
    Ok(())
}
