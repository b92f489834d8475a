use std::time::Duration;

use serde::Deserialize;

use crate::builder::FrameUsageMode;
use crate::collab::SortCriterion;
use crate::error::MacError;
use crate::frame::{FrameParams, SHORT_FRAME_BYTES};

/// Raw, all-optional MAC configuration as read from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MacConfigInput {
    pub interval_ms: Option<f64>,
    pub dummy_frames: Option<bool>,
    pub frame_usage_mode: Option<String>,
    pub scheduling_start_threshold_ms: Option<f64>,
    pub scheduling_stop_threshold_ms: Option<f64>,
    pub sort_criterion: Option<String>,
    pub modcod: Option<u32>,
    pub data_min_bytes: Option<u32>,
    pub control_min_bytes: Option<u32>,
    pub frame: FrameConfigInput,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FrameConfigInput {
    pub data_overhead_bytes: Option<u32>,
    pub control_overhead_bytes: Option<u32>,
    pub short_duration_us: Option<u64>,
    pub normal_duration_us: Option<u64>,
}

/// Validated configuration of one gateway MAC.
#[derive(Debug, Clone, PartialEq)]
pub struct MacConfig {
    /// Time between frame transmissions. Constant for the whole run.
    pub interval: Duration,
    /// Send a filler frame on ticks that find the frame queue empty.
    pub dummy_frames: bool,
    pub frame_usage_mode: FrameUsageMode,
    /// Reserved for round-boundary logic; carried and validated only.
    pub scheduling_start_threshold: Duration,
    /// Reserved for round-boundary logic; carried and validated only.
    pub scheduling_stop_threshold: Duration,
    pub sort_criterion: SortCriterion,
    pub modcod: u32,
    /// Smallest frame room worth offering to a data object.
    pub data_min_bytes: u32,
    /// Smallest frame room worth offering to a control object.
    pub control_min_bytes: u32,
    pub frame: FrameParams,
}

impl Default for MacConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(2),
            dummy_frames: false,
            frame_usage_mode: FrameUsageMode::NormalOnly,
            scheduling_start_threshold: Duration::from_millis(5),
            scheduling_stop_threshold: Duration::from_millis(15),
            sort_criterion: SortCriterion::NoSort,
            modcod: 3,
            data_min_bytes: 5,
            control_min_bytes: 500,
            frame: FrameParams::default(),
        }
    }
}

fn millis(value: f64, key: &str) -> Result<Duration, MacError> {
    if !value.is_finite() || value < 0.0 {
        return Err(MacError::InvalidConfig(format!(
            "{} must be a non-negative number of milliseconds, got {}",
            key, value
        )));
    }
    Ok(Duration::from_nanos((value * 1_000_000.0).round() as u64))
}

impl MacConfigInput {
    pub fn resolve(self) -> Result<MacConfig, MacError> {
        let defaults = MacConfig::default();
        let frame_defaults = defaults.frame.clone();

        let frame_usage_mode = match self.frame_usage_mode.as_deref() {
            Some(s) => s.parse()?,
            None => defaults.frame_usage_mode,
        };
        let sort_criterion = match self.sort_criterion.as_deref() {
            Some(s) => s.parse()?,
            None => defaults.sort_criterion,
        };

        let config = MacConfig {
            interval: match self.interval_ms {
                Some(v) => millis(v, "interval_ms")?,
                None => defaults.interval,
            },
            dummy_frames: self.dummy_frames.unwrap_or(defaults.dummy_frames),
            frame_usage_mode,
            scheduling_start_threshold: match self.scheduling_start_threshold_ms {
                Some(v) => millis(v, "scheduling_start_threshold_ms")?,
                None => defaults.scheduling_start_threshold,
            },
            scheduling_stop_threshold: match self.scheduling_stop_threshold_ms {
                Some(v) => millis(v, "scheduling_stop_threshold_ms")?,
                None => defaults.scheduling_stop_threshold,
            },
            sort_criterion,
            modcod: self.modcod.unwrap_or(defaults.modcod),
            data_min_bytes: self.data_min_bytes.unwrap_or(defaults.data_min_bytes),
            control_min_bytes: self.control_min_bytes.unwrap_or(defaults.control_min_bytes),
            frame: FrameParams {
                data_overhead_bytes: self
                    .frame
                    .data_overhead_bytes
                    .unwrap_or(frame_defaults.data_overhead_bytes),
                control_overhead_bytes: self
                    .frame
                    .control_overhead_bytes
                    .unwrap_or(frame_defaults.control_overhead_bytes),
                short_frame_duration: self
                    .frame
                    .short_duration_us
                    .map(Duration::from_micros)
                    .unwrap_or(frame_defaults.short_frame_duration),
                normal_frame_duration: self
                    .frame
                    .normal_duration_us
                    .map(Duration::from_micros)
                    .unwrap_or(frame_defaults.normal_frame_duration),
            },
        };
        config.validate()?;
        Ok(config)
    }
}

impl MacConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, MacError> {
        if input.trim().is_empty() {
            return Ok(MacConfig::default());
        }
        let parsed: MacConfigInput = toml::from_str(input)
            .map_err(|e| MacError::InvalidConfig(format!("invalid config TOML: {}", e)))?;
        parsed.resolve()
    }

    /// Checks the invariants the scheduler relies on.
    ///
    /// Thresholds must fit a fresh short frame, otherwise an object could
    /// never be served and the packing loop would close empty frames forever.
    pub fn validate(&self) -> Result<(), MacError> {
        if self.interval.is_zero() {
            return Err(MacError::InvalidConfig("interval must be positive".into()));
        }
        for (key, value) in [
            ("data_min_bytes", self.data_min_bytes),
            ("control_min_bytes", self.control_min_bytes),
        ] {
            if value == 0 || value > SHORT_FRAME_BYTES {
                return Err(MacError::InvalidConfig(format!(
                    "{} must be within 1..={}, got {}",
                    key, SHORT_FRAME_BYTES, value
                )));
            }
        }
        if self.scheduling_start_threshold > self.scheduling_stop_threshold {
            return Err(MacError::InvalidConfig(format!(
                "scheduling start threshold {:?} exceeds stop threshold {:?}",
                self.scheduling_start_threshold, self.scheduling_stop_threshold
            )));
        }
        Ok(())
    }
}
