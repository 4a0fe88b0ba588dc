//! Player configuration
//!
//! Timing and synthesis settings, loadable from JSON. Every field has a
//! default so partial files are fine.

use crate::analyser::{self, DEFAULT_ANALYSER_SIZE};
use crate::decoder::ChipConfig;
use crate::scheduler::DEFAULT_LEAD_WINDOW;
use crate::voices::DEFAULT_EVENT_CAPACITY;
use crate::{ReplayError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default output sample rate
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Default scheduler wake-up interval in seconds
pub const DEFAULT_POLL_INTERVAL: f64 = 0.025;

/// Playback configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Output sample rate in Hz
    pub sample_rate: u32,
    /// How far ahead of the audio clock frames are scheduled (seconds)
    pub lead_window_secs: f64,
    /// Scheduler wake-up interval (seconds)
    pub poll_interval_secs: f64,
    /// Analyser window length (power of two)
    pub analyser_size: usize,
    /// Maximum pending target sets in the voice bank
    pub event_queue_capacity: usize,
    /// Chip timing approximations
    pub chip: ChipConfig,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        PlayerConfig {
            sample_rate: DEFAULT_SAMPLE_RATE,
            lead_window_secs: DEFAULT_LEAD_WINDOW,
            poll_interval_secs: DEFAULT_POLL_INTERVAL,
            analyser_size: DEFAULT_ANALYSER_SIZE,
            event_queue_capacity: DEFAULT_EVENT_CAPACITY,
            chip: ChipConfig::default(),
        }
    }
}

impl PlayerConfig {
    /// Tight timing for responsive hosts
    pub fn low_latency() -> Self {
        PlayerConfig {
            lead_window_secs: 0.04,
            poll_interval_secs: 0.010,
            analyser_size: 1024,
            ..Self::default()
        }
    }

    /// Generous lead for hosts with coarse timers
    pub fn stable() -> Self {
        PlayerConfig {
            lead_window_secs: 0.2,
            poll_interval_secs: 0.05,
            event_queue_capacity: 1024,
            ..Self::default()
        }
    }

    /// Reject settings the player cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(ReplayError::ConfigError("sample_rate must be > 0".into()));
        }
        if !self.lead_window_secs.is_finite() || self.lead_window_secs <= 0.0 {
            return Err(ReplayError::ConfigError(format!(
                "lead_window_secs must be > 0, got {}",
                self.lead_window_secs
            )));
        }
        if !self.poll_interval_secs.is_finite() || self.poll_interval_secs <= 0.0 {
            return Err(ReplayError::ConfigError(format!(
                "poll_interval_secs must be > 0, got {}",
                self.poll_interval_secs
            )));
        }
        if self.poll_interval_secs > self.lead_window_secs {
            log::warn!(
                "poll interval {:.3}s exceeds lead window {:.3}s; expect late wake-ups",
                self.poll_interval_secs,
                self.lead_window_secs
            );
        }
        analyser::validate_size(self.analyser_size)?;
        if self.event_queue_capacity == 0 {
            return Err(ReplayError::ConfigError(
                "event_queue_capacity must be > 0".into(),
            ));
        }
        if !self.chip.master_clock_hz.is_finite() || self.chip.master_clock_hz <= 0.0 {
            return Err(ReplayError::ConfigError(format!(
                "chip.master_clock_hz must be > 0, got {}",
                self.chip.master_clock_hz
            )));
        }
        if !self.chip.envelope_clock_divider.is_finite() || self.chip.envelope_clock_divider <= 0.0
        {
            return Err(ReplayError::ConfigError(format!(
                "chip.envelope_clock_divider must be > 0, got {}",
                self.chip.envelope_clock_divider
            )));
        }
        Ok(())
    }

    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: PlayerConfig = serde_json::from_str(json)
            .map_err(|e| ReplayError::ConfigError(format!("invalid config JSON: {e}")))?;
        config.validate()?;
        log::debug!("loaded player config: {config:?}");
        Ok(config)
    }

    /// Read, parse and validate a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// Pretty-printed JSON
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ReplayError::ConfigError(format!("cannot serialize config: {e}")))
    }
}
