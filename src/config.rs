//! Workstation configuration
//!
//! Defaults match the mobile app: 44.1kHz stereo capture, a 64-bar grid,
//! loops quantized to at most 8 bars, 120 BPM and a 3-2-1 countdown.
//! Values can be loaded from a JSON file and overridden with `LOOPDECK_*`
//! environment variables.

use std::env;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LoopdeckError, Result};

/// Configuration shared by every component of a workstation session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkstationConfig {
    /// Sample rate used for frame math and capture (Hz)
    pub sample_rate: u32,
    /// Number of bars on the sequencing grid
    pub timeline_bars: u32,
    /// Upper bound for a layer's quantized loop length (power of two)
    pub max_loop_bars: u32,
    /// Project BPM for a fresh session
    pub default_bpm: f32,
    /// Countdown ticks before capture starts
    pub countdown_ticks: u8,
    /// Duration of one countdown tick in milliseconds
    pub countdown_tick_ms: u64,
    /// Capture channel count
    pub capture_channels: u16,
    /// Directory for downloaded layers, recordings and rendered mixes
    pub files_dir: PathBuf,
    /// File name of the preview mix rendered on play
    pub preview_file_name: String,
    /// Musical key sent with uploads
    pub upload_key: String,
}

impl Default for WorkstationConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            timeline_bars: 64,
            max_loop_bars: 8,
            default_bpm: 120.0,
            countdown_ticks: 3,
            countdown_tick_ms: 1000,
            capture_channels: 2,
            files_dir: env::temp_dir().join("loopdeck"),
            preview_file_name: "mixTmp.wav".to_string(),
            upload_key: "G".to_string(),
        }
    }
}

impl WorkstationConfig {
    /// Load configuration from a JSON file, then apply environment overrides
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let config: WorkstationConfig = serde_json::from_reader(BufReader::new(file))?;
        let config = config.with_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Default configuration with environment overrides applied
    pub fn from_env() -> Result<Self> {
        let config = Self::default().with_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `LOOPDECK_*` environment variables on top of this configuration
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Some(v) = env_parse::<u32>("LOOPDECK_SAMPLE_RATE")? {
            self.sample_rate = v;
        }
        if let Some(v) = env_parse::<u32>("LOOPDECK_TIMELINE_BARS")? {
            self.timeline_bars = v;
        }
        if let Some(v) = env_parse::<u32>("LOOPDECK_MAX_LOOP_BARS")? {
            self.max_loop_bars = v;
        }
        if let Some(v) = env_parse::<f32>("LOOPDECK_DEFAULT_BPM")? {
            self.default_bpm = v;
        }
        if let Some(v) = env_parse::<u64>("LOOPDECK_COUNTDOWN_TICK_MS")? {
            self.countdown_tick_ms = v;
        }
        if let Ok(dir) = env::var("LOOPDECK_FILES_DIR") {
            self.files_dir = PathBuf::from(dir);
        }
        if let Ok(key) = env::var("LOOPDECK_UPLOAD_KEY") {
            self.upload_key = key;
        }
        Ok(self)
    }

    /// Reject values the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(config_error("sample_rate must be positive"));
        }
        if self.timeline_bars == 0 {
            return Err(config_error("timeline_bars must be positive"));
        }
        if !self.max_loop_bars.is_power_of_two() {
            return Err(config_error("max_loop_bars must be a power of two"));
        }
        if !(self.default_bpm.is_finite() && self.default_bpm > 0.0) {
            return Err(config_error("default_bpm must be a positive number"));
        }
        if self.capture_channels == 0 {
            return Err(config_error("capture_channels must be positive"));
        }
        Ok(())
    }

    /// Duration of one countdown tick
    pub fn countdown_tick(&self) -> Duration {
        Duration::from_millis(self.countdown_tick_ms)
    }

    /// Path of the preview mix rendered when playback starts
    pub fn preview_path(&self) -> PathBuf {
        self.files_dir.join(&self.preview_file_name)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| config_error(&format!("{} has an invalid value: {}", key, raw))),
        Err(_) => Ok(None),
    }
}

fn config_error(reason: &str) -> LoopdeckError {
    LoopdeckError::Config {
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_are_valid() {
        let config = WorkstationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sample_rate, 44100);
        assert_eq!(config.timeline_bars, 64);
        assert_eq!(config.max_loop_bars, 8);
        assert_eq!(config.countdown_tick(), Duration::from_secs(1));
        assert!(config.preview_path().ends_with("mixTmp.wav"));
    }

    #[test]
    fn test_rejects_non_power_of_two_cap() {
        let config = WorkstationConfig {
            max_loop_bars: 6,
            ..WorkstationConfig::default()
        };
        assert!(matches!(config.validate(), Err(LoopdeckError::Config { .. })));
    }

    #[test]
    fn test_rejects_bad_bpm() {
        let config = WorkstationConfig {
            default_bpm: 0.0,
            ..WorkstationConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{ "timeline_bars": 32, "upload_key": "C" }}"#).unwrap();

        let config: WorkstationConfig =
            serde_json::from_reader(File::open(file.path()).unwrap()).unwrap();
        assert_eq!(config.timeline_bars, 32);
        assert_eq!(config.upload_key, "C");
        assert_eq!(config.sample_rate, 44100);
    }
}
