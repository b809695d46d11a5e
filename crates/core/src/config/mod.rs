use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::Result;

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub audio: AudioConfig,
    pub scheduler: SchedulerConfig,
    pub engine: EngineConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    /// Parses a JSON document. Missing sections and fields fall back to
    /// their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&json)?;
        tracing::debug!(?path, "loaded configuration");
        Ok(config)
    }
}

/// Configuration specific to the audio subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub block_size: usize,
    /// Gain of the summing bus feeding the master limiter.
    pub master_gain: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            block_size: 512,
            master_gain: 0.55,
        }
    }
}

/// Timing of the look-ahead scheduler. All times are seconds on the engine
/// clock unless the field name says otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub tick_interval_ms: u64,
    pub look_ahead: f64,
    /// Lead time between `start()` and the first scheduled downbeat.
    pub start_offset: f64,
    /// Lead time between a song jump and the jumped-to downbeat.
    pub jump_offset: f64,
    /// Fixed seed for humanisation and shuffle; `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl SchedulerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,
            look_ahead: 0.2,
            start_offset: 0.5,
            jump_offset: 0.3,
            seed: None,
        }
    }
}

/// Voice and bus lifetime tuning shared by every instrument engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Length of the click-free gain ramp applied by `mute_all`.
    pub mute_ramp: f64,
    /// Extra time a voice stays allocated after its release has finished.
    pub voice_tail_margin: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mute_ramp: 0.015,
            voice_tail_margin: 0.3,
        }
    }
}

/// Smoothing applied to the telemetry stream consumed by the visuals.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// One-pole coefficient per reference frame for the spectral bands.
    pub band_smoothing: f32,
    /// One-pole coefficient per reference frame for the genre blend.
    pub genre_smoothing: f32,
    /// Frame rate the smoothing coefficients were tuned at.
    pub reference_frame_rate: f32,
    pub fft_size: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            band_smoothing: 0.15,
            genre_smoothing: 0.02,
            reference_frame_rate: 60.0,
            fft_size: 256,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config =
            AppConfig::from_json_str(r#"{ "scheduler": { "look_ahead": 0.5, "seed": 7 } }"#)
                .unwrap();

        assert_eq!(config.scheduler.look_ahead, 0.5);
        assert_eq!(config.scheduler.seed, Some(7));
        assert_eq!(config.scheduler.tick_interval_ms, 100);
        assert_eq!(config.audio.sample_rate, 48_000);
        assert!((config.engine.mute_ramp - 0.015).abs() < 1e-9);
    }

    #[test]
    fn rejects_malformed_json() {
        let err = AppConfig::from_json_str("{ audio: ").unwrap_err();
        assert!(matches!(err, crate::StonerizmError::Config(_)));
    }

    #[test]
    fn tick_interval_is_never_zero() {
        let config = SchedulerConfig {
            tick_interval_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.tick_interval(), Duration::from_millis(1));
    }
}
