use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Result, VisualiserError};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub render: RenderConfig,
}

impl AppConfig {
    /// Parses a configuration from JSON and validates it.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), "loaded configuration file");
        Self::from_json_str(&text)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Checks every section. A period longer than the usable window is legal
    /// because the capture sink clamps, but it is worth a warning.
    pub fn validate(&self) -> Result<()> {
        self.audio.validate()?;
        self.history.validate()?;
        self.render.validate()?;

        if self.audio.period_frames > self.history.usable_samples_per_set {
            tracing::warn!(
                period_frames = self.audio.period_frames,
                usable = self.history.usable_samples_per_set,
                "audio period exceeds usable samples per set; excess frames are dropped"
            );
        }
        Ok(())
    }
}

/// Stream format delivered by the audio output driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: usize,
    pub period_frames: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            channels: 2,
            period_frames: 480,
        }
    }
}

impl AudioConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(VisualiserError::config("sample_rate must be non-zero"));
        }
        if self.channels == 0 {
            return Err(VisualiserError::config("channels must be non-zero"));
        }
        if self.period_frames == 0 {
            return Err(VisualiserError::config("period_frames must be non-zero"));
        }
        let seconds = self.period_frames as f64 / self.sample_rate as f64;
        std::time::Duration::try_from_secs_f64(seconds)
            .map_err(|_| VisualiserError::config("period_frames is too long"))?;
        Ok(())
    }

    /// Wall-clock length of one driver period. Only meaningful once
    /// [`AudioConfig::validate`] has passed.
    pub fn period(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(self.period_frames as f64 / self.sample_rate as f64)
    }
}

/// Geometry of the sample history ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub num_sets: usize,
    pub samples_per_set: usize,
    pub usable_samples_per_set: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            num_sets: 100,
            samples_per_set: 512,
            usable_samples_per_set: 480,
        }
    }
}

impl HistoryConfig {
    pub fn new(num_sets: usize, samples_per_set: usize, usable_samples_per_set: usize) -> Self {
        Self {
            num_sets,
            samples_per_set,
            usable_samples_per_set,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_sets == 0 {
            return Err(VisualiserError::config("num_sets must be non-zero"));
        }
        if self.samples_per_set == 0 {
            return Err(VisualiserError::config("samples_per_set must be non-zero"));
        }
        if self.usable_samples_per_set == 0 {
            return Err(VisualiserError::config(
                "usable_samples_per_set must be non-zero",
            ));
        }
        if self.usable_samples_per_set > self.samples_per_set {
            return Err(VisualiserError::config(format!(
                "usable_samples_per_set ({}) exceeds samples_per_set ({})",
                self.usable_samples_per_set, self.samples_per_set
            )));
        }
        Ok(())
    }

    /// Number of points a full snapshot renders.
    pub fn point_count(&self) -> usize {
        self.num_sets * self.usable_samples_per_set
    }
}

/// Tuning for the point geometry handed to the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub frame_rate: f32,
    pub amplitude_scale: f32,
    pub depth_spacing: f32,
    /// Power applied to the linear age weight; 3.0 gives the cubic falloff.
    pub emphasis_exponent: f32,
    /// How strongly the newest set's RMS swells the whole waterfall.
    pub reactivity: f32,
    pub base_color: [f32; 3],
    pub peak_color: [f32; 3],
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            frame_rate: 60.0,
            amplitude_scale: 0.5,
            depth_spacing: 0.02,
            emphasis_exponent: 3.0,
            reactivity: 1.5,
            base_color: [0.08, 0.16, 0.55],
            peak_color: [1.0, 0.85, 0.3],
        }
    }
}

impl RenderConfig {
    pub fn validate(&self) -> Result<()> {
        crate::timeline::frame_interval(self.frame_rate)?;
        if !(self.emphasis_exponent.is_finite() && self.emphasis_exponent >= 0.0) {
            return Err(VisualiserError::config(
                "emphasis_exponent must be a non-negative number",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_reference_stream() {
        let config = AppConfig::default();
        assert_eq!(config.audio.sample_rate, 48_000);
        assert_eq!(config.audio.channels, 2);
        assert_eq!(config.audio.period_frames, 480);
        assert_eq!(config.history, HistoryConfig::new(100, 512, 480));
        assert!(config.validate().is_ok());
        assert_eq!(config.audio.period(), std::time::Duration::from_millis(10));
    }

    #[test]
    fn rejects_usable_window_larger_than_set() {
        let history = HistoryConfig::new(4, 16, 32);
        let err = history.validate().unwrap_err();
        assert!(format!("{err}").contains("exceeds"));
    }

    #[test]
    fn rejects_empty_ring() {
        assert!(HistoryConfig::new(0, 16, 16).validate().is_err());
        assert!(HistoryConfig::new(4, 0, 0).validate().is_err());
        assert!(HistoryConfig::new(4, 16, 0).validate().is_err());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config = AppConfig::from_json_str(r#"{ "history": { "num_sets": 8 } }"#).unwrap();
        assert_eq!(config.history.num_sets, 8);
        assert_eq!(config.history.samples_per_set, 512);
        assert_eq!(config.audio, AudioConfig::default());
    }

    #[test]
    fn json_round_trip_preserves_config() {
        let mut config = AppConfig::default();
        config.render.emphasis_exponent = 2.0;
        let json = config.to_json_pretty().unwrap();
        assert_eq!(AppConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn vanishing_frame_rate_is_rejected_before_the_clock_sees_it() {
        let err = AppConfig::from_json_str(r#"{ "render": { "frame_rate": 1e-39 } }"#).unwrap_err();
        assert!(matches!(err, VisualiserError::InvalidConfig(_)));

        let config = AppConfig::from_json_str(r#"{ "render": { "frame_rate": 30 } }"#).unwrap();
        assert!(crate::FrameClock::new(config.render.frame_rate).is_ok());
    }

    #[test]
    fn period_longer_than_usable_window_is_accepted() {
        let mut config = AppConfig::default();
        config.audio.period_frames = 1024;
        assert!(config.audio.period_frames > config.history.usable_samples_per_set);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn point_count_covers_every_usable_sample() {
        assert_eq!(HistoryConfig::default().point_count(), 100 * 480);
    }

    #[test]
    fn invalid_json_config_is_rejected() {
        let err = AppConfig::from_json_str(r#"{ "audio": { "channels": 0 } }"#).unwrap_err();
        assert!(matches!(err, VisualiserError::InvalidConfig(_)));

        let err = AppConfig::from_json_str("not json").unwrap_err();
        assert!(matches!(err, VisualiserError::Json(_)));
    }
}
