use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::scene::{CameraOptions, Color};
use crate::{Result, VisualiserError};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scheduler: SchedulerConfig,
    pub audio: AudioConfig,
    pub camera: CameraOptions,
    /// Clear colour as `#rrggbb`.
    pub background_color: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            audio: AudioConfig::default(),
            camera: CameraOptions::default(),
            background_color: "#000000".to_string(),
        }
    }
}

impl AppConfig {
    /// Reads and validates a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: AppConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.scheduler.validate()?;
        self.audio.validate()?;
        self.background_color.parse::<Color>()?;
        if self.camera.near <= 0.0 || self.camera.far <= self.camera.near {
            return Err(VisualiserError::configuration(
                "camera planes must satisfy 0 < near < far",
            ));
        }
        Ok(())
    }

    pub fn background(&self) -> Color {
        Color::parse_or(&self.background_color, Color::BLACK)
    }
}

/// Frame scheduler settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Target logic + render passes per second.
    pub fps: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { fps: 60.0 }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<()> {
        crate::timeline::frame_step(self.fps).map(|_| ())
    }
}

/// Configuration specific to the audio subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    /// Analysis window; buffers handed to objects hold half as many bytes.
    pub fft_size: usize,
    /// Weight of the previous spectrum when smoothing, in `[0, 1)`.
    pub smoothing: f32,
    pub min_decibels: f32,
    pub max_decibels: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            fft_size: 2048,
            smoothing: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
        }
    }
}

impl AudioConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(VisualiserError::configuration("sample rate must be positive"));
        }
        if !self.fft_size.is_power_of_two() || !(32..=32_768).contains(&self.fft_size) {
            return Err(VisualiserError::configuration(format!(
                "fft size must be a power of two between 32 and 32768, got {}",
                self.fft_size
            )));
        }
        if !(0.0..1.0).contains(&self.smoothing) {
            return Err(VisualiserError::configuration(format!(
                "smoothing must be in [0, 1), got {}",
                self.smoothing
            )));
        }
        if self.min_decibels >= self.max_decibels {
            return Err(VisualiserError::configuration(
                "min_decibels must be below max_decibels",
            ));
        }
        Ok(())
    }

    /// Length of the byte buffers produced for each domain.
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }
}
