//! Configuration file management for sigscope.
//!
//! Loads application configuration from a TOML file in the user's
//! config directory. Every field has a default, so a missing file or an
//! empty file both yield a working configuration.

use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

use crate::scope::state::Mode;

/// Audio capture configuration.
#[derive(Debug, Deserialize)]
pub struct AudioConfig {
    /// Audio device to use. Options:
    /// - "default" for the system default device
    /// - numeric index (0, 1, 2, etc.) from `sigscope list-devices`
    /// - device name from `sigscope list-devices`
    #[serde(default = "default_device")]
    pub device: String,
    /// Capture sample rate in Hz. Opening fails if the device cannot
    /// run at this rate.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Samples per capture chunk. Must be a power of two.
    #[serde(default = "default_chunk_len")]
    pub chunk_len: usize,
    /// Chunks held in the analysis window. Must be a power of two.
    #[serde(default = "default_ring_chunks")]
    pub ring_chunks: usize,
}

fn default_device() -> String {
    "default".to_string()
}

fn default_sample_rate() -> u32 {
    44100
}

fn default_chunk_len() -> usize {
    1024
}

fn default_ring_chunks() -> usize {
    8
}

impl Default for AudioConfig {
    fn default() -> Self {
        AudioConfig {
            device: default_device(),
            sample_rate: default_sample_rate(),
            chunk_len: default_chunk_len(),
            ring_chunks: default_ring_chunks(),
        }
    }
}

/// Display configuration.
#[derive(Debug, Deserialize)]
pub struct DisplayConfig {
    /// Render tick interval in milliseconds.
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
    /// Startup display mode: "frequency" or "time".
    #[serde(default = "default_mode")]
    pub mode: Mode,
    /// Start with a logarithmic amplitude axis in frequency mode.
    #[serde(default)]
    pub log_scale: bool,
}

fn default_frame_interval_ms() -> u64 {
    50
}

fn default_mode() -> Mode {
    Mode::Frequency
}

impl Default for DisplayConfig {
    fn default() -> Self {
        DisplayConfig {
            frame_interval_ms: default_frame_interval_ms(),
            mode: default_mode(),
            log_scale: false,
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Default, Deserialize)]
pub struct SigscopeConfig {
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

impl SigscopeConfig {
    /// Loads configuration from the user's config directory, falling
    /// back to defaults when no file exists.
    ///
    /// # Errors
    /// - If the config file cannot be read
    /// - If the TOML is malformed
    /// - If a value fails validation
    pub fn load_or_default() -> anyhow::Result<Self> {
        let config_path = get_config_path()?;
        if !config_path.exists() {
            tracing::debug!(
                "No config file at {}, using defaults",
                config_path.display()
            );
            return Ok(SigscopeConfig::default());
        }

        let content = fs::read_to_string(&config_path)?;
        let config: SigscopeConfig = toml::from_str(&content)?;
        config.validate()?;
        tracing::debug!("Configuration loaded from {}", config_path.display());
        Ok(config)
    }

    /// Checks value ranges the rest of the program depends on.
    ///
    /// Chunk and ring sizes must be powers of two so the analysis
    /// window length is one as well; zoom shifts and the transform both
    /// assume it.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.audio.sample_rate == 0 {
            anyhow::bail!("audio.sample_rate must be greater than 0");
        }
        if !self.audio.chunk_len.is_power_of_two() || self.audio.chunk_len < 64 {
            anyhow::bail!("audio.chunk_len must be a power of two, at least 64");
        }
        if !self.audio.ring_chunks.is_power_of_two() {
            anyhow::bail!("audio.ring_chunks must be a power of two");
        }
        if self.audio.chunk_len * self.audio.ring_chunks > 1 << 20 {
            anyhow::bail!("analysis window exceeds 1M samples, reduce chunk_len or ring_chunks");
        }
        if self.display.frame_interval_ms == 0 {
            anyhow::bail!("display.frame_interval_ms must be greater than 0");
        }
        Ok(())
    }

    /// Half the sample rate; the top of the representable frequency axis.
    pub fn nyquist(&self) -> f64 {
        self.audio.sample_rate as f64 / 2.0
    }

    /// Total samples in the analysis window.
    pub fn window_len(&self) -> usize {
        self.audio.chunk_len * self.audio.ring_chunks
    }
}

/// Retrieves the path to the config file.
///
/// # Errors
/// - If the home directory cannot be determined
fn get_config_path() -> Result<PathBuf, std::io::Error> {
    let home = dirs::home_dir().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Could not find home directory",
        )
    })?;
    Ok(home.join(".config").join("sigscope").join("sigscope.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_gives_defaults() {
        let config: SigscopeConfig = toml::from_str("").unwrap();
        assert_eq!(config.audio.device, "default");
        assert_eq!(config.audio.sample_rate, 44100);
        assert_eq!(config.audio.chunk_len, 1024);
        assert_eq!(config.audio.ring_chunks, 8);
        assert_eq!(config.display.frame_interval_ms, 50);
        assert_eq!(config.display.mode, Mode::Frequency);
        assert!(!config.display.log_scale);
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_toml_overrides() {
        let config: SigscopeConfig = toml::from_str(
            r#"
            [audio]
            device = "2"
            sample_rate = 48000

            [display]
            mode = "time"
            log_scale = true
            "#,
        )
        .unwrap();
        assert_eq!(config.audio.device, "2");
        assert_eq!(config.audio.sample_rate, 48000);
        assert_eq!(config.audio.chunk_len, 1024);
        assert_eq!(config.display.mode, Mode::Time);
        assert!(config.display.log_scale);
    }

    #[test]
    fn test_non_power_of_two_chunk_rejected() {
        let config: SigscopeConfig = toml::from_str("[audio]\nchunk_len = 1000").unwrap();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("chunk_len"));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config: SigscopeConfig =
            toml::from_str("[display]\nframe_interval_ms = 0").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_derived_dimensions() {
        let config = SigscopeConfig::default();
        assert_eq!(config.nyquist(), 22050.0);
        assert_eq!(config.window_len(), 8192);
    }
}
