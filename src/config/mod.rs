//! Configuration management
//!
//! Handles loading, validation, and merging of configuration from:
//! - TOML files
//! - CLI arguments

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub mod types;

pub use types::{ClipboardConfig, LoggingConfig, OcrConfig};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Clipboard configuration
    pub clipboard: ClipboardConfig,
    /// OCR configuration
    pub ocr: OcrConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    /// Default config file location (`<config dir>/clipsharp/config.toml`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("clipsharp").join("config.toml"))
    }

    /// Load the default config file, or defaults if there is none
    pub fn load_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load `path` if given, else the default location
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Self::load_default(),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.clipboard.apartment_timeout_ms == 0 {
            anyhow::bail!("apartment_timeout_ms must be greater than zero");
        }

        if let Some(language) = &self.ocr.language {
            if language.trim().is_empty() {
                anyhow::bail!("OCR language tag is empty");
            }
        }

        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!("Invalid log level: {}", self.logging.level),
        }

        Ok(())
    }

    /// Override config with CLI arguments
    pub fn with_overrides(mut self, language: Option<String>, trim_whitespace: bool) -> Self {
        if language.is_some() {
            self.ocr.language = language;
        }
        if trim_whitespace {
            self.ocr.trim_whitespace = true;
        }
        self
    }

    /// Apartment timeout as a duration
    pub fn apartment_timeout(&self) -> Duration {
        Duration::from_millis(self.clipboard.apartment_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.clipboard.apartment_timeout_ms, 1000);
        assert_eq!(config.logging.level, "info");
        assert!(config.ocr.language.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[ocr]\nlanguage = \"ja-JP\"\ntrim_whitespace = true").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.ocr.language.as_deref(), Some("ja-JP"));
        assert!(config.ocr.trim_whitespace);
        assert_eq!(config.apartment_timeout(), Duration::from_millis(1000));
    }

    #[test]
    fn test_config_validation_zero_timeout() {
        let mut config = Config::default();
        config.clipboard.apartment_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_invalid_level() {
        let mut config = Config::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[clipboard]\napartment_timeout_ms = 0").unwrap();
        assert!(Config::load(file.path()).is_err());

        assert!(Config::load("/nonexistent/clipsharp.toml").is_err());
    }

    #[test]
    fn test_cli_overrides() {
        let config = Config::default().with_overrides(Some("en-US".to_string()), true);
        assert_eq!(config.ocr.language.as_deref(), Some("en-US"));
        assert!(config.ocr.trim_whitespace);

        let config = config.with_overrides(None, false);
        assert_eq!(config.ocr.language.as_deref(), Some("en-US"));
    }
}
