//! Configuration type definitions

use serde::{Deserialize, Serialize};

/// Clipboard access configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipboardConfig {
    /// How long a caller waits for the apartment thread, in milliseconds
    pub apartment_timeout_ms: u64,
}

impl Default for ClipboardConfig {
    fn default() -> Self {
        Self {
            apartment_timeout_ms: 1000,
        }
    }
}

/// Text recognition configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// BCP-47 language tag (None = user profile languages)
    pub language: Option<String>,

    /// Remove all whitespace from recognized text
    pub trim_whitespace: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level ("trace", "debug", "info", "warn", "error")
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
