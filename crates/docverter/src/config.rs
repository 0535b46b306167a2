//! Configuration handling for the docverter CLI.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use docverter_core::ConverterConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    /// Converter configuration
    #[serde(default)]
    pub converter: ConverterConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load from the default location; a missing file yields defaults.
    pub fn load() -> Result<Self> {
        Self::load_from(Self::config_path())
    }

    /// Load from `path`; a missing file yields defaults.
    pub fn load_from(path: Option<PathBuf>) -> Result<Self> {
        match path {
            Some(path) if path.exists() => Self::read(&path),
            _ => Ok(Self::default()),
        }
    }

    fn read(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("Invalid TOML in {}", path.display()))
    }

    /// Location of `config.toml`.
    pub fn config_path() -> Option<PathBuf> {
        config_dir().map(|dir| dir.join("config.toml"))
    }

    /// A commented sample configuration file.
    pub fn sample_toml() -> &'static str {
        r#"# docverter configuration

[converter]
# Provider used when none is requested: "standard" or "advanced"
default_provider = "standard"
# Scratch directory (system temp dir when unset)
# temp_dir = "/var/tmp/docverter"
enable_ocr = true
# OCR engine for the advanced provider; "none" disables it
ocr_provider = "ocrmypdf"
fallback_to_standard = true
cleanup_temp_files = true
# Preferred backends: pdf-extract, lopdf, pdf_oxide / docx-rs
# pdf_parser = "lopdf"
# office_parser = "docx-rs"
detect_tables = true
preprocess_images = true

[logging]
level = "info"
"#
    }
}

/// Get the XDG config directory for docverter.
pub fn config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("DOCVERTER_CONFIG_DIR") {
        return Some(PathBuf::from(dir));
    }

    ProjectDirs::from("", "", "docverter").map(|dirs| dirs.config_dir().to_path_buf())
}
