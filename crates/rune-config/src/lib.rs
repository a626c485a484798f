//! Rune animation configuration system
//!
//! This crate provides centralized configuration for the animation engine,
//! loading settings from `rune.toml` with environment variable overrides.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Errors that can occur while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid TOML for [`RuneConfig`].
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RuneConfig {
    /// Animation engine settings
    pub animation: AnimationConfig,
    /// Diagnostic output settings
    pub diagnostics: DiagnosticsConfig,
}

/// Animation engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    /// Interval between host frames in milliseconds (default: 16)
    pub frame_interval_ms: f64,
    /// Host time at which the document timeline reads zero
    pub document_origin_ms: f64,
    /// Upper bound on frames a single manual `advance` may run
    pub max_frames_per_advance: u32,
}

/// Diagnostic configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Emit a trace event for every animation frame
    pub trace_frames: bool,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 16.0,
            document_origin_ms: 0.0,
            max_frames_per_advance: 100_000,
        }
    }
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self { trace_frames: false }
    }
}

impl AnimationConfig {
    /// Frame interval clamped to a usable value.
    ///
    /// Non-finite or non-positive intervals fall back to the default.
    pub fn effective_frame_interval(&self) -> f64 {
        if self.frame_interval_ms.is_finite() && self.frame_interval_ms > 0.0 {
            self.frame_interval_ms
        } else {
            Self::default().frame_interval_ms
        }
    }
}

impl RuneConfig {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    /// * `path` - Path to the rune.toml configuration file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration from the default location (rune.toml in the current directory)
    /// or return default configuration if file doesn't exist
    pub fn load_or_default() -> Self {
        Self::load_from_file("rune.toml").unwrap_or_default()
    }

    /// Merge configuration with environment variables
    ///
    /// Environment variables take precedence over configuration file values.
    pub fn merge_with_env(&mut self) {
        if let Ok(val) = std::env::var("RUNE_FRAME_INTERVAL_MS") {
            if let Ok(interval) = val.parse::<f64>() {
                self.animation.frame_interval_ms = interval;
            }
        }
        if let Ok(val) = std::env::var("RUNE_DOCUMENT_ORIGIN_MS") {
            if let Ok(origin) = val.parse::<f64>() {
                self.animation.document_origin_ms = origin;
            }
        }
        if let Ok(val) = std::env::var("RUNE_MAX_FRAMES_PER_ADVANCE") {
            if let Ok(max) = val.parse::<u32>() {
                self.animation.max_frames_per_advance = max;
            }
        }
        if let Ok(val) = std::env::var("RUNE_TRACE_FRAMES") {
            self.diagnostics.trace_frames = val == "1" || val.eq_ignore_ascii_case("true");
        }
    }

    /// Load configuration with environment variable overrides
    ///
    /// This is the recommended way to load configuration:
    /// 1. Load from rune.toml (or use defaults if not found)
    /// 2. Override with environment variables if present
    pub fn load() -> Self {
        let mut config = Self::load_or_default();
        config.merge_with_env();
        config
    }
}
