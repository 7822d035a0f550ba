// Profiler configuration
//
// Loaded once at startup. A missing or broken configuration never fails a
// request: `load_or_disabled` falls back to a disabled profiler.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event_log::ViewLimits;

/// Route that flips the session override
pub const DEFAULT_TOGGLE_PATH: &str = "/_profiler/toggle";

/// Session storage key holding the override flag
pub const DEFAULT_SESSION_KEY: &str = "_profiler";

/// Environment variable that overrides `enabled`
pub const ENABLED_ENV_VAR: &str = "REQPROF_ENABLED";

/// Errors while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Profiler settings
///
/// # Example
/// ```
/// use reqprof::config::ProfilerConfig;
///
/// let config = ProfilerConfig::from_toml_str("debug = true").unwrap();
/// assert!(config.configured_default()); // `enabled` absent, falls back to debug
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfilerConfig {
    /// Explicit profiler switch; when absent the debug flag decides
    pub enabled: Option<bool>,

    /// Application debug flag
    pub debug: bool,

    pub toggle_path: String,

    pub session_key: String,

    /// Upper bound on keys kept per view snapshot
    pub max_view_keys: usize,

    /// Upper bound, in bytes, on the view data preview
    pub max_preview_len: usize,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            enabled: None,
            debug: false,
            toggle_path: DEFAULT_TOGGLE_PATH.to_string(),
            session_key: DEFAULT_SESSION_KEY.to_string(),
            max_view_keys: 64,
            max_preview_len: 256,
        }
    }
}

impl ProfilerConfig {
    /// Configuration with the profiler switched off
    pub fn disabled() -> Self {
        Self {
            enabled: Some(false),
            ..Self::default()
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Load `path`, or fall back to a disabled profiler on any error
    pub fn load_or_disabled(path: &Path) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(
                    "Profiler config {} unusable, profiler disabled: {}",
                    path.display(),
                    e
                );
                Self::disabled()
            }
        }
    }

    /// Apply `REQPROF_ENABLED` if it is set to a recognised value
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(raw) = std::env::var(ENABLED_ENV_VAR) {
            match parse_flag(&raw) {
                Some(flag) => self.enabled = Some(flag),
                None => tracing::warn!("Ignoring {}={:?}: not a boolean", ENABLED_ENV_VAR, raw),
            }
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.toggle_path.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "toggle_path must start with '/', got {:?}",
                self.toggle_path
            )));
        }

        if self.session_key.is_empty() {
            return Err(ConfigError::Invalid(
                "session_key must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Profiler default before any session override
    pub fn configured_default(&self) -> bool {
        self.enabled.unwrap_or(self.debug)
    }

    pub fn view_limits(&self) -> ViewLimits {
        ViewLimits {
            max_keys: self.max_view_keys,
            max_preview_len: self.max_preview_len,
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}
