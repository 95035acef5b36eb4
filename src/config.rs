//! Configuration file handling for animated-image.
//!
//! Loads settings from `<config_dir>/animated-image/config.toml` or a custom
//! path, then layers environment values and command-line overrides on top.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::genai::{
    GenAiConfig, GenAiError, OutputConfig, TransportConfig, TransportKind, DEFAULT_API_BASE_URL,
    DEFAULT_IMAGE_MODEL, DEFAULT_POLL_INTERVAL, DEFAULT_POLL_TIMEOUT, DEFAULT_VIDEO_MODEL,
};

/// Primary API key variable.
pub const API_KEY_VAR: &str = "GOOGLE_API_KEY";

/// Fallback API key variable.
pub const FALLBACK_API_KEY_VAR: &str = "GEMINI_API_KEY";

/// Overrides `[output] dir`.
pub const OUTPUT_DIR_VAR: &str = "OUTPUT_DIR";

/// Default directory for generated artifacts.
pub const DEFAULT_OUTPUT_DIR: &str = "outputs";

/// Configuration file structure for animated-image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub api: ApiSettings,
    #[serde(default)]
    pub models: ModelSettings,
    #[serde(default)]
    pub video: OutputConfig,
    #[serde(default)]
    pub polling: PollingSettings,
    #[serde(default)]
    pub output: OutputSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub transport: TransportKind,
    /// Never read from the file; filled from the environment.
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            transport: TransportKind::default(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSettings {
    #[serde(default = "default_image_model")]
    pub image: String,
    #[serde(default = "default_video_model")]
    pub video: String,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            image: default_image_model(),
            video: default_video_model(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollingSettings {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_image_model() -> String {
    DEFAULT_IMAGE_MODEL.to_string()
}

fn default_video_model() -> String {
    DEFAULT_VIDEO_MODEL.to_string()
}

fn default_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL.as_millis() as u64
}

fn default_timeout_ms() -> u64 {
    DEFAULT_POLL_TIMEOUT.as_millis() as u64
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_DIR)
}

impl Settings {
    /// Load settings from a file path, or the default path when `None`.
    /// Returns defaults if the file doesn't exist.
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(PathBuf::from).unwrap_or_else(default_path);

        if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::IoError {
                path: path.clone(),
                source: e,
            })?;
            Self::parse(&content).map_err(|e| ConfigError::ParseError {
                path: path.clone(),
                source: e,
            })
        } else {
            log::debug!("No config file at {}, using defaults", path.display());
            Ok(Settings::default())
        }
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Apply environment values through `lookup`.
    ///
    /// Empty values are treated as unset.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(key) = non_empty(API_KEY_VAR).or_else(|| non_empty(FALLBACK_API_KEY_VAR)) {
            self.api.api_key = Some(key);
        }
        if let Some(dir) = non_empty(OUTPUT_DIR_VAR) {
            self.output.dir = PathBuf::from(dir);
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.polling.interval_ms)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.polling.timeout_ms)
    }

    /// Build the explicit configuration handed to the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns `GenAiError::MissingApiKey` if no key was supplied.
    pub fn to_genai_config(&self) -> Result<GenAiConfig, GenAiError> {
        let api_key = self
            .api
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or(GenAiError::MissingApiKey)?;

        Ok(GenAiConfig {
            transport: TransportConfig {
                api_key,
                base_url: self.api.base_url.clone(),
                kind: self.api.transport,
            },
            image_model: self.models.image.clone(),
            video_model: self.models.video.clone(),
            output: self.video.clone(),
            poll_interval: self.poll_interval(),
            poll_timeout: self.poll_timeout(),
        })
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError { path, source } => {
                write!(f, "Failed to read config file '{}': {}", path.display(), source)
            }
            ConfigError::ParseError { path, source } => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::IoError { source, .. } => Some(source),
            ConfigError::ParseError { source, .. } => Some(source),
        }
    }
}

/// Get the default config file path.
pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("animated-image").join("config.toml"))
        .unwrap_or_else(|| PathBuf::from(".animated-image.toml"))
}

/// Template written by `config init`.
pub const DEFAULT_CONFIG: &str = r#"# animated-image configuration
# The API key is read from GOOGLE_API_KEY (or GEMINI_API_KEY), never from this file.

[api]
base_url = "https://generativelanguage.googleapis.com/v1beta"
# Transport: rest (key as query parameter) or sdk (key as header)
transport = "rest"

[models]
image = "gemini-2.5-flash-image"
video = "veo-3.1-generate-preview"

[video]
duration_seconds = 8
resolution = "720p"
aspect_ratio = "16:9"

[polling]
interval_ms = 7000
timeout_ms = 900000

[output]
# Overridden by OUTPUT_DIR
dir = "outputs"
"#;
