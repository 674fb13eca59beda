//! Configuration loading and validation for agentflux.
//!
//! Loads the `[streaming]` table from `~/.agentflux/config.toml` with
//! environment variable overrides, validates it, and turns it into the
//! [`ParserConfig`] the streaming engine is constructed with. The engine
//! itself never reads the environment or the disk.

use agentflux_core::{LlmProvider, ToolCallFormat};
use agentflux_streaming::ParserConfig;
use agentflux_streaming::config::{DEFAULT_COMPACT_THRESHOLD, DEFAULT_MAX_OPENER_LEN};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Overrides `streaming.tool_call_format`.
pub const ENV_STREAM_PARSER: &str = "AGENTFLUX_STREAM_PARSER";
/// Overrides `streaming.provider`.
pub const ENV_PROVIDER: &str = "AGENTFLUX_PROVIDER";

/// The root configuration structure.
///
/// Maps directly to `~/.agentflux/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Streaming parser configuration
    #[serde(default)]
    pub streaming: StreamingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingConfig {
    /// Provider the responses come from; picks the default format
    #[serde(default = "default_provider")]
    pub provider: String,

    /// `auto`, `xml`, `json`, `sentinel` or `api_tool_call`
    #[serde(default = "default_format")]
    pub tool_call_format: String,

    /// Recognise generic tool calls in the text stream
    #[serde(default = "default_true")]
    pub parse_tool_calls: bool,

    /// JSON signature prefixes; empty keeps the built-in list
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub json_tool_patterns: Vec<String>,

    /// Prepended to every segment id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment_id_prefix: Option<String>,

    /// Consumed bytes the scanner keeps before compacting
    #[serde(default = "default_compact_threshold")]
    pub compact_threshold: usize,

    /// Longest opener buffered before it is treated as text
    #[serde(default = "default_max_opener_len")]
    pub max_opener_len: usize,
}

fn default_provider() -> String {
    "anthropic".into()
}
fn default_format() -> String {
    "auto".into()
}
fn default_true() -> bool {
    true
}
fn default_compact_threshold() -> usize {
    DEFAULT_COMPACT_THRESHOLD
}
fn default_max_opener_len() -> usize {
    DEFAULT_MAX_OPENER_LEN
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            tool_call_format: default_format(),
            parse_tool_calls: true,
            json_tool_patterns: Vec::new(),
            segment_id_prefix: None,
            compact_threshold: default_compact_threshold(),
            max_opener_len: default_max_opener_len(),
        }
    }
}

impl StreamingConfig {
    /// The explicit format, or `None` for `auto`.
    pub fn format_override(&self) -> Result<Option<ToolCallFormat>, ConfigError> {
        let format = self.tool_call_format.trim();
        if format.is_empty() || format.eq_ignore_ascii_case("auto") {
            return Ok(None);
        }
        format
            .parse::<ToolCallFormat>()
            .map(Some)
            .map_err(ConfigError::ValidationError)
    }

    pub fn provider_kind(&self) -> LlmProvider {
        self.provider.parse().unwrap_or(LlmProvider::Other)
    }

    /// Parser settings derived from this config. The strategy order is left
    /// to the handler factory.
    pub fn parser_config(&self) -> ParserConfig {
        let mut config = ParserConfig::default()
            .with_parse_tool_calls(self.parse_tool_calls)
            .with_json_tool_patterns(self.json_tool_patterns.iter().cloned())
            .with_compact_threshold(self.compact_threshold)
            .with_max_opener_len(self.max_opener_len);
        if let Some(prefix) = &self.segment_id_prefix {
            config = config.with_segment_id_prefix(prefix.clone());
        }
        config
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.format_override()?;

        if self.max_opener_len == 0 {
            return Err(ConfigError::ValidationError(
                "streaming.max_opener_len must be > 0".into(),
            ));
        }

        if self.json_tool_patterns.iter().any(|p| p.trim().is_empty()) {
            return Err(ConfigError::ValidationError(
                "streaming.json_tool_patterns must not contain empty patterns".into(),
            ));
        }

        if let Some(bad) = self
            .json_tool_patterns
            .iter()
            .find(|p| !p.trim_start().starts_with(['{', '[']))
        {
            return Err(ConfigError::ValidationError(format!(
                "streaming.json_tool_patterns entry '{bad}' must start with '{{' or '['"
            )));
        }

        Ok(())
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.agentflux/config.toml).
    ///
    /// Environment overrides:
    /// - `AGENTFLUX_STREAM_PARSER` replaces the tool-call format
    /// - `AGENTFLUX_PROVIDER` replaces the provider
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from `lookup` (normally the process environment).
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(format) = lookup(ENV_STREAM_PARSER).filter(|v| !v.trim().is_empty()) {
            tracing::debug!(format = %format, "Tool call format overridden by environment");
            self.streaming.tool_call_format = format;
        }
        if let Some(provider) = lookup(ENV_PROVIDER).filter(|v| !v.trim().is_empty()) {
            self.streaming.provider = provider;
        }
        self.validate()
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".agentflux")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.streaming.validate()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        Self::default().to_toml()
    }

    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for agentflux_core::Error {
    fn from(e: ConfigError) -> Self {
        agentflux_core::Error::Config {
            message: e.to_string(),
        }
    }
}
