use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::render::RenderLimits;

/// Error type for configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Render degradation thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_heavy_viewer_chars")]
    pub heavy_viewer_chars: usize,
    #[serde(default = "default_max_sse_events")]
    pub max_sse_events: usize,
    #[serde(default = "default_max_ndjson_lines")]
    pub max_ndjson_lines: usize,
    #[serde(default = "default_language_vote_prefix")]
    pub language_vote_prefix: usize,
}

fn default_heavy_viewer_chars() -> usize {
    50_000
}
fn default_max_sse_events() -> usize {
    80
}
fn default_max_ndjson_lines() -> usize {
    200
}
fn default_language_vote_prefix() -> usize {
    200
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            heavy_viewer_chars: default_heavy_viewer_chars(),
            max_sse_events: default_max_sse_events(),
            max_ndjson_lines: default_max_ndjson_lines(),
            language_vote_prefix: default_language_vote_prefix(),
        }
    }
}

impl From<&LimitsConfig> for RenderLimits {
    fn from(config: &LimitsConfig) -> Self {
        Self {
            heavy_viewer_chars: config.heavy_viewer_chars,
            max_sse_events: config.max_sse_events,
            max_ndjson_lines: config.max_ndjson_lines,
            language_vote_prefix: config.language_vote_prefix,
        }
    }
}

/// Collector settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Exchanges retained before the oldest are evicted.
    #[serde(default = "default_retention")]
    pub retention: usize,
}

fn default_retention() -> usize {
    1024
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            retention: default_retention(),
        }
    }
}

/// Top-level configuration for the inspection tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LensConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub collector: CollectorConfig,
    /// Optional path to a provider-rules JSON file overriding the built-ins.
    #[serde(default)]
    pub rules_path: Option<String>,
}

fn default_log_level() -> String {
    "INFO".to_string()
}

impl Default for LensConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            limits: LimitsConfig::default(),
            collector: CollectorConfig::default(),
            rules_path: None,
        }
    }
}

/// Load configuration from a YAML file.
///
/// A missing file yields the defaults — the inspector must run with zero
/// setup. Present-but-broken files are an error: silently ignoring a config
/// the user wrote is worse than refusing to start.
pub fn load_config(path: &str) -> Result<LensConfig, ConfigError> {
    if !Path::new(path).exists() {
        return Ok(LensConfig::default());
    }
    let contents = std::fs::read_to_string(path)?;
    let config: LensConfig = serde_yaml::from_str(&contents)?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &LensConfig) -> Result<(), ConfigError> {
    if config.limits.heavy_viewer_chars == 0 {
        return Err(ConfigError::Validation(
            "limits.heavy_viewer_chars must be greater than zero".to_string(),
        ));
    }
    if config.limits.max_sse_events == 0 || config.limits.max_ndjson_lines == 0 {
        return Err(ConfigError::Validation(
            "event-count limits must be greater than zero".to_string(),
        ));
    }
    if config.collector.retention == 0 {
        return Err(ConfigError::Validation(
            "collector.retention must be greater than zero".to_string(),
        ));
    }
    Ok(())
}
