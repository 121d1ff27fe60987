//! Configuration parsing and management.

use crate::channel::DEFAULT_SEPARATOR;
use crate::scope::{check_prefix, ScopeGenerator, DEFAULT_SCOPE_PREFIX};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Isolation settings, usually loaded from `sluice.yml`
///
/// ```yaml
/// scope_prefix: app
/// channels:
///   DOM:
///     separator: "."
///   HTTP:
///     separator: "/"
///     enabled: false
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationConfig {
    #[serde(default = "default_scope_prefix")]
    pub scope_prefix: String,

    #[serde(default)]
    pub channels: BTreeMap<String, ChannelConfig>,
}

fn default_scope_prefix() -> String {
    String::from(DEFAULT_SCOPE_PREFIX)
}

/// Settings for one channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Splits scope tokens into path segments on this channel
    #[serde(default = "default_separator")]
    pub separator: char,

    /// Disabled channels are not registered and pass through unisolated
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_separator() -> char {
    DEFAULT_SEPARATOR
}

fn default_true() -> bool {
    true
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            separator: default_separator(),
            enabled: true,
        }
    }
}

impl Default for IsolationConfig {
    fn default() -> Self {
        Self {
            scope_prefix: default_scope_prefix(),
            channels: BTreeMap::new(),
        }
    }
}

impl IsolationConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        tracing::debug!("Loading isolation config from {:?}", path);
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Parse configuration from YAML text
    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: IsolationConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that generated tokens stay single path segments
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_prefix(
            &self.scope_prefix,
            self.channels.values().map(|channel| channel.separator),
        )
    }

    pub fn channel(&self, name: &str) -> ChannelConfig {
        self.channels.get(name).cloned().unwrap_or_default()
    }

    pub fn separator_for(&self, name: &str) -> char {
        self.channel(name).separator
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.channel(name).enabled
    }

    /// A generator using the configured prefix
    pub fn scope_generator(&self) -> Result<ScopeGenerator, ConfigError> {
        self.validate()?;
        ScopeGenerator::with_prefix(self.scope_prefix.clone())
    }
}
