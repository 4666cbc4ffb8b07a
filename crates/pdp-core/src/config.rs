//! Engine configuration.

use crate::error::{PolicyError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Largest accepted regex cache capacity.
pub const MAX_REGEX_CACHE_CAPACITY: usize = 1 << 20;

fn default_regex_cache_capacity() -> usize {
    64
}

/// Settings of an [`ExpressionFactory`](crate::factory::ExpressionFactory).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum length of a chain of variable references, checked when a
    /// variable is defined. `None` means unbounded.
    pub max_variable_reference_depth: Option<usize>,

    /// Capacity of the cache of regular expressions compiled at
    /// evaluation time. 0 disables the cache.
    #[serde(default = "default_regex_cache_capacity")]
    pub regex_cache_capacity: usize,

    /// Whether attribute selectors may be built.
    pub enable_xpath: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_variable_reference_depth: None,
            regex_cache_capacity: default_regex_cache_capacity(),
            enable_xpath: false,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_variable_reference_depth(mut self, depth: usize) -> Self {
        self.max_variable_reference_depth = Some(depth);
        self
    }

    pub fn with_regex_cache_capacity(mut self, capacity: usize) -> Self {
        self.regex_cache_capacity = capacity;
        self
    }

    pub fn with_xpath(mut self, enabled: bool) -> Self {
        self.enable_xpath = enabled;
        self
    }

    /// Parses a configuration from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: EngineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        debug!(?config, "loaded engine configuration");
        Ok(config)
    }

    /// Parses a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        debug!(?config, "loaded engine configuration");
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.regex_cache_capacity > MAX_REGEX_CACHE_CAPACITY {
            return Err(PolicyError::Config(format!(
                "regex_cache_capacity {} exceeds the maximum {MAX_REGEX_CACHE_CAPACITY}",
                self.regex_cache_capacity
            )));
        }
        Ok(())
    }
}
