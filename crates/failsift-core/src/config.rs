//! Configuration management for failsift

use serde::{Deserialize, Serialize};

/// Main configuration struct
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Redis configuration
    pub redis: RedisConfig,

    /// Tracker configuration
    pub tracker: TrackerConfig,
}

impl Config {
    /// Parse configuration from a JSON document; missing sections fall back
    /// to their defaults
    pub fn from_json(json: &str) -> crate::error::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Redis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    /// Redis URL
    pub url: String,
    /// Maximum connections
    pub max_connections: u32,
    /// Namespace prepended to every history key
    pub key_prefix: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            max_connections: 10,
            key_prefix: "failsift".to_string(),
        }
    }
}

/// Tracker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Maximum number of outcomes retained per identifier
    pub list_length: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self { list_length: 100 }
    }
}
