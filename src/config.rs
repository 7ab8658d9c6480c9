//! Configuration for collcache
//!
//! Centralized configuration with sensible defaults.

use crate::collection::{Limits, DEFAULT_MAX_COUNT, MAX_MAX_COUNT};
use crate::error::{CacheError, Result};

/// Main configuration for a collcache server
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// Max concurrent client connections
    pub max_connections: usize,

    /// Idle connection timeout (milliseconds, 0 = never)
    pub idle_timeout_ms: u64,

    /// Connection write timeout (milliseconds)
    pub write_timeout_ms: u64,

    // -------------------------------------------------------------------------
    // Item Configuration
    // -------------------------------------------------------------------------
    /// Max count given to collections created with maxcount 0
    pub default_max_count: u32,

    /// Hard upper bound for a collection's max count
    pub max_max_count: u32,

    /// Largest plain value accepted (bytes)
    pub max_item_size: usize,

    /// Reported by the Version command
    pub version: String,

    // -------------------------------------------------------------------------
    // Authentication
    // -------------------------------------------------------------------------
    /// PLAIN credentials; empty means any credentials are accepted
    pub credentials: Vec<(String, String)>,

    /// Reject data commands until the connection authenticates
    pub require_auth: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:11211".to_string(),
            max_connections: 1024,
            idle_timeout_ms: 0,
            write_timeout_ms: 5000,
            default_max_count: DEFAULT_MAX_COUNT,
            max_max_count: MAX_MAX_COUNT,
            max_item_size: 1024 * 1024, // 1 MB
            version: crate::VERSION.to_string(),
            credentials: Vec::new(),
            require_auth: false,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Collection limits derived from this config
    pub fn limits(&self) -> Limits {
        Limits {
            default_max_count: self.default_max_count,
            max_max_count: self.max_max_count,
        }
    }

    /// Check the config for values the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(CacheError::Config("max_connections must be > 0".into()));
        }
        if self.max_max_count == 0 {
            return Err(CacheError::Config("max_max_count must be > 0".into()));
        }
        if self.default_max_count == 0 || self.default_max_count > self.max_max_count {
            return Err(CacheError::Config(format!(
                "default_max_count must be in 1..={}",
                self.max_max_count
            )));
        }
        if self.require_auth && self.credentials.is_empty() {
            return Err(CacheError::Config(
                "require_auth needs at least one credential".into(),
            ));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the idle timeout (in milliseconds, 0 disables it)
    pub fn idle_timeout_ms(mut self, ms: u64) -> Self {
        self.config.idle_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    pub fn default_max_count(mut self, count: u32) -> Self {
        self.config.default_max_count = count;
        self
    }

    pub fn max_max_count(mut self, count: u32) -> Self {
        self.config.max_max_count = count;
        self
    }

    /// Set the largest plain value (in bytes)
    pub fn max_item_size(mut self, size: usize) -> Self {
        self.config.max_item_size = size;
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.config.version = version.into();
        self
    }

    /// Add a PLAIN credential
    pub fn credential(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.credentials.push((user.into(), password.into()));
        self
    }

    pub fn require_auth(mut self, required: bool) -> Self {
        self.config.require_auth = required;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
