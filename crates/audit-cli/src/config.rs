//! Assistant configuration
//!
//! Loaded from an optional TOML file; every field has a default so an empty
//! or missing file yields a working local setup.
//!
//! ```toml
//! [gateway]
//! base_url = "http://localhost:8000"
//! timeout_secs = 300
//!
//! [storage]
//! state_file = ".audit-assistant/state.json"
//!
//! [logging]
//! filter = "info"
//! json = false
//! ```

use audit_gateway::{GatewayConfig, GatewayError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default location of the durable key-value file
pub const DEFAULT_STATE_FILE: &str = ".audit-assistant/state.json";

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("timeout_secs must be greater than zero")]
    ZeroTimeout,

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatewaySection {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            base_url: audit_gateway::config::DEFAULT_BASE_URL.to_string(),
            timeout_secs: audit_gateway::config::DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageSection {
    pub state_file: PathBuf,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            state_file: PathBuf::from(DEFAULT_STATE_FILE),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSection {
    /// `EnvFilter` directive; `RUST_LOG` takes precedence
    pub filter: String,
    pub json: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AssistantConfig {
    pub gateway: GatewaySection,
    pub storage: StorageSection,
    pub logging: LoggingSection,
}

impl AssistantConfig {
    /// Load from `path`, or defaults when no path is given
    ///
    /// # Errors
    /// - `ConfigError::Read` if the file cannot be read
    /// - `ConfigError::Parse` on invalid TOML or unknown keys
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&text, path)?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Parse TOML text; `origin` is only used in error messages
    ///
    /// # Errors
    /// - `ConfigError::Parse` on invalid TOML or unknown keys
    pub fn parse(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Apply command-line overrides
    #[must_use]
    pub fn with_overrides(mut self, base_url: Option<String>, state_file: Option<PathBuf>) -> Self {
        if let Some(base_url) = base_url {
            self.gateway.base_url = base_url;
        }
        if let Some(state_file) = state_file {
            self.storage.state_file = state_file;
        }
        self
    }

    /// Validated gateway configuration
    ///
    /// # Errors
    /// - `ConfigError::ZeroTimeout` if `timeout_secs` is 0
    /// - `ConfigError::Gateway` if the base URL is invalid
    pub fn gateway_config(&self) -> Result<GatewayConfig, ConfigError> {
        if self.gateway.timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(GatewayConfig::new(&self.gateway.base_url)?
            .with_timeout(Duration::from_secs(self.gateway.timeout_secs)))
    }
}
