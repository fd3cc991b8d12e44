//! Gateway configuration
//!
//! The backend base URL is the only externally configurable parameter of the
//! core. It is validated once, at construction.

use crate::error::GatewayError;
use std::time::Duration;
use url::Url;

/// Default backend location (FastAPI dev server)
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Default per-request timeout. Workpaper generation runs an LLM pass over
/// every control, so this is generous.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Gateway configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    base_url: Url,
    timeout: Duration,
}

impl GatewayConfig {
    /// Create configuration for a base URL
    ///
    /// # Errors
    /// - `GatewayError::InvalidBaseUrl` if the URL does not parse or is not http(s)
    pub fn new(base_url: &str) -> Result<Self, GatewayError> {
        let invalid = |message: String| GatewayError::InvalidBaseUrl {
            url: base_url.to_string(),
            message,
        };

        let mut url = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
        }
        if url.cannot_be_a_base() {
            return Err(invalid("url cannot be a base".to_string()));
        }

        // Keep any path prefix ("/api") when joining endpoint paths.
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }

        Ok(Self {
            base_url: url,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    /// With request timeout
    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Base URL (always ends with `/`)
    #[inline]
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Request timeout
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Resolve an endpoint path against the base URL
    ///
    /// # Errors
    /// - `GatewayError::InvalidRequest` if the joined URL is invalid
    pub fn endpoint(&self, path: &'static str) -> Result<Url, GatewayError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| GatewayError::invalid_request(path, e.to_string()))
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL).expect("default base url is valid")
    }
}
