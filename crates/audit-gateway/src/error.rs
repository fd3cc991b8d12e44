//! Error types for the backend gateway
//!
//! Every variant is a recoverable, typed failure. Controllers catch these at
//! their boundary and never let them reach rendering code.

use std::path::PathBuf;

/// Gateway error type
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Network failure, timeout, or connection refused
    #[error("transport error calling {endpoint}: {message}")]
    Transport {
        endpoint: &'static str,
        message: String,
    },

    /// Backend answered with a non-success status
    #[error("{endpoint} returned status {status}: {body}")]
    Status {
        endpoint: &'static str,
        status: u16,
        body: String,
    },

    /// Backend answered with a body we could not interpret
    #[error("malformed response from {endpoint}: {message}")]
    Malformed {
        endpoint: &'static str,
        message: String,
    },

    /// Request could not be built (bad mime type, bad query)
    #[error("invalid request for {endpoint}: {message}")]
    InvalidRequest {
        endpoint: &'static str,
        message: String,
    },

    /// Base URL rejected at configuration time
    #[error("invalid base url '{url}': {message}")]
    InvalidBaseUrl { url: String, message: String },

    /// Local file could not be read for upload
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl GatewayError {
    /// Create transport error
    #[inline]
    pub fn transport(endpoint: &'static str, message: impl Into<String>) -> Self {
        Self::Transport {
            endpoint,
            message: message.into(),
        }
    }

    /// Create status error
    #[inline]
    pub fn status(endpoint: &'static str, status: u16, body: impl Into<String>) -> Self {
        Self::Status {
            endpoint,
            status,
            body: body.into(),
        }
    }

    /// Create malformed-response error
    #[inline]
    pub fn malformed(endpoint: &'static str, message: impl Into<String>) -> Self {
        Self::Malformed {
            endpoint,
            message: message.into(),
        }
    }

    /// Create invalid-request error
    #[inline]
    pub fn invalid_request(endpoint: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            endpoint,
            message: message.into(),
        }
    }

    /// Check if a plain retry may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Endpoint the failure came from, if any
    #[must_use]
    pub fn endpoint(&self) -> Option<&'static str> {
        match self {
            Self::Transport { endpoint, .. }
            | Self::Status { endpoint, .. }
            | Self::Malformed { endpoint, .. }
            | Self::InvalidRequest { endpoint, .. } => Some(endpoint),
            Self::InvalidBaseUrl { .. } | Self::Io { .. } => None,
        }
    }
}
