//! Audit Gateway - backend request/response layer
//!
//! Stateless calls for the remote operations the audit assistant depends on:
//! - Query analysis (can the agent answer with the loaded context?)
//! - Test script analysis (controls and evidence checklist)
//! - Evidence validation (per-file verdicts and reconciliation summary)
//! - Workpaper generation and download
//!
//! The controllers depend on the [`BackendGateway`] trait only, so tests can
//! swap in a scripted fake while production uses [`HttpGateway`].
//!
//! # Example
//!
//! ```rust,ignore
//! use audit_gateway::{BackendGateway, ContextFlags, GatewayConfig, HttpGateway};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GatewayConfig::new("http://localhost:8000")?;
//! let gateway = HttpGateway::new(config)?;
//!
//! let analysis = gateway
//!     .analyze_query("What is our password policy?", ContextFlags::none())
//!     .await?;
//! println!("can proceed: {}", analysis.can_proceed);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod error;
pub mod gateway;
pub mod http;
pub mod types;

pub use config::GatewayConfig;
pub use error::GatewayError;
pub use gateway::{endpoints, BackendGateway};
pub use http::HttpGateway;
pub use types::{
    AnalyzeQueryRequest, ChecklistItem, ContextFlags, ControlStatus, EvidenceSummary,
    EvidenceValidation, FileValidation, HealthStatus, QueryAnalysis, ScriptAnalysis, UploadFile,
    ValidationStatus, WorkpaperResult,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
