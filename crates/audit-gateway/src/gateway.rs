//! The gateway seam consumed by both controllers

use crate::error::GatewayError;
use crate::types::{
    ContextFlags, EvidenceValidation, HealthStatus, QueryAnalysis, ScriptAnalysis, UploadFile,
    WorkpaperResult,
};
use async_trait::async_trait;

/// Backend endpoint paths, relative to the configured base URL
pub mod endpoints {
    pub const ANALYZE_QUERY: &str = "/analyze-query";
    pub const UPLOAD_SCRIPT: &str = "/audit/upload-script";
    pub const UPLOAD_EVIDENCE: &str = "/audit/upload-evidence";
    pub const GENERATE_WORKPAPER: &str = "/audit/generate-workpaper";
    pub const DOWNLOAD_REPORT: &str = "/download-report";
    pub const HEALTH: &str = "/health";
}

/// Stateless request/response operations against the analysis backend
///
/// Implementations must not retain per-session state; the controllers own it.
#[async_trait]
pub trait BackendGateway: Send + Sync {
    /// Ask the oracle whether `user_input` can be answered with the given context
    async fn analyze_query(
        &self,
        user_input: &str,
        flags: ContextFlags,
    ) -> Result<QueryAnalysis, GatewayError>;

    /// Parse a test script into controls and an evidence checklist
    async fn upload_script(&self, file: &UploadFile) -> Result<ScriptAnalysis, GatewayError>;

    /// Validate the full accumulated evidence set for a session
    async fn upload_evidence(
        &self,
        session_id: &str,
        files: &[UploadFile],
    ) -> Result<EvidenceValidation, GatewayError>;

    /// Generate the workpaper for a session
    async fn generate_workpaper(&self, session_id: &str) -> Result<WorkpaperResult, GatewayError>;

    /// Fetch generated workpaper bytes by filename
    async fn download_workpaper(&self, filename: &str) -> Result<Vec<u8>, GatewayError>;

    /// Backend liveness
    async fn health(&self) -> Result<HealthStatus, GatewayError>;
}
