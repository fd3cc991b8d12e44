//! Testing utilities for the audit assistant workspace
//!
//! Shared fakes and fixtures. `ScriptedGateway` answers each endpoint from a
//! queue of canned results and records every call it receives.

#![allow(missing_docs)]

use async_trait::async_trait;
use audit_gateway::{
    endpoints, BackendGateway, ChecklistItem, ContextFlags, EvidenceSummary, EvidenceValidation,
    FileValidation, GatewayError, HealthStatus, QueryAnalysis, ScriptAnalysis, UploadFile,
    ValidationStatus, WorkpaperResult,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Notify;

/// A call observed by the scripted gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    AnalyzeQuery { user_input: String, flags: ContextFlags },
    UploadScript { filename: String },
    UploadEvidence { session_id: String, filenames: Vec<String> },
    GenerateWorkpaper { session_id: String },
    DownloadWorkpaper { filename: String },
    Health,
}

/// Holds the next gateway call in flight until released
#[derive(Debug, Clone, Default)]
pub struct CallGate {
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

impl CallGate {
    /// Wait until the held call has reached the gateway
    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }

    /// Let the held call return its scripted result
    pub fn release(&self) {
        self.release.notify_one();
    }
}

type Queue<T> = Mutex<VecDeque<Result<T, GatewayError>>>;

/// Programmable `BackendGateway` fake
#[derive(Debug, Default)]
pub struct ScriptedGateway {
    analyses: Queue<QueryAnalysis>,
    scripts: Queue<ScriptAnalysis>,
    validations: Queue<EvidenceValidation>,
    workpapers: Queue<WorkpaperResult>,
    downloads: Queue<Vec<u8>>,
    calls: Mutex<Vec<GatewayCall>>,
    gate: Mutex<Option<CallGate>>,
}

impl ScriptedGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_analysis(&self, result: Result<QueryAnalysis, GatewayError>) -> &Self {
        self.analyses.lock().push_back(result);
        self
    }

    pub fn push_script(&self, result: Result<ScriptAnalysis, GatewayError>) -> &Self {
        self.scripts.lock().push_back(result);
        self
    }

    pub fn push_validation(&self, result: Result<EvidenceValidation, GatewayError>) -> &Self {
        self.validations.lock().push_back(result);
        self
    }

    pub fn push_workpaper(&self, result: Result<WorkpaperResult, GatewayError>) -> &Self {
        self.workpapers.lock().push_back(result);
        self
    }

    pub fn push_download(&self, result: Result<Vec<u8>, GatewayError>) -> &Self {
        self.downloads.lock().push_back(result);
        self
    }

    /// Hold the next call (of any kind) until the returned gate is released
    #[must_use]
    pub fn hold_next_call(&self) -> CallGate {
        let gate = CallGate::default();
        *self.gate.lock() = Some(gate.clone());
        gate
    }

    /// Every call received so far, in order
    #[must_use]
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().clone()
    }

    /// Number of calls received so far
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    async fn enter(&self, call: GatewayCall) {
        self.calls.lock().push(call);
        let gate = self.gate.lock().take();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
    }

    fn next<T>(queue: &Queue<T>, endpoint: &'static str) -> Result<T, GatewayError> {
        queue
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(GatewayError::transport(endpoint, "no scripted response")))
    }
}

#[async_trait]
impl BackendGateway for ScriptedGateway {
    async fn analyze_query(
        &self,
        user_input: &str,
        flags: ContextFlags,
    ) -> Result<QueryAnalysis, GatewayError> {
        self.enter(GatewayCall::AnalyzeQuery {
            user_input: user_input.to_string(),
            flags,
        })
        .await;
        Self::next(&self.analyses, endpoints::ANALYZE_QUERY)
    }

    async fn upload_script(&self, file: &UploadFile) -> Result<ScriptAnalysis, GatewayError> {
        self.enter(GatewayCall::UploadScript {
            filename: file.filename.clone(),
        })
        .await;
        Self::next(&self.scripts, endpoints::UPLOAD_SCRIPT)
    }

    async fn upload_evidence(
        &self,
        session_id: &str,
        files: &[UploadFile],
    ) -> Result<EvidenceValidation, GatewayError> {
        self.enter(GatewayCall::UploadEvidence {
            session_id: session_id.to_string(),
            filenames: files.iter().map(|f| f.filename.clone()).collect(),
        })
        .await;
        Self::next(&self.validations, endpoints::UPLOAD_EVIDENCE)
    }

    async fn generate_workpaper(&self, session_id: &str) -> Result<WorkpaperResult, GatewayError> {
        self.enter(GatewayCall::GenerateWorkpaper {
            session_id: session_id.to_string(),
        })
        .await;
        Self::next(&self.workpapers, endpoints::GENERATE_WORKPAPER)
    }

    async fn download_workpaper(&self, filename: &str) -> Result<Vec<u8>, GatewayError> {
        self.enter(GatewayCall::DownloadWorkpaper {
            filename: filename.to_string(),
        })
        .await;
        Self::next(&self.downloads, endpoints::DOWNLOAD_REPORT)
    }

    async fn health(&self) -> Result<HealthStatus, GatewayError> {
        self.enter(GatewayCall::Health).await;
        Ok(HealthStatus {
            status: "ok".to_string(),
        })
    }
}

// Fixtures

pub fn upload_file(filename: &str) -> UploadFile {
    UploadFile::new(filename, format!("contents of {filename}").into_bytes())
}

pub fn checklist(count: usize) -> Vec<ChecklistItem> {
    (1..=count)
        .map(|i| {
            ChecklistItem::pending(
                format!("CTL-{i:03}"),
                format!("Control {i}"),
                format!("Evidence for control {i}"),
            )
        })
        .collect()
}

pub fn script_analysis(session_id: &str, controls: usize) -> ScriptAnalysis {
    ScriptAnalysis {
        session_id: session_id.to_string(),
        controls_found: u32::try_from(controls).unwrap(),
        evidence_checklist: checklist(controls),
        warnings: Vec::new(),
    }
}

pub fn file_validation(filename: &str, accepted: bool, controls: &[&str]) -> FileValidation {
    FileValidation {
        filename: filename.to_string(),
        validation_status: if accepted {
            ValidationStatus::Accepted
        } else {
            ValidationStatus::Rejected
        },
        content_type_detected: Some("document".to_string()),
        satisfies_controls: Some(controls.iter().map(|c| (*c).to_string()).collect()),
        reason: (!accepted).then(|| "Content does not match requirement".to_string()),
    }
}

pub fn evidence_validation(
    summary: EvidenceSummary,
    pending: &[&str],
    files: Vec<FileValidation>,
) -> EvidenceValidation {
    EvidenceValidation {
        files_processed: files,
        evidence_summary: Some(summary),
        pending_controls: pending.iter().map(|id| ChecklistItem::from_id(*id)).collect(),
    }
}

/// Validation where every control is received
pub fn complete_validation(controls: u32, files: Vec<FileValidation>) -> EvidenceValidation {
    evidence_validation(EvidenceSummary::new(controls, controls, 0, 0), &[], files)
}

pub fn workpaper_result(filename: &str) -> WorkpaperResult {
    WorkpaperResult {
        workpaper_filename: filename.to_string(),
        download_url: Some(format!("/download-report?filename={filename}")),
        workpaper_summary: Some(serde_json::json!({"effective": 12, "ineffective": 0})),
        result_message: Some("Workpaper generated".to_string()),
    }
}

pub fn blocked(kind: &str, reasoning: &str) -> QueryAnalysis {
    QueryAnalysis::blocked(serde_json::json!({ "type": kind }), reasoning)
}

pub fn transport_error(endpoint: &'static str) -> GatewayError {
    GatewayError::transport(endpoint, "connection refused")
}
