//! Wire types for the backend gateway
//!
//! Responses accept both the backend's snake_case field names and the
//! camelCase names the browser client historically used.

use crate::error::GatewayError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::Path;

/// Which pieces of context are currently loaded in the chat
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextFlags {
    /// Global knowledge base loaded
    pub kb_loaded: bool,
    /// Company policy/context loaded
    pub company_loaded: bool,
    /// Evidence documents loaded
    pub evidence_loaded: bool,
}

impl ContextFlags {
    /// Nothing loaded
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// With knowledge base flag
    #[inline]
    #[must_use]
    pub fn with_kb(mut self, loaded: bool) -> Self {
        self.kb_loaded = loaded;
        self
    }

    /// With company context flag
    #[inline]
    #[must_use]
    pub fn with_company(mut self, loaded: bool) -> Self {
        self.company_loaded = loaded;
        self
    }

    /// With evidence flag
    #[inline]
    #[must_use]
    pub fn with_evidence(mut self, loaded: bool) -> Self {
        self.evidence_loaded = loaded;
        self
    }
}

/// `POST /analyze-query` body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalyzeQueryRequest {
    pub user_input: String,
    #[serde(flatten)]
    pub flags: ContextFlags,
}

/// Verdict from the analysis oracle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryAnalysis {
    pub can_proceed: bool,
    #[serde(default, alias = "clarificationNeeded")]
    pub clarification_needed: Option<bool>,
    #[serde(default, alias = "agentRequest")]
    pub agent_request: Option<Value>,
    #[serde(default)]
    pub reasoning: Option<String>,
}

impl QueryAnalysis {
    /// Oracle allows the query through
    #[must_use]
    pub fn proceed() -> Self {
        Self {
            can_proceed: true,
            clarification_needed: None,
            agent_request: None,
            reasoning: None,
        }
    }

    /// Oracle blocks the query and asks for something
    #[must_use]
    pub fn blocked(agent_request: Value, reasoning: impl Into<String>) -> Self {
        Self {
            can_proceed: false,
            clarification_needed: None,
            agent_request: Some(agent_request),
            reasoning: Some(reasoning.into()),
        }
    }

    /// Clarification wins whenever it is flagged, even alongside `can_proceed`
    #[inline]
    #[must_use]
    pub fn requires_clarification(&self) -> bool {
        !self.can_proceed || self.clarification_needed == Some(true)
    }
}

/// A user-supplied file held in memory for upload
#[derive(Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    /// Create file from name and contents
    #[inline]
    #[must_use]
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            content_type: None,
            bytes: bytes.into(),
        }
    }

    /// With explicit mime type
    #[inline]
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Read a file from disk, using its file name as the upload name
    ///
    /// # Errors
    /// - `GatewayError::Io` if the file cannot be read
    pub async fn read_from(path: impl AsRef<Path>) -> Result<Self, GatewayError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|source| GatewayError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Self::new(filename, bytes))
    }

    /// Size in bytes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the file has no content
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for UploadFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadFile")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Fulfillment status of one control
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlStatus {
    #[default]
    Pending,
    Received,
    Rejected,
    #[serde(other)]
    Other,
}

/// One row of the evidence checklist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    #[serde(alias = "controlId")]
    pub control_id: String,
    #[serde(default, alias = "controlDescription")]
    pub control_description: String,
    #[serde(default, alias = "evidenceRequired")]
    pub evidence_required: String,
    #[serde(default)]
    pub status: ControlStatus,
}

impl ChecklistItem {
    /// Create pending item
    #[must_use]
    pub fn pending(
        control_id: impl Into<String>,
        control_description: impl Into<String>,
        evidence_required: impl Into<String>,
    ) -> Self {
        Self {
            control_id: control_id.into(),
            control_description: control_description.into(),
            evidence_required: evidence_required.into(),
            status: ControlStatus::Pending,
        }
    }

    /// Item known only by its control id
    #[must_use]
    pub fn from_id(control_id: impl Into<String>) -> Self {
        Self::pending(control_id, String::new(), String::new())
    }
}

/// Backend verdict for one evidence file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Accepted,
    Rejected,
    #[serde(other)]
    Other,
}

/// One processed evidence file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileValidation {
    pub filename: String,
    #[serde(alias = "validationStatus")]
    pub validation_status: ValidationStatus,
    #[serde(default, alias = "contentTypeDetected")]
    pub content_type_detected: Option<String>,
    #[serde(default, alias = "satisfiesControls")]
    pub satisfies_controls: Option<Vec<String>>,
    #[serde(default, alias = "rejection_reason")]
    pub reason: Option<String>,
}

/// Evidence reconciliation counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EvidenceSummary {
    #[serde(alias = "totalControls")]
    pub total_controls: u32,
    pub received: u32,
    pub pending: u32,
    pub rejected: u32,
}

impl EvidenceSummary {
    /// Create summary
    #[inline]
    #[must_use]
    pub fn new(total_controls: u32, received: u32, pending: u32, rejected: u32) -> Self {
        Self {
            total_controls,
            received,
            pending,
            rejected,
        }
    }

    /// `received + pending + rejected == total_controls`
    #[inline]
    #[must_use]
    pub fn reconciles(&self) -> bool {
        u64::from(self.received) + u64::from(self.pending) + u64::from(self.rejected)
            == u64::from(self.total_controls)
    }
}

/// Script-analysis response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptAnalysis {
    #[serde(alias = "sessionId")]
    pub session_id: String,
    #[serde(alias = "controlsFound")]
    pub controls_found: u32,
    #[serde(default, alias = "evidenceChecklist")]
    pub evidence_checklist: Vec<ChecklistItem>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// Evidence-validation response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceValidation {
    #[serde(default, alias = "filesProcessed")]
    pub files_processed: Vec<FileValidation>,
    /// Absent until the backend has counted anything
    #[serde(default, alias = "evidenceSummary")]
    pub evidence_summary: Option<EvidenceSummary>,
    #[serde(
        default,
        alias = "pendingControls",
        deserialize_with = "items_or_ids"
    )]
    pub pending_controls: Vec<ChecklistItem>,
}

/// Workpaper-generation response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkpaperResult {
    #[serde(alias = "workpaperFilename")]
    pub workpaper_filename: String,
    #[serde(default, alias = "downloadUrl")]
    pub download_url: Option<String>,
    #[serde(default, alias = "workpaperSummary")]
    pub workpaper_summary: Option<Value>,
    #[serde(default, alias = "message", alias = "resultMessage")]
    pub result_message: Option<String>,
}

/// `GET /health` response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    #[serde(default)]
    pub status: String,
}

impl HealthStatus {
    /// Backend reports itself healthy
    #[inline]
    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self.status.as_str(), "ok" | "healthy")
    }
}

/// Pending controls arrive either as full checklist rows or as bare ids.
fn items_or_ids<'de, D>(deserializer: D) -> Result<Vec<ChecklistItem>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Id(String),
        Item(ChecklistItem),
    }

    let raw = Vec::<Repr>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|r| match r {
            Repr::Id(id) => ChecklistItem::from_id(id),
            Repr::Item(item) => item,
        })
        .collect())
}
