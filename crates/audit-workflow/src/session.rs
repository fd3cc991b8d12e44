//! The audit session record
//!
//! One `AuditSession` holds everything the workflow knows about a single
//! audit. It is only mutated by [`crate::WorkflowController`]; callers see
//! cloned snapshots.

use crate::error::WorkflowError;
use crate::state_machine;
use audit_gateway::{
    ChecklistItem, ControlStatus, EvidenceSummary, EvidenceValidation, FileValidation,
    ScriptAnalysis, UploadFile, ValidationStatus, WorkpaperResult,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Workflow steps, in order
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStep {
    /// Waiting for a test script
    #[default]
    UploadScript,
    /// Checklist derived, user reviewing it
    ReviewChecklist,
    /// Collecting and validating evidence
    UploadEvidence,
    /// Workpaper generation in flight
    Generating,
    /// Workpaper available
    Results,
}

impl WorkflowStep {
    /// All steps in lifecycle order
    pub const ALL: [WorkflowStep; 5] = [
        WorkflowStep::UploadScript,
        WorkflowStep::ReviewChecklist,
        WorkflowStep::UploadEvidence,
        WorkflowStep::Generating,
        WorkflowStep::Results,
    ];

    /// Position in the lifecycle (0-based)
    #[inline]
    #[must_use]
    pub fn ordinal(self) -> u8 {
        match self {
            WorkflowStep::UploadScript => 0,
            WorkflowStep::ReviewChecklist => 1,
            WorkflowStep::UploadEvidence => 2,
            WorkflowStep::Generating => 3,
            WorkflowStep::Results => 4,
        }
    }

    /// Wire/display name
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowStep::UploadScript => "upload_script",
            WorkflowStep::ReviewChecklist => "review_checklist",
            WorkflowStep::UploadEvidence => "upload_evidence",
            WorkflowStep::Generating => "generating",
            WorkflowStep::Results => "results",
        }
    }

    /// Terminal step
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        self == WorkflowStep::Results
    }
}

impl fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full state of one audit session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditSession {
    pub session_id: Option<String>,
    pub current_step: WorkflowStep,
    pub test_script_file: Option<UploadFile>,
    pub controls_found: u32,
    pub evidence_checklist: Vec<ChecklistItem>,
    pub warnings: Vec<String>,
    pub evidence_files: Vec<UploadFile>,
    pub files_processed: Vec<FileValidation>,
    pub evidence_summary: Option<EvidenceSummary>,
    pub pending_controls: Vec<ChecklistItem>,
    pub ready_to_generate: bool,
    pub is_processing: bool,
    pub workpaper_filename: Option<String>,
    pub download_url: Option<String>,
    pub workpaper_summary: Option<Value>,
    pub result_message: Option<String>,
    pub error: Option<String>,
    pub last_activity: Option<DateTime<Utc>>,
}

impl AuditSession {
    /// Fresh session at `upload_script`
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `pending_controls` empty and a summary has been received
    #[inline]
    #[must_use]
    pub fn compute_ready(&self) -> bool {
        self.pending_controls.is_empty() && self.evidence_summary.is_some()
    }

    /// Controls received so far, counted from the checklist
    #[must_use]
    pub fn received_count(&self) -> usize {
        self.evidence_checklist
            .iter()
            .filter(|c| c.status == ControlStatus::Received)
            .count()
    }

    /// Move to `to`, validating against the step table
    pub(crate) fn advance(&mut self, to: WorkflowStep) -> Result<(), WorkflowError> {
        state_machine::validate_transition(self.current_step, to)?;
        tracing::info!(from = %self.current_step, to = %to, "workflow transition");
        self.current_step = to;
        self.touch();
        Ok(())
    }

    pub(crate) fn touch(&mut self) {
        self.last_activity = Some(Utc::now());
    }

    pub(crate) fn apply_script_analysis(&mut self, file: UploadFile, analysis: ScriptAnalysis) {
        self.session_id = Some(analysis.session_id);
        self.test_script_file = Some(file);
        self.controls_found = analysis.controls_found;
        self.evidence_checklist = analysis.evidence_checklist;
        self.warnings = analysis.warnings;
        self.error = None;
    }

    /// Merge a validation reply. The caller has already checked that a
    /// present summary reconciles; a missing one leaves the session not ready.
    pub(crate) fn apply_evidence_validation(&mut self, validation: EvidenceValidation) {
        self.files_processed = validation.files_processed;
        self.evidence_summary = validation.evidence_summary;
        self.pending_controls = validation.pending_controls;
        self.ready_to_generate = self.compute_ready();
        self.refresh_checklist_statuses();
        self.error = None;
        self.touch();
    }

    pub(crate) fn apply_workpaper(&mut self, result: WorkpaperResult) {
        self.workpaper_filename = Some(result.workpaper_filename);
        self.download_url = result.download_url;
        self.workpaper_summary = result.workpaper_summary;
        self.result_message = result.result_message;
        self.error = None;
    }

    /// Fold per-file verdicts back into the checklist.
    ///
    /// A rejected file never downgrades a control another file satisfied.
    /// The backend's pending list has the last word: every control it names
    /// is set back to pending, including one marked received above.
    fn refresh_checklist_statuses(&mut self) {
        for file in &self.files_processed {
            let Some(controls) = &file.satisfies_controls else {
                continue;
            };
            let status = match file.validation_status {
                ValidationStatus::Accepted => ControlStatus::Received,
                ValidationStatus::Rejected => ControlStatus::Rejected,
                ValidationStatus::Other => continue,
            };
            for item in self
                .evidence_checklist
                .iter_mut()
                .filter(|item| controls.contains(&item.control_id))
            {
                if item.status != ControlStatus::Received {
                    item.status = status;
                }
            }
        }

        // Overrides the verdicts above.
        for item in &mut self.evidence_checklist {
            if self
                .pending_controls
                .iter()
                .any(|p| p.control_id == item.control_id)
            {
                item.status = ControlStatus::Pending;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, status: ValidationStatus, controls: &[&str]) -> FileValidation {
        FileValidation {
            filename: name.to_string(),
            validation_status: status,
            content_type_detected: None,
            satisfies_controls: Some(controls.iter().map(|c| (*c).to_string()).collect()),
            reason: None,
        }
    }

    #[test]
    fn new_session_is_initial() {
        let session = AuditSession::new();
        assert_eq!(session.current_step, WorkflowStep::UploadScript);
        assert!(session.session_id.is_none());
        assert!(!session.ready_to_generate);
        assert!(!session.is_processing);
    }

    #[test]
    fn step_order_matches_ordinal() {
        for pair in WorkflowStep::ALL.windows(2) {
            assert!(pair[0] < pair[1]);
            assert_eq!(pair[0].ordinal() + 1, pair[1].ordinal());
        }
        assert!(WorkflowStep::Results.is_terminal());
        assert_eq!(WorkflowStep::ReviewChecklist.to_string(), "review_checklist");
    }

    #[test]
    fn ready_requires_summary_and_no_pending() {
        let mut session = AuditSession::new();
        assert!(!session.compute_ready());

        session.evidence_summary = Some(EvidenceSummary::new(1, 1, 0, 0));
        assert!(session.compute_ready());

        session.pending_controls.push(ChecklistItem::from_id("c1"));
        assert!(!session.compute_ready());
    }

    #[test]
    fn advance_rejects_skips() {
        let mut session = AuditSession::new();
        let err = session.advance(WorkflowStep::UploadEvidence).unwrap_err();
        assert!(matches!(err, WorkflowError::IllegalTransition { .. }));
        assert_eq!(session.current_step, WorkflowStep::UploadScript);

        session.advance(WorkflowStep::ReviewChecklist).unwrap();
        assert!(session.last_activity.is_some());
    }

    #[test]
    fn checklist_statuses_follow_file_verdicts() {
        let mut session = AuditSession::new();
        session.evidence_checklist = vec![
            ChecklistItem::from_id("c1"),
            ChecklistItem::from_id("c2"),
            ChecklistItem::from_id("c3"),
        ];

        session.apply_evidence_validation(EvidenceValidation {
            files_processed: vec![
                file("a.pdf", ValidationStatus::Accepted, &["c1"]),
                file("b.png", ValidationStatus::Rejected, &["c1", "c2"]),
            ],
            evidence_summary: Some(EvidenceSummary::new(3, 1, 1, 1)),
            pending_controls: vec![ChecklistItem::from_id("c3")],
        });

        let statuses: Vec<_> = session.evidence_checklist.iter().map(|c| c.status).collect();
        assert_eq!(
            statuses,
            vec![ControlStatus::Received, ControlStatus::Rejected, ControlStatus::Pending]
        );
        assert_eq!(session.received_count(), 1);
        assert!(!session.ready_to_generate);
    }

    #[test]
    fn pending_list_overrides_accepted_file() {
        let mut session = AuditSession::new();
        session.evidence_checklist = vec![ChecklistItem::from_id("c1")];

        session.apply_evidence_validation(EvidenceValidation {
            files_processed: vec![file("a.pdf", ValidationStatus::Accepted, &["c1"])],
            evidence_summary: Some(EvidenceSummary::new(1, 0, 1, 0)),
            pending_controls: vec![ChecklistItem::from_id("c1")],
        });

        assert_eq!(session.evidence_checklist[0].status, ControlStatus::Pending);
        assert_eq!(session.received_count(), 0);
    }
}
