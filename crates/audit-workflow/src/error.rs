//! Error types for the audit workflow
//!
//! Two families:
//! - Precondition violations, rejected synchronously with no state change
//! - Backend failures, recorded in the session's `error` field first

use crate::session::WorkflowStep;
use audit_gateway::GatewayError;

/// Workflow error type
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// Operation called from the wrong step
    #[error("operation requires step {expected}, session is at {actual}")]
    WrongStep {
        expected: WorkflowStep,
        actual: WorkflowStep,
    },

    /// Another backend call for this session is outstanding
    #[error("a backend call is already in progress for this session")]
    Busy,

    /// Generation requested before every control has evidence
    #[error("evidence not ready for generation ({pending} control(s) pending)")]
    NotReady { pending: usize },

    /// Transition not in the step table
    #[error("illegal transition {from} -> {to}")]
    IllegalTransition {
        from: WorkflowStep,
        to: WorkflowStep,
    },

    /// Backend never assigned a session id
    #[error("session has no backend session id")]
    MissingSessionId,

    /// No workpaper has been generated yet
    #[error("no workpaper has been generated")]
    MissingWorkpaper,

    /// Session was reset while the call was in flight; the reply was dropped
    #[error("session was reset while the call was in flight")]
    Superseded,

    /// Backend call failed
    #[error("backend call failed: {0}")]
    Gateway(#[from] GatewayError),
}

impl WorkflowError {
    /// Rejected before any state change or backend call
    #[inline]
    #[must_use]
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::WrongStep { .. }
                | Self::Busy
                | Self::NotReady { .. }
                | Self::IllegalTransition { .. }
                | Self::MissingSessionId
                | Self::MissingWorkpaper
        )
    }

    /// Check if error is retryable
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Busy => true,
            Self::Gateway(e) => e.is_retryable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workflow_error_display() {
        let err = WorkflowError::WrongStep {
            expected: WorkflowStep::UploadEvidence,
            actual: WorkflowStep::UploadScript,
        };
        assert_eq!(
            err.to_string(),
            "operation requires step upload_evidence, session is at upload_script"
        );
    }

    #[test]
    fn workflow_error_classification() {
        assert!(WorkflowError::Busy.is_precondition());
        assert!(WorkflowError::NotReady { pending: 2 }.is_precondition());
        assert!(!WorkflowError::Superseded.is_precondition());

        let gateway = WorkflowError::from(GatewayError::transport("/x", "refused"));
        assert!(!gateway.is_precondition());
        assert!(gateway.is_retryable());
        assert!(!WorkflowError::MissingSessionId.is_retryable());
    }
}
