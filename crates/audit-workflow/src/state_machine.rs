use crate::error::WorkflowError;
use crate::session::WorkflowStep;

/// Validates a step transition.
///
/// `reset` is not a transition; it replaces the whole session.
pub fn validate_transition(from: WorkflowStep, to: WorkflowStep) -> Result<(), WorkflowError> {
    if allowed(from, to) {
        Ok(())
    } else {
        Err(WorkflowError::IllegalTransition { from, to })
    }
}

pub fn allowed_transitions(from: WorkflowStep) -> &'static [WorkflowStep] {
    use WorkflowStep::*;
    match from {
        UploadScript => &[ReviewChecklist],
        ReviewChecklist => &[UploadEvidence],
        UploadEvidence => &[Generating],
        // Back to UploadEvidence only when generation fails.
        Generating => &[Results, UploadEvidence],
        Results => &[],
    }
}

fn allowed(from: WorkflowStep, to: WorkflowStep) -> bool {
    allowed_transitions(from).contains(&to)
}
