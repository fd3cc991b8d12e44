use audit_workflow::{allowed_transitions, validate_transition, WorkflowError, WorkflowStep};
use proptest::prelude::*;

#[test]
fn test_forward_transitions() {
    assert!(validate_transition(WorkflowStep::UploadScript, WorkflowStep::ReviewChecklist).is_ok());
    assert!(validate_transition(WorkflowStep::ReviewChecklist, WorkflowStep::UploadEvidence).is_ok());
    assert!(validate_transition(WorkflowStep::UploadEvidence, WorkflowStep::Generating).is_ok());
    assert!(validate_transition(WorkflowStep::Generating, WorkflowStep::Results).is_ok());
}

#[test]
fn test_no_skips() {
    assert!(validate_transition(WorkflowStep::UploadScript, WorkflowStep::UploadEvidence).is_err());
    assert!(validate_transition(WorkflowStep::ReviewChecklist, WorkflowStep::Generating).is_err());
    assert!(validate_transition(WorkflowStep::UploadEvidence, WorkflowStep::Results).is_err());
}

#[test]
fn test_generating_reverts_only_to_upload_evidence() {
    assert!(validate_transition(WorkflowStep::Generating, WorkflowStep::UploadEvidence).is_ok());
    assert!(validate_transition(WorkflowStep::Generating, WorkflowStep::ReviewChecklist).is_err());
    assert!(validate_transition(WorkflowStep::Generating, WorkflowStep::UploadScript).is_err());
}

#[test]
fn test_results_is_terminal() {
    assert!(allowed_transitions(WorkflowStep::Results).is_empty());
    let err = validate_transition(WorkflowStep::Results, WorkflowStep::UploadScript).unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::IllegalTransition {
            from: WorkflowStep::Results,
            to: WorkflowStep::UploadScript
        }
    ));
}

fn any_step() -> impl Strategy<Value = WorkflowStep> {
    prop_oneof![
        Just(WorkflowStep::UploadScript),
        Just(WorkflowStep::ReviewChecklist),
        Just(WorkflowStep::UploadEvidence),
        Just(WorkflowStep::Generating),
        Just(WorkflowStep::Results),
    ]
}

proptest! {
    #[test]
    fn prop_all_transitions_are_subset_of_allowed(from in any_step(), to in any_step()) {
        let res = validate_transition(from, to);
        let allowed = allowed_transitions(from);

        if res.is_ok() {
            prop_assert!(allowed.contains(&to));
        } else {
            prop_assert!(!allowed.contains(&to));
        }
    }

    #[test]
    fn prop_only_backward_edge_is_generation_revert(from in any_step(), to in any_step()) {
        if validate_transition(from, to).is_ok() && to.ordinal() <= from.ordinal() {
            prop_assert_eq!(from, WorkflowStep::Generating);
            prop_assert_eq!(to, WorkflowStep::UploadEvidence);
        }
    }

    #[test]
    fn prop_forward_edges_advance_by_one(from in any_step(), to in any_step()) {
        if validate_transition(from, to).is_ok() && to.ordinal() > from.ordinal() {
            prop_assert_eq!(to.ordinal(), from.ordinal() + 1);
        }
    }
}
