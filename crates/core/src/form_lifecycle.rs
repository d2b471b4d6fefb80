//! Status machine for standalone form submissions.
//!
//! ```text
//! ongoing -> submitted -> reviewing -> completed
//!    ^                        |
//!    +------- rejected <------+
//! ```
//!
//! Archiving is an orthogonal flag; archived submissions reject every
//! status change.

use crate::access::Operation;
use crate::error::CoreError;
use crate::lifecycle::StatusChange;
use crate::status::FormSubmissionStatus;

pub const MSG_FORM_INACTIVE: &str = "Formular ist nicht aktiv";
pub const MSG_SUBMISSION_ARCHIVED: &str = "Formular Einreichung ist archiviert";
pub const MSG_SUBMISSION_NOT_ARCHIVED: &str = "Formular Einreichung ist nicht archiviert";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionAction {
    Save,
    Submit,
    StartReview,
    Reject,
    Approve,
}

impl SubmissionAction {
    pub fn target(self) -> FormSubmissionStatus {
        match self {
            SubmissionAction::Save => FormSubmissionStatus::Ongoing,
            SubmissionAction::Submit => FormSubmissionStatus::Submitted,
            SubmissionAction::StartReview => FormSubmissionStatus::Reviewing,
            SubmissionAction::Reject => FormSubmissionStatus::Rejected,
            SubmissionAction::Approve => FormSubmissionStatus::Completed,
        }
    }

    fn allowed_from(self) -> &'static [FormSubmissionStatus] {
        use FormSubmissionStatus::*;
        match self {
            SubmissionAction::Save => &[Ongoing, Rejected],
            SubmissionAction::Submit => &[Ongoing],
            SubmissionAction::StartReview => &[Submitted],
            SubmissionAction::Reject | SubmissionAction::Approve => &[Reviewing],
        }
    }

    /// The access-gate operation guarding this action.
    pub fn operation(self) -> Operation {
        match self {
            SubmissionAction::Save | SubmissionAction::Submit => Operation::SubmitForm,
            SubmissionAction::StartReview | SubmissionAction::Reject | SubmissionAction::Approve => {
                Operation::ReviewForm
            }
        }
    }

    /// Whether the form itself must still be active.
    fn requires_active_form(self) -> bool {
        matches!(self, SubmissionAction::Save | SubmissionAction::Submit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmissionState {
    pub status: FormSubmissionStatus,
    pub is_archived: bool,
}

/// Status of a freshly started submission.
pub fn plan_start(form_is_active: bool) -> Result<FormSubmissionStatus, CoreError> {
    if !form_is_active {
        return Err(CoreError::precondition(MSG_FORM_INACTIVE));
    }
    Ok(FormSubmissionStatus::Ongoing)
}

/// Validate a status change and return it.
pub fn plan_transition(
    state: SubmissionState,
    action: SubmissionAction,
    form_is_active: bool,
) -> Result<StatusChange<FormSubmissionStatus>, CoreError> {
    if state.is_archived {
        return Err(CoreError::precondition(MSG_SUBMISSION_ARCHIVED));
    }
    if action.requires_active_form() && !form_is_active {
        return Err(CoreError::precondition(MSG_FORM_INACTIVE));
    }
    let to = action.target();
    if !action.allowed_from().contains(&state.status) {
        return Err(CoreError::precondition(format!(
            "Statuswechsel von '{}' nach '{}' ist nicht erlaubt",
            state.status, to
        )));
    }
    Ok(StatusChange {
        from: state.status,
        to,
    })
}

/// Returns the new archive flag.
pub fn plan_archive(state: SubmissionState, archive: bool) -> Result<bool, CoreError> {
    match (state.is_archived, archive) {
        (true, true) => Err(CoreError::precondition(MSG_SUBMISSION_ARCHIVED)),
        (false, false) => Err(CoreError::precondition(MSG_SUBMISSION_NOT_ARCHIVED)),
        _ => Ok(archive),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use FormSubmissionStatus::*;

    fn state(status: FormSubmissionStatus) -> SubmissionState {
        SubmissionState {
            status,
            is_archived: false,
        }
    }

    fn walk(actions: &[SubmissionAction]) -> Result<FormSubmissionStatus, CoreError> {
        let mut current = plan_start(true)?;
        for action in actions {
            current = plan_transition(state(current), *action, true)?.to;
        }
        Ok(current)
    }

    #[test]
    fn happy_path_reaches_completed() {
        use SubmissionAction::*;
        assert_eq!(walk(&[Save, Submit, StartReview, Approve]).unwrap(), Completed);
    }

    #[test]
    fn rejected_submission_can_be_reworked_and_resubmitted() {
        use SubmissionAction::*;
        assert_eq!(
            walk(&[Submit, StartReview, Reject, Save, Submit]).unwrap(),
            Submitted
        );
    }

    #[test]
    fn rejected_cannot_be_submitted_without_save() {
        assert!(plan_transition(state(Rejected), SubmissionAction::Submit, true).is_err());
    }

    #[test]
    fn review_requires_submitted() {
        assert_matches!(
            plan_transition(state(Ongoing), SubmissionAction::StartReview, true),
            Err(CoreError::Precondition(msg)) if msg == "Statuswechsel von 'ongoing' nach 'reviewing' ist nicht erlaubt"
        );
        assert!(plan_transition(state(Submitted), SubmissionAction::Approve, true).is_err());
    }

    #[test]
    fn completed_is_terminal() {
        for action in [
            SubmissionAction::Save,
            SubmissionAction::Submit,
            SubmissionAction::StartReview,
            SubmissionAction::Reject,
            SubmissionAction::Approve,
        ] {
            assert!(plan_transition(state(Completed), action, true).is_err());
        }
    }

    #[test]
    fn inactive_form_blocks_start_and_submit_but_not_review() {
        assert_matches!(plan_start(false), Err(CoreError::Precondition(msg)) if msg == MSG_FORM_INACTIVE);
        assert!(plan_transition(state(Ongoing), SubmissionAction::Submit, false).is_err());
        assert!(plan_transition(state(Submitted), SubmissionAction::StartReview, false).is_ok());
    }

    #[test]
    fn archived_submission_rejects_changes() {
        let archived = SubmissionState {
            status: Ongoing,
            is_archived: true,
        };
        assert_matches!(
            plan_transition(archived, SubmissionAction::Save, true),
            Err(CoreError::Precondition(msg)) if msg == MSG_SUBMISSION_ARCHIVED
        );
        assert!(!plan_archive(archived, false).unwrap());
        assert!(plan_archive(archived, true).is_err());
        assert!(plan_archive(state(Ongoing), false).is_err());
    }

    #[test]
    fn review_actions_use_review_rule() {
        assert_eq!(SubmissionAction::Approve.operation(), Operation::ReviewForm);
        assert_eq!(SubmissionAction::Save.operation(), Operation::SubmitForm);
    }
}
