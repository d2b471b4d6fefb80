//! Per-operation authorization checkpoint.
//!
//! Admins bypass every check. Structural operations are gated by role;
//! content and run operations evaluate the entity's stored rule against a
//! [`crate::permissions::PermissionContext`]. Submissions to standalone forms
//! are gated by team membership unless the form is public.

use serde_json::Value;

use crate::error::CoreError;
use crate::permissions::{EntityScope, Principal};
use crate::roles::Role;
use crate::rules;

/// Operations guarded by the access gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    CreateWorkflow,
    DeleteWorkflow,
    ManageWorkflowBindings,
    EditWorkflow,
    InitializeRun,
    ViewRun,
    DeleteRun,
    ArchiveRun,
    ReactivateRun,
    CreateProcess,
    DeleteProcess,
    EditProcess,
    SubmitProcess,
    ViewProcess,
    ResetProcess,
    CreateForm,
    DeleteForm,
    EditForm,
    ReviewForm,
    SubmitForm,
    ManageN8nWorkflows,
    ManageTeams,
}

/// What a non-admin principal must satisfy for an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Role(Role),
    Rule,
    Membership,
}

impl Operation {
    pub fn requirement(self) -> Requirement {
        use Operation::*;
        match self {
            CreateWorkflow | DeleteWorkflow | ManageWorkflowBindings | CreateProcess
            | DeleteProcess | CreateForm | DeleteForm | ManageN8nWorkflows | ManageTeams => {
                Requirement::Role(Role::Moderator)
            }
            SubmitForm => Requirement::Membership,
            _ => Requirement::Rule,
        }
    }

    /// Fixed user-facing denial message.
    pub fn denial_message(self) -> &'static str {
        use Operation::*;
        match self {
            CreateWorkflow => "Keine Berechtigung zum Erstellen eines Workflows",
            DeleteWorkflow => "Keine Berechtigung zum Löschen dieses Workflows",
            ManageWorkflowBindings | EditWorkflow => {
                "Keine Berechtigung zum Bearbeiten dieses Workflows"
            }
            InitializeRun => "Keine Berechtigung zum Ausführen dieses Workflows",
            ViewRun => "Keine Berechtigung zum Anzeigen dieses Workflows",
            DeleteRun => "Keine Berechtigung zum Löschen dieses Workflows",
            ArchiveRun => "Keine Berechtigung zum Archivieren dieses Workflows",
            ReactivateRun => "Keine Berechtigung zum Reaktivieren dieses Workflows",
            CreateProcess => "Keine Berechtigung zum Erstellen eines Prozesses",
            DeleteProcess => "Keine Berechtigung zum Löschen dieses Prozesses",
            EditProcess => "Keine Berechtigung zum Bearbeiten dieses Prozesses",
            SubmitProcess => "Keine Berechtigung zum Ausführen dieses Prozesses",
            ViewProcess => "Keine Berechtigung zum Anzeigen dieses Prozesses",
            ResetProcess => "Keine Berechtigung zum Zurücksetzen dieses Prozesses",
            CreateForm => "Keine Berechtigung zum Erstellen eines Formulars",
            DeleteForm => "Keine Berechtigung zum Löschen dieses Formulars",
            EditForm => "Keine Berechtigung zum Bearbeiten dieses Formulars",
            ReviewForm => "Keine Berechtigung zum Prüfen dieses Formulars",
            SubmitForm => "Keine Berechtigung zum Ausführen dieses Formulars",
            ManageN8nWorkflows => "Keine Berechtigung zum Bearbeiten von N8n Workflows",
            ManageTeams => "Keine Berechtigung zum Bearbeiten von Teams",
        }
    }

    fn denied(self) -> CoreError {
        CoreError::PermissionDenied(self.denial_message().to_string())
    }
}

/// What the entity offers for the check.
#[derive(Debug, Clone, Copy)]
pub enum Subject<'a> {
    /// Nothing beyond the principal's role.
    None,
    /// A stored rule and the context to evaluate it against.
    Rule { rule: &'a str, context: &'a Value },
    /// Team assignment of a form, plus whether it is open to everyone.
    Scope {
        is_public: bool,
        scope: &'a EntityScope,
    },
}

/// Decide whether `principal` may perform `operation` on `subject`.
///
/// Returns `CoreError::PermissionDenied` with the operation's message on
/// denial. Rule errors deny.
pub fn authorize(
    principal: &Principal,
    operation: Operation,
    subject: Subject<'_>,
) -> Result<(), CoreError> {
    if principal.role.is_admin() {
        return Ok(());
    }

    let allowed = match (operation.requirement(), subject) {
        (Requirement::Role(required), _) => principal.role.meets(required),
        (Requirement::Rule, Subject::Rule { rule, context }) => rules::is_allowed(rule, context),
        (Requirement::Membership, Subject::Scope { is_public, scope }) => {
            is_public || scope.includes(principal)
        }
        _ => false,
    };

    if allowed {
        Ok(())
    } else {
        Err(operation.denied())
    }
}

/// Shorthand for role-gated structural operations.
pub fn require_role(principal: &Principal, operation: Operation) -> Result<(), CoreError> {
    authorize(principal, operation, Subject::None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::{PermissionContext, ScopeKind};
    use assert_matches::assert_matches;
    use serde_json::json;

    fn principal(role: Role, teams: &[&str]) -> Principal {
        Principal {
            id: 1,
            email: "p@example.de".into(),
            name: "P".into(),
            role,
            teams: teams.iter().map(|t| t.to_string()).collect(),
        }
    }

    const ALL_OPERATIONS: [Operation; 22] = [
        Operation::CreateWorkflow,
        Operation::DeleteWorkflow,
        Operation::ManageWorkflowBindings,
        Operation::EditWorkflow,
        Operation::InitializeRun,
        Operation::ViewRun,
        Operation::DeleteRun,
        Operation::ArchiveRun,
        Operation::ReactivateRun,
        Operation::CreateProcess,
        Operation::DeleteProcess,
        Operation::EditProcess,
        Operation::SubmitProcess,
        Operation::ViewProcess,
        Operation::ResetProcess,
        Operation::CreateForm,
        Operation::DeleteForm,
        Operation::EditForm,
        Operation::ReviewForm,
        Operation::SubmitForm,
        Operation::ManageN8nWorkflows,
        Operation::ManageTeams,
    ];

    #[test]
    fn admin_bypasses_every_rule() {
        let admin = principal(Role::Admin, &[]);
        let ctx = PermissionContext::new(&admin).build();
        let scope = EntityScope::default();
        for op in ALL_OPERATIONS {
            for rule in ["{}", "false", "{not json", r#"{"==": [1, 2]}"#] {
                assert!(authorize(&admin, op, Subject::Rule { rule, context: &ctx }).is_ok());
            }
            assert!(authorize(&admin, op, Subject::None).is_ok());
            assert!(authorize(
                &admin,
                op,
                Subject::Scope {
                    is_public: false,
                    scope: &scope
                }
            )
            .is_ok());
        }
    }

    #[test]
    fn structural_operations_require_moderator() {
        let user = principal(Role::User, &[]);
        let moderator = principal(Role::Moderator, &[]);
        assert_matches!(
            require_role(&user, Operation::CreateWorkflow),
            Err(CoreError::PermissionDenied(msg)) if msg == "Keine Berechtigung zum Erstellen eines Workflows"
        );
        assert!(require_role(&moderator, Operation::CreateWorkflow).is_ok());
        assert!(require_role(&moderator, Operation::DeleteProcess).is_ok());
        assert!(require_role(&moderator, Operation::ManageWorkflowBindings).is_ok());
    }

    #[test]
    fn moderator_is_still_subject_to_rules() {
        let moderator = principal(Role::Moderator, &[]);
        let ctx = PermissionContext::new(&moderator).build();
        assert_matches!(
            authorize(
                &moderator,
                Operation::EditWorkflow,
                Subject::Rule { rule: "{}", context: &ctx }
            ),
            Err(CoreError::PermissionDenied(msg)) if msg == "Keine Berechtigung zum Bearbeiten dieses Workflows"
        );
    }

    #[test]
    fn rule_operations_evaluate_context() {
        let user = principal(Role::User, &["Einkauf"]);
        let ctx = PermissionContext::new(&user)
            .with_scope(
                ScopeKind::Workflow,
                EntityScope::new(Some("Einkauf".into()), vec![]),
            )
            .build();
        let rule = r#"{"in": [{"var": "workflow.responsibleTeam"}, {"var": "user.teams"}]}"#;
        assert!(authorize(&user, Operation::InitializeRun, Subject::Rule { rule, context: &ctx }).is_ok());

        let outsider = principal(Role::User, &["Lager"]);
        let ctx = PermissionContext::new(&outsider)
            .with_scope(
                ScopeKind::Workflow,
                EntityScope::new(Some("Einkauf".into()), vec![]),
            )
            .build();
        assert_matches!(
            authorize(&outsider, Operation::InitializeRun, Subject::Rule { rule, context: &ctx }),
            Err(CoreError::PermissionDenied(msg)) if msg == "Keine Berechtigung zum Ausführen dieses Workflows"
        );
    }

    #[test]
    fn true_rule_allows_plain_users() {
        let user = principal(Role::User, &[]);
        let ctx = json!({});
        assert!(authorize(&user, Operation::ViewProcess, Subject::Rule { rule: "true", context: &ctx }).is_ok());
    }

    #[test]
    fn malformed_rule_denies() {
        let user = principal(Role::User, &[]);
        let ctx = json!({});
        assert!(authorize(
            &user,
            Operation::ResetProcess,
            Subject::Rule { rule: r#"{"exec": []}"#, context: &ctx }
        )
        .is_err());
    }

    #[test]
    fn rule_operation_without_rule_denies() {
        let user = principal(Role::User, &[]);
        assert!(authorize(&user, Operation::SubmitProcess, Subject::None).is_err());
    }

    #[test]
    fn form_submission_membership() {
        let member = principal(Role::User, &["Personal"]);
        let outsider = principal(Role::User, &["Lager"]);
        let scope = EntityScope::new(Some("Personal".into()), vec![]);

        let private = Subject::Scope { is_public: false, scope: &scope };
        assert!(authorize(&member, Operation::SubmitForm, private).is_ok());
        assert_matches!(
            authorize(&outsider, Operation::SubmitForm, private),
            Err(CoreError::PermissionDenied(_))
        );

        let public = Subject::Scope { is_public: true, scope: &scope };
        assert!(authorize(&outsider, Operation::SubmitForm, public).is_ok());
    }
}
