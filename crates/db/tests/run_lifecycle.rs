//! Integration tests for the transactional run lifecycle.

use std::time::Duration;

use assert_matches::assert_matches;
use portal_core::error::CoreError;
use portal_core::lifecycle::{LifecycleEvent, Step, MSG_ALREADY_COMPLETED};
use portal_core::permissions::Principal;
use portal_core::roles::Role;
use portal_core::rules::ALLOW_ALL;
use portal_core::status::{ProcessRunStatus, WorkflowRunStatus};
use portal_core::types::DbId;
use portal_db::lifecycle::{self, LifecycleError};
use portal_db::models::n8n_workflow::CreateN8nWorkflow;
use portal_db::models::process::CreateProcess;
use portal_db::models::user::CreateUser;
use portal_db::models::workflow::{CreateWorkflow, UpdateWorkflow};
use portal_db::repositories::{
    N8nWorkflowRepo, ProcessRepo, ProcessRunRepo, UserRepo, WorkflowRepo, WorkflowRunRepo,
};
use serde_json::json;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn principal(pool: &PgPool, role: Role) -> Principal {
    let user = UserRepo::create(
        pool,
        &CreateUser {
            name: "Erika Muster".into(),
            email: format!("{}@example.de", role.as_str()),
            role: Some(role),
            image: None,
        },
    )
    .await
    .unwrap();
    Principal {
        id: user.id,
        email: user.email,
        name: user.name,
        role,
        teams: vec![],
    }
}

fn open_process(name: &str, sort_order: i32) -> CreateProcess {
    CreateProcess {
        name: name.into(),
        sort_order: Some(sort_order),
        submit_process_permissions: Some(ALLOW_ALL.into()),
        reset_process_permissions: Some(ALLOW_ALL.into()),
        view_process_permissions: Some(ALLOW_ALL.into()),
        ..Default::default()
    }
}

/// Workflow W with P1 and P2, where P2 depends on P1.
async fn two_step_workflow(pool: &PgPool) -> (DbId, DbId, DbId) {
    let workflow = WorkflowRepo::create(
        pool,
        &CreateWorkflow {
            name: "Urlaubsantrag".into(),
            description: None,
            is_active: Some(true),
            is_public: None,
            responsible_team_id: None,
            edit_workflow_permissions: None,
            submit_process_permissions: Some(ALLOW_ALL.into()),
            information: None,
        },
    )
    .await
    .unwrap();
    let p1 = ProcessRepo::create(pool, workflow.id, &open_process("P1", 1))
        .await
        .unwrap();
    let p2 = ProcessRepo::create(pool, workflow.id, &open_process("P2", 2))
        .await
        .unwrap();
    ProcessRepo::set_dependencies(pool, p2.id, &[p1.id])
        .await
        .unwrap();
    (workflow.id, p1.id, p2.id)
}

async fn process_run_for(pool: &PgPool, run_id: DbId, process_id: DbId) -> DbId {
    ProcessRunRepo::list_for_run(pool, run_id)
        .await
        .unwrap()
        .into_iter()
        .find(|pr| pr.process_id == process_id)
        .unwrap()
        .id
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_dependency_gating_and_cascade(pool: PgPool) {
    let user = principal(&pool, Role::User).await;
    let (workflow_id, p1, p2) = two_step_workflow(&pool).await;

    let run = lifecycle::initialize(&pool, &user, workflow_id, None)
        .await
        .unwrap()
        .value;
    assert_eq!(run.status(), Some(WorkflowRunStatus::Open));
    let pr1 = process_run_for(&pool, run.id, p1).await;
    let pr2 = process_run_for(&pool, run.id, p2).await;

    let err = lifecycle::complete(&pool, &user, pr2, None).await.unwrap_err();
    assert!(err.to_string().contains("P1"));

    lifecycle::complete(&pool, &user, pr1, None).await.unwrap();
    let run_after = WorkflowRunRepo::find_by_id(&pool, run.id).await.unwrap().unwrap();
    assert_eq!(run_after.status(), Some(WorkflowRunStatus::Ongoing));

    let outcome = lifecycle::complete(&pool, &user, pr2, Some(json!({"ok": true})))
        .await
        .unwrap();
    assert_eq!(outcome.value.status(), Some(ProcessRunStatus::Completed));
    assert_eq!(outcome.dispatch.step, Step::Complete { completes_run: true });

    let run_after = WorkflowRunRepo::find_by_id(&pool, run.id).await.unwrap().unwrap();
    assert_eq!(run_after.status(), Some(WorkflowRunStatus::Completed));
    assert!(run_after.completed_at.is_some());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_archived_run_rejects_save_until_reactivated(pool: PgPool) {
    let user = principal(&pool, Role::User).await;
    let (workflow_id, p1, _) = two_step_workflow(&pool).await;
    let run = lifecycle::initialize(&pool, &user, workflow_id, None)
        .await
        .unwrap()
        .value;
    let pr1 = process_run_for(&pool, run.id, p1).await;

    let archived = lifecycle::archive(&pool, &user, run.id, "Pausiert".into())
        .await
        .unwrap()
        .value;
    assert!(archived.is_archived);
    assert_eq!(archived.archived_notes.as_deref(), Some("Pausiert"));

    let err = lifecycle::save(&pool, &user, pr1, json!({"a": 1}))
        .await
        .unwrap_err();
    assert_matches!(err, LifecycleError::Core(CoreError::Precondition(_)));

    let reactivated = lifecycle::reactivate(&pool, &user, run.id).await.unwrap().value;
    assert!(!reactivated.is_archived);
    assert!(reactivated.archived_notes.is_none());

    let saved = lifecycle::save(&pool, &user, pr1, json!({"a": 1}))
        .await
        .unwrap()
        .value;
    assert_eq!(saved.data, json!({"a": 1}));
    assert_eq!(saved.submitted_by_id, Some(user.id));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_reset_reopens_completed_run(pool: PgPool) {
    let user = principal(&pool, Role::User).await;
    let (workflow_id, p1, p2) = two_step_workflow(&pool).await;
    let run = lifecycle::initialize(&pool, &user, workflow_id, None)
        .await
        .unwrap()
        .value;
    let pr1 = process_run_for(&pool, run.id, p1).await;
    let pr2 = process_run_for(&pool, run.id, p2).await;
    lifecycle::complete(&pool, &user, pr1, None).await.unwrap();
    lifecycle::complete(&pool, &user, pr2, None).await.unwrap();

    let outcome = lifecycle::reset(&pool, &user, pr1, "Bitte korrigieren".into())
        .await
        .unwrap();
    assert_eq!(outcome.value.status(), Some(ProcessRunStatus::Ongoing));
    assert_eq!(
        outcome.value.reset_process_text.as_deref(),
        Some("Bitte korrigieren")
    );
    assert_eq!(outcome.dispatch.context.event, LifecycleEvent::Reactivate);

    let run_after = WorkflowRunRepo::find_by_id(&pool, run.id).await.unwrap().unwrap();
    assert_eq!(run_after.status(), Some(WorkflowRunStatus::Ongoing));
    let sibling = ProcessRunRepo::find_by_id(&pool, pr2).await.unwrap().unwrap();
    assert_eq!(sibling.status(), Some(ProcessRunStatus::Completed));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_initialize_seeds_initializing_process(pool: PgPool) {
    let user = principal(&pool, Role::User).await;
    let (workflow_id, p1, _) = two_step_workflow(&pool).await;
    WorkflowRepo::update(
        &pool,
        workflow_id,
        &UpdateWorkflow {
            initialize_process_id: Some(p1),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let n8n = N8nWorkflowRepo::create(
        &pool,
        &CreateN8nWorkflow {
            workflow_id: "wf-init".into(),
            name: "Begrüßung".into(),
        },
    )
    .await
    .unwrap();
    N8nWorkflowRepo::connect_workflow(&pool, workflow_id, n8n.id, LifecycleEvent::Initialize)
        .await
        .unwrap();

    let outcome = lifecycle::initialize(&pool, &user, workflow_id, Some(json!({"name": "Erika"})))
        .await
        .unwrap();
    assert_eq!(outcome.value.status(), Some(WorkflowRunStatus::Ongoing));
    assert_eq!(outcome.dispatch.targets, vec!["wf-init".to_string()]);
    assert_eq!(outcome.dispatch.context.data["name"], "Erika");

    let seeded = ProcessRunRepo::find_by_id(&pool, process_run_for(&pool, outcome.value.id, p1).await)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(seeded.status(), Some(ProcessRunStatus::Ongoing));
    assert_eq!(seeded.data, json!({"name": "Erika"}));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_rule_denies_initialize(pool: PgPool) {
    let user = principal(&pool, Role::User).await;
    let workflow = WorkflowRepo::create(
        &pool,
        &CreateWorkflow {
            name: "Geschlossen".into(),
            description: None,
            is_active: Some(true),
            is_public: None,
            responsible_team_id: None,
            edit_workflow_permissions: None,
            submit_process_permissions: None,
            information: None,
        },
    )
    .await
    .unwrap();
    ProcessRepo::create(&pool, workflow.id, &open_process("Einzig", 0))
        .await
        .unwrap();

    let err = lifecycle::initialize(&pool, &user, workflow.id, None)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Keine Berechtigung zum Ausführen dieses Workflows");

    let admin = principal(&pool, Role::Admin).await;
    assert!(lifecycle::initialize(&pool, &admin, workflow.id, None).await.is_ok());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_initialize_checks_access_before_activity(pool: PgPool) {
    let user = principal(&pool, Role::User).await;
    let workflow = WorkflowRepo::create(
        &pool,
        &CreateWorkflow {
            name: "Stillgelegt".into(),
            description: None,
            is_active: Some(false),
            is_public: None,
            responsible_team_id: None,
            edit_workflow_permissions: None,
            submit_process_permissions: None,
            information: None,
        },
    )
    .await
    .unwrap();

    let err = lifecycle::initialize(&pool, &user, workflow.id, None)
        .await
        .unwrap_err();
    assert_matches!(err, LifecycleError::Core(CoreError::PermissionDenied(_)));

    let admin = principal(&pool, Role::Admin).await;
    let err = lifecycle::initialize(&pool, &admin, workflow.id, None)
        .await
        .unwrap_err();
    assert_matches!(err, LifecycleError::Core(CoreError::Precondition(_)));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_concurrent_complete_succeeds_once(pool: PgPool) {
    let user = principal(&pool, Role::User).await;
    let (workflow_id, p1, _) = two_step_workflow(&pool).await;
    let run = lifecycle::initialize(&pool, &user, workflow_id, None)
        .await
        .unwrap()
        .value;
    let pr1 = process_run_for(&pool, run.id, p1).await;

    let (first, second) = tokio::join!(
        lifecycle::complete(&pool, &user, pr1, Some(json!({"von": "erster"}))),
        lifecycle::complete(&pool, &user, pr1, Some(json!({"von": "zweiter"}))),
    );

    let results = [first, second];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    let loser = results.into_iter().find_map(Result::err).unwrap();
    assert_matches!(
        loser,
        LifecycleError::Core(CoreError::Precondition(msg)) if msg == MSG_ALREADY_COMPLETED
    );

    let run_after = WorkflowRunRepo::find_by_id(&pool, run.id).await.unwrap().unwrap();
    assert_eq!(run_after.status(), Some(WorkflowRunStatus::Ongoing));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_lifecycle_runs_on_single_connection(
    pool_opts: PgPoolOptions,
    connect_opts: PgConnectOptions,
) {
    let pool = pool_opts
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(3))
        .connect_with(connect_opts)
        .await
        .unwrap();
    let user = principal(&pool, Role::User).await;
    let (workflow_id, p1, p2) = two_step_workflow(&pool).await;

    let run = lifecycle::initialize(&pool, &user, workflow_id, None)
        .await
        .unwrap()
        .value;
    let pr1 = process_run_for(&pool, run.id, p1).await;
    let pr2 = process_run_for(&pool, run.id, p2).await;

    lifecycle::save(&pool, &user, pr1, json!({"a": 1})).await.unwrap();
    lifecycle::complete(&pool, &user, pr1, None).await.unwrap();
    lifecycle::complete(&pool, &user, pr2, None).await.unwrap();
    lifecycle::reset(&pool, &user, pr2, "Nochmal".into()).await.unwrap();
    lifecycle::archive(&pool, &user, run.id, "Pausiert".into()).await.unwrap();
    lifecycle::reactivate(&pool, &user, run.id).await.unwrap();
    lifecycle::delete(&pool, &user, run.id).await.unwrap();

    assert!(WorkflowRunRepo::find_by_id(&pool, run.id).await.unwrap().is_none());
}
