//! HTTP-level tests for running workflows, including webhook delivery.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use common::{body_json, get_auth, post_json_auth, put_json_auth, token_for, RecordingNotifier};
use portal_core::lifecycle::LifecycleEvent;
use portal_core::roles::Role;
use portal_core::rules::ALLOW_ALL;
use portal_core::types::DbId;
use portal_db::models::n8n_workflow::CreateN8nWorkflow;
use portal_db::models::process::CreateProcess;
use portal_db::models::user::CreateUser;
use portal_db::models::workflow::CreateWorkflow;
use portal_db::repositories::{
    N8nWorkflowRepo, ProcessRepo, ProcessRunRepo, UserRepo, WorkflowRepo, WorkflowRunRepo,
};
use serde_json::json;
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn user_token(pool: &PgPool, role: Role) -> (DbId, String) {
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
    (user.id, token_for(user.id, role))
}

/// Open workflow with a single process and every lifecycle event bound to
/// one external workflow.
async fn bound_workflow(pool: &PgPool) -> (DbId, DbId) {
    let workflow = WorkflowRepo::create(
        pool,
        &CreateWorkflow {
            name: "Reisekosten".into(),
            description: None,
            is_active: Some(true),
            is_public: Some(true),
            responsible_team_id: None,
            edit_workflow_permissions: None,
            submit_process_permissions: Some(ALLOW_ALL.into()),
            information: None,
        },
    )
    .await
    .unwrap();
    let process = ProcessRepo::create(
        pool,
        workflow.id,
        &CreateProcess {
            name: "Belege".into(),
            submit_process_permissions: Some(ALLOW_ALL.into()),
            view_process_permissions: Some(ALLOW_ALL.into()),
            reset_process_permissions: Some(ALLOW_ALL.into()),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let n8n = N8nWorkflowRepo::create(
        pool,
        &CreateN8nWorkflow {
            workflow_id: "wf-reise".into(),
            name: "Reise Automatisierung".into(),
        },
    )
    .await
    .unwrap();
    for event in [
        LifecycleEvent::Initialize,
        LifecycleEvent::Complete,
        LifecycleEvent::Archive,
    ] {
        N8nWorkflowRepo::connect_workflow(pool, workflow.id, n8n.id, event)
            .await
            .unwrap();
    }

    (workflow.id, process.id)
}

async fn only_process_run(pool: &PgPool, run_id: DbId) -> DbId {
    ProcessRunRepo::list_for_run(pool, run_id).await.unwrap()[0].id
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_initialize_and_complete_notify_bound_workflows(pool: PgPool) {
    let (_, token) = user_token(&pool, Role::User).await;
    let (workflow_id, _) = bound_workflow(&pool).await;
    let notifier = Arc::new(RecordingNotifier::default());

    let app = common::build_test_app_with(pool.clone(), Arc::clone(&notifier));
    let response = post_json_auth(
        app,
        &format!("/api/v1/workflows/{workflow_id}/runs"),
        json!({}),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let run_id = body_json(response).await["data"]["id"].as_i64().unwrap();

    let process_run_id = only_process_run(&pool, run_id).await;
    let app = common::build_test_app_with(pool.clone(), Arc::clone(&notifier));
    let response = post_json_auth(
        app,
        &format!("/api/v1/process-runs/{process_run_id}/complete"),
        json!({"data": {"betrag": 120}}),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["data"]["betrag"], 120);

    assert_eq!(
        notifier.events(),
        vec![LifecycleEvent::Initialize, LifecycleEvent::Complete]
    );

    let app = common::build_test_app_with(pool.clone(), notifier);
    let response = get_auth(app, &format!("/api/v1/workflow-runs/{run_id}"), &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], "completed");
    assert_eq!(json["data"]["processes"][0]["status"], "completed");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_failed_complete_webhook_returns_502_but_keeps_state(pool: PgPool) {
    let (_, token) = user_token(&pool, Role::User).await;
    let (workflow_id, _) = bound_workflow(&pool).await;

    let ok = Arc::new(RecordingNotifier::default());
    let app = common::build_test_app_with(pool.clone(), ok);
    let response = post_json_auth(
        app,
        &format!("/api/v1/workflows/{workflow_id}/runs"),
        json!({}),
        &token,
    )
    .await;
    let run_id = body_json(response).await["data"]["id"].as_i64().unwrap();
    let process_run_id = only_process_run(&pool, run_id).await;

    let failing = Arc::new(RecordingNotifier::failing());
    let app = common::build_test_app_with(pool.clone(), Arc::clone(&failing));
    let response = post_json_auth(
        app,
        &format!("/api/v1/process-runs/{process_run_id}/complete"),
        json!({}),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_json(response).await["code"], "WEBHOOK_FAILED");

    let stored = ProcessRunRepo::find_by_id(&pool, process_run_id)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.completed_at.is_some());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_failed_archive_webhook_is_only_logged(pool: PgPool) {
    let (_, token) = user_token(&pool, Role::User).await;
    let (workflow_id, _) = bound_workflow(&pool).await;

    let app = common::build_test_app_with(pool.clone(), Arc::new(RecordingNotifier::default()));
    let response = post_json_auth(
        app,
        &format!("/api/v1/workflows/{workflow_id}/runs"),
        json!({}),
        &token,
    )
    .await;
    let run_id = body_json(response).await["data"]["id"].as_i64().unwrap();

    let failing = Arc::new(RecordingNotifier::failing());
    let app = common::build_test_app_with(pool.clone(), Arc::clone(&failing));
    let response = post_json_auth(
        app,
        &format!("/api/v1/workflow-runs/{run_id}/archive"),
        json!({"notes": "Abgebrochen"}),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(failing.events(), vec![LifecycleEvent::Archive]);

    let run = WorkflowRunRepo::find_by_id(&pool, run_id).await.unwrap().unwrap();
    assert!(run.is_archived);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_save_rejects_non_object_data(pool: PgPool) {
    let (_, token) = user_token(&pool, Role::User).await;
    let (workflow_id, _) = bound_workflow(&pool).await;

    let app = common::build_test_app(pool.clone());
    let response = post_json_auth(
        app,
        &format!("/api/v1/workflows/{workflow_id}/runs"),
        json!({}),
        &token,
    )
    .await;
    let run_id = body_json(response).await["data"]["id"].as_i64().unwrap();
    let process_run_id = only_process_run(&pool, run_id).await;

    let app = common::build_test_app(pool.clone());
    let response = put_json_auth(
        app,
        &format!("/api/v1/process-runs/{process_run_id}"),
        json!({"data": [1, 2, 3]}),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_team_listing_requires_moderator(pool: PgPool) {
    let (_, plain_token) = user_token(&pool, Role::User).await;
    let (_, moderator_token) = user_token(&pool, Role::Moderator).await;

    let app = common::build_test_app(pool.clone());
    let response = get_auth(app, "/api/v1/teams", &plain_token).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let app = common::build_test_app(pool.clone());
    let response = get_auth(app, "/api/v1/teams", &moderator_token).await;
    assert_eq!(response.status(), StatusCode::OK);
}
