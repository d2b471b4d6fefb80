//! Transactional execution of run lifecycle plans.
//!
//! Every operation locks the workflow run row (`SELECT ... FOR UPDATE`),
//! loads a [`RunSnapshot`], checks access, asks the snapshot for a plan and
//! writes it with conditional updates inside the same transaction. Reads made
//! while the lock is held go through the transaction's connection. Webhook
//! dispatch is left to the caller: each operation returns the targets and
//! payload in its [`Outcome`].

use portal_core::access::{self, Operation, Subject};
use portal_core::error::{entity, CoreError};
use portal_core::lifecycle::{
    dispatch_targets, plan_initialize, ArchiveChange, Bindings, Dependency, ProcessDefinition,
    ProcessRunPlan, ProcessRunState, ResetText, RunPlan, RunSnapshot, StatusChange, Step,
    SubmissionContext, SubmissionUser, WorkflowRunState,
};
use portal_core::permissions::{merge_data, Principal};
use portal_core::status::{ProcessRunStatus, StatusId, WorkflowRunStatus};
use portal_core::types::{DbId, FormData};
use serde_json::Value;
use sqlx::{PgConnection, PgExecutor, PgPool};

use crate::context;
use crate::models::n8n_workflow::to_bindings;
use crate::models::process::Process;
use crate::models::process_run::{DependencyRow, ProcessRun, ProcessRunRow};
use crate::models::workflow::Workflow;
use crate::models::workflow_run::WorkflowRun;
use crate::repositories::{process_run_repo, workflow_run_repo};
use crate::repositories::{N8nWorkflowRepo, ProcessRepo, WorkflowRepo};

/// Reported when a conditional write matched no row.
pub const MSG_CONCURRENT_CHANGE: &str = "Prozess wurde zwischenzeitlich geändert";

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Webhook work to perform once the transaction has committed.
#[derive(Debug, Clone)]
pub struct Dispatch {
    pub step: Step,
    pub targets: Vec<String>,
    pub context: SubmissionContext,
}

/// Result of a lifecycle operation.
#[derive(Debug)]
pub struct Outcome<T> {
    pub value: T,
    pub dispatch: Dispatch,
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Start a new run of a workflow.
pub async fn initialize(
    pool: &PgPool,
    principal: &Principal,
    workflow_id: DbId,
    seed: Option<Value>,
) -> LifecycleResult<Outcome<WorkflowRun>> {
    let workflow = find_workflow(pool, workflow_id).await?;
    let seed = seed.filter(|s| !s.is_null());
    if seed.as_ref().is_some_and(|s| !s.is_object()) {
        return Err(CoreError::Validation(MSG_DATA_NOT_OBJECT.into()).into());
    }

    let seed_data = seed.as_ref().map(|s| merge_data([s])).unwrap_or_default();
    let ctx = context::workflow_context(pool, principal, workflow.id, seed_data.clone()).await?;
    access::authorize(
        principal,
        Operation::InitializeRun,
        Subject::Rule {
            rule: &workflow.submit_process_permissions,
            context: &ctx,
        },
    )?;

    let definitions = sqlx::query_as::<_, (DbId, bool, bool)>(
        "SELECT id, is_category, deleted_at IS NOT NULL
         FROM processes
         WHERE workflow_id = $1
         ORDER BY sort_order ASC, id ASC",
    )
    .bind(workflow.id)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|(id, is_category, is_deleted)| ProcessDefinition {
        id,
        is_category,
        is_deleted,
    })
    .collect::<Vec<_>>();

    let plan = plan_initialize(
        workflow.is_active,
        workflow.initialize_process_id,
        &definitions,
        seed,
    )?;

    let mut tx = pool.begin().await?;

    let insert_run = format!(
        "INSERT INTO workflow_runs (workflow_id, status_id, started_by_id)
         VALUES ($1, $2, $3)
         RETURNING {}",
        workflow_run_repo::COLUMNS
    );
    let run = sqlx::query_as::<_, WorkflowRun>(&insert_run)
        .bind(workflow.id)
        .bind(plan.run_status.id())
        .bind(principal.id)
        .fetch_one(&mut *tx)
        .await?;

    for new_run in &plan.process_runs {
        let seeded = new_run.data.is_some();
        sqlx::query(
            "INSERT INTO process_runs
                (workflow_run_id, process_id, status_id, data, started_at, submitted_by_id)
             VALUES ($1, $2, $3, COALESCE($4, '{}'::jsonb),
                     CASE WHEN $5 THEN NOW() END, $6)",
        )
        .bind(run.id)
        .bind(new_run.process_id)
        .bind(new_run.status.id())
        .bind(new_run.data.as_ref())
        .bind(seeded)
        .bind(seeded.then_some(principal.id))
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    tracing::info!(
        workflow_id = workflow.id,
        workflow_run_id = run.id,
        process_runs = plan.process_runs.len(),
        user_id = principal.id,
        "Workflow run initialized"
    );

    let dispatch = build_dispatch(
        pool,
        Step::Initialize,
        DispatchSource {
            workflow: &workflow,
            process: None,
            workflow_run_id: run.id,
            process_run_id: None,
        },
        principal,
        seed_data,
        None,
    )
    .await?;

    Ok(Outcome {
        value: run,
        dispatch,
    })
}

/// Store answers on a process run.
pub async fn save(
    pool: &PgPool,
    principal: &Principal,
    process_run_id: DbId,
    data: Value,
) -> LifecycleResult<Outcome<ProcessRun>> {
    if !data.is_object() {
        return Err(CoreError::Validation(MSG_DATA_NOT_OBJECT.into()).into());
    }
    run_process_action(pool, principal, process_run_id, ProcessAction::Save(data)).await
}

/// Complete a process run, optionally storing final answers.
pub async fn complete(
    pool: &PgPool,
    principal: &Principal,
    process_run_id: DbId,
    data: Option<Value>,
) -> LifecycleResult<Outcome<ProcessRun>> {
    let data = data.filter(|d| !d.is_null());
    if data.as_ref().is_some_and(|d| !d.is_object()) {
        return Err(CoreError::Validation(MSG_DATA_NOT_OBJECT.into()).into());
    }
    run_process_action(pool, principal, process_run_id, ProcessAction::Complete(data)).await
}

/// Reopen a completed process run with an explanatory text.
pub async fn reset(
    pool: &PgPool,
    principal: &Principal,
    process_run_id: DbId,
    reset_text: String,
) -> LifecycleResult<Outcome<ProcessRun>> {
    run_process_action(pool, principal, process_run_id, ProcessAction::Reset(reset_text)).await
}

/// Archive a workflow run. Its status is left untouched.
pub async fn archive(
    pool: &PgPool,
    principal: &Principal,
    workflow_run_id: DbId,
    notes: String,
) -> LifecycleResult<Outcome<WorkflowRun>> {
    run_archive_action(pool, principal, workflow_run_id, Some(notes)).await
}

/// Clear the archive flag of a workflow run.
pub async fn reactivate(
    pool: &PgPool,
    principal: &Principal,
    workflow_run_id: DbId,
) -> LifecycleResult<Outcome<WorkflowRun>> {
    run_archive_action(pool, principal, workflow_run_id, None).await
}

/// Hard-delete a workflow run with all of its process runs.
pub async fn delete(
    pool: &PgPool,
    principal: &Principal,
    workflow_run_id: DbId,
) -> LifecycleResult<()> {
    let mut tx = pool.begin().await?;
    let run = lock_run(&mut tx, workflow_run_id).await?;
    let workflow = find_workflow(&mut *tx, run.workflow_id).await?;

    let ctx =
        context::workflow_context_on(&mut tx, principal, workflow.id, FormData::new()).await?;
    access::authorize(
        principal,
        Operation::DeleteRun,
        Subject::Rule {
            rule: &workflow.submit_process_permissions,
            context: &ctx,
        },
    )?;

    sqlx::query("DELETE FROM workflow_runs WHERE id = $1")
        .bind(run.id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::info!(workflow_run_id = run.id, user_id = principal.id, "Workflow run deleted");
    Ok(())
}

// ---------------------------------------------------------------------------
// Shared flows
// ---------------------------------------------------------------------------

const MSG_DATA_NOT_OBJECT: &str = "Daten müssen ein JSON-Objekt sein";

enum ProcessAction {
    Save(Value),
    Complete(Option<Value>),
    Reset(String),
}

async fn run_process_action(
    pool: &PgPool,
    principal: &Principal,
    process_run_id: DbId,
    action: ProcessAction,
) -> LifecycleResult<Outcome<ProcessRun>> {
    let workflow_run_id =
        sqlx::query_scalar::<_, DbId>("SELECT workflow_run_id FROM process_runs WHERE id = $1")
            .bind(process_run_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| CoreError::not_found(entity::PROCESS_RUN))?;

    let mut tx = pool.begin().await?;
    let run = lock_run(&mut tx, workflow_run_id).await?;
    let mut snapshot = load_snapshot(&mut tx, &run).await?;

    let process_id = snapshot.process_run(process_run_id)?.process_id;
    let workflow = find_workflow(&mut *tx, run.workflow_id).await?;
    let process = ProcessRepo::find_by_id(&mut *tx, process_id)
        .await?
        .ok_or_else(|| CoreError::not_found(entity::PROCESS))?;

    let (operation, rule) = match action {
        ProcessAction::Save(_) | ProcessAction::Complete(_) => {
            (Operation::SubmitProcess, &process.submit_process_permissions)
        }
        ProcessAction::Reset(_) => (Operation::ResetProcess, &process.reset_process_permissions),
    };
    let ctx = context::process_context_on(
        &mut tx,
        principal,
        workflow.id,
        process.id,
        snapshot.merged_data(),
    )
    .await?;
    access::authorize(
        principal,
        operation,
        Subject::Rule {
            rule,
            context: &ctx,
        },
    )?;

    let (plan, step, message) = match action {
        ProcessAction::Save(data) => (snapshot.plan_save(process_run_id, data)?, Step::Save, None),
        ProcessAction::Complete(data) => {
            let plan = snapshot.plan_complete(process_run_id, data)?;
            let step = Step::Complete {
                completes_run: plan.completes_run(),
            };
            (plan, step, None)
        }
        ProcessAction::Reset(text) => {
            let plan = snapshot.plan_reset(process_run_id, text.clone())?;
            let step = Step::Reset {
                reopens_run: plan.reopens_run(),
            };
            (plan, step, Some(text))
        }
    };

    write_process_plan(&mut tx, &plan, principal.id).await?;
    if let Some(change) = plan.run_change {
        write_run_change(&mut tx, run.id, change).await?;
    }
    if plan.clear_archive {
        clear_archive(&mut tx, run.id).await?;
    }
    snapshot.apply(&plan);

    let select = format!(
        "SELECT {} FROM process_runs WHERE id = $1",
        process_run_repo::COLUMNS
    );
    let process_run = sqlx::query_as::<_, ProcessRun>(&select)
        .bind(process_run_id)
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(
        workflow_run_id = run.id,
        process_run_id,
        from = %plan.process_change.from,
        to = %plan.process_change.to,
        run_status = %snapshot.run.status,
        user_id = principal.id,
        "Process run transitioned"
    );

    let dispatch = build_dispatch(
        pool,
        step,
        DispatchSource {
            workflow: &workflow,
            process: Some(&process),
            workflow_run_id: run.id,
            process_run_id: Some(process_run_id),
        },
        principal,
        snapshot.merged_data(),
        message,
    )
    .await?;

    Ok(Outcome {
        value: process_run,
        dispatch,
    })
}

/// `notes` is `Some` for archive and `None` for reactivate.
async fn run_archive_action(
    pool: &PgPool,
    principal: &Principal,
    workflow_run_id: DbId,
    notes: Option<String>,
) -> LifecycleResult<Outcome<WorkflowRun>> {
    let mut tx = pool.begin().await?;
    let run = lock_run(&mut tx, workflow_run_id).await?;
    let mut snapshot = load_snapshot(&mut tx, &run).await?;
    let workflow = find_workflow(&mut *tx, run.workflow_id).await?;

    let operation = if notes.is_some() {
        Operation::ArchiveRun
    } else {
        Operation::ReactivateRun
    };
    let ctx =
        context::workflow_context_on(&mut tx, principal, workflow.id, snapshot.merged_data())
            .await?;
    access::authorize(
        principal,
        operation,
        Subject::Rule {
            rule: &workflow.submit_process_permissions,
            context: &ctx,
        },
    )?;

    let (plan, step) = match &notes {
        Some(notes) => (snapshot.plan_archive(notes.clone())?, Step::Archive),
        None => (snapshot.plan_reactivate()?, Step::Reactivate),
    };
    write_run_plan(&mut tx, run.id, &plan).await?;
    snapshot.apply_run(&plan);

    let select = format!(
        "SELECT {} FROM workflow_runs WHERE id = $1",
        workflow_run_repo::COLUMNS
    );
    let updated = sqlx::query_as::<_, WorkflowRun>(&select)
        .bind(run.id)
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(
        workflow_run_id = run.id,
        is_archived = updated.is_archived,
        user_id = principal.id,
        "Workflow run archive flag changed"
    );

    let dispatch = build_dispatch(
        pool,
        step,
        DispatchSource {
            workflow: &workflow,
            process: None,
            workflow_run_id: run.id,
            process_run_id: None,
        },
        principal,
        snapshot.merged_data(),
        notes,
    )
    .await?;

    Ok(Outcome {
        value: updated,
        dispatch,
    })
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

async fn find_workflow<'e>(executor: impl PgExecutor<'e>, id: DbId) -> LifecycleResult<Workflow> {
    WorkflowRepo::find_by_id(executor, id)
        .await?
        .ok_or_else(|| CoreError::not_found(entity::WORKFLOW).into())
}

/// Lock the workflow run row for the rest of the transaction.
async fn lock_run(conn: &mut PgConnection, id: DbId) -> LifecycleResult<WorkflowRun> {
    let query = format!(
        "SELECT {} FROM workflow_runs WHERE id = $1 FOR UPDATE",
        workflow_run_repo::COLUMNS
    );
    sqlx::query_as::<_, WorkflowRun>(&query)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| CoreError::not_found(entity::WORKFLOW_RUN).into())
}

/// Load all process runs of live processes with their dependency names.
async fn load_snapshot(conn: &mut PgConnection, run: &WorkflowRun) -> LifecycleResult<RunSnapshot> {
    let rows = sqlx::query_as::<_, ProcessRunRow>(
        "SELECT pr.id, pr.process_id, p.name AS process_name, pr.status_id, pr.data
         FROM process_runs pr
         JOIN processes p ON p.id = pr.process_id
         WHERE pr.workflow_run_id = $1 AND p.deleted_at IS NULL
         ORDER BY p.sort_order ASC, p.id ASC",
    )
    .bind(run.id)
    .fetch_all(&mut *conn)
    .await?;

    let dependencies = sqlx::query_as::<_, DependencyRow>(
        "SELECT d.process_id, d.depends_on_id, dp.name AS depends_on_name
         FROM process_dependencies d
         JOIN process_runs pr ON pr.process_id = d.process_id
         JOIN processes dp ON dp.id = d.depends_on_id
         WHERE pr.workflow_run_id = $1 AND dp.deleted_at IS NULL
         ORDER BY dp.sort_order ASC, dp.id ASC",
    )
    .bind(run.id)
    .fetch_all(&mut *conn)
    .await?;

    let process_runs = rows
        .into_iter()
        .map(|row| {
            Ok(ProcessRunState {
                id: row.id,
                process_id: row.process_id,
                process_name: row.process_name,
                status: process_run_status(row.status_id)?,
                data: row.data,
                dependencies: dependencies
                    .iter()
                    .filter(|d| d.process_id == row.process_id)
                    .map(|d| Dependency {
                        process_id: d.depends_on_id,
                        name: d.depends_on_name.clone(),
                    })
                    .collect(),
            })
        })
        .collect::<Result<Vec<_>, CoreError>>()?;

    Ok(RunSnapshot {
        run: WorkflowRunState {
            id: run.id,
            status: workflow_run_status(run.status_id)?,
            is_archived: run.is_archived,
        },
        process_runs,
    })
}

fn workflow_run_status(id: StatusId) -> Result<WorkflowRunStatus, CoreError> {
    WorkflowRunStatus::from_id(id)
        .ok_or_else(|| CoreError::Internal(format!("unknown workflow run status id {id}")))
}

fn process_run_status(id: StatusId) -> Result<ProcessRunStatus, CoreError> {
    ProcessRunStatus::from_id(id)
        .ok_or_else(|| CoreError::Internal(format!("unknown process run status id {id}")))
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

fn concurrent_change() -> LifecycleError {
    CoreError::Conflict(MSG_CONCURRENT_CHANGE.into()).into()
}

async fn write_process_plan(
    conn: &mut PgConnection,
    plan: &ProcessRunPlan,
    user_id: DbId,
) -> LifecycleResult<()> {
    let reset_text = match &plan.reset_text {
        ResetText::Clear => None,
        ResetText::Set(text) => Some(text.as_str()),
    };
    let completed = plan.process_change.to == ProcessRunStatus::Completed;
    let records_submitter = completed || plan.data.is_some();

    let result = sqlx::query(
        "UPDATE process_runs SET
            status_id = $3,
            data = COALESCE($4, data),
            reset_process_text = $5,
            started_at = COALESCE(started_at, NOW()),
            completed_at = CASE WHEN $6 THEN NOW() ELSE NULL END,
            submitted_by_id = CASE WHEN $7 THEN $8 ELSE submitted_by_id END
         WHERE id = $1 AND status_id = $2",
    )
    .bind(plan.process_run_id)
    .bind(plan.process_change.from.id())
    .bind(plan.process_change.to.id())
    .bind(plan.data.as_ref())
    .bind(reset_text)
    .bind(completed)
    .bind(records_submitter)
    .bind(user_id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(concurrent_change());
    }
    Ok(())
}

async fn write_run_change(
    conn: &mut PgConnection,
    run_id: DbId,
    change: StatusChange<WorkflowRunStatus>,
) -> LifecycleResult<()> {
    let result = sqlx::query(
        "UPDATE workflow_runs SET
            status_id = $3,
            completed_at = CASE WHEN $4 THEN NOW() ELSE NULL END
         WHERE id = $1 AND status_id = $2",
    )
    .bind(run_id)
    .bind(change.from.id())
    .bind(change.to.id())
    .bind(change.to == WorkflowRunStatus::Completed)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(concurrent_change());
    }
    Ok(())
}

async fn clear_archive(conn: &mut PgConnection, run_id: DbId) -> LifecycleResult<()> {
    sqlx::query(
        "UPDATE workflow_runs SET is_archived = FALSE, archived_at = NULL, archived_notes = NULL
         WHERE id = $1",
    )
    .bind(run_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn write_run_plan(conn: &mut PgConnection, run_id: DbId, plan: &RunPlan) -> LifecycleResult<()> {
    if let Some(change) = plan.run_change {
        write_run_change(conn, run_id, change).await?;
    }
    match &plan.archive {
        ArchiveChange::Archive { notes } => {
            let result = sqlx::query(
                "UPDATE workflow_runs SET
                    is_archived = TRUE, archived_at = NOW(), archived_notes = $2
                 WHERE id = $1 AND is_archived = FALSE",
            )
            .bind(run_id)
            .bind(notes)
            .execute(&mut *conn)
            .await?;
            if result.rows_affected() == 0 {
                return Err(concurrent_change());
            }
        }
        ArchiveChange::Clear => clear_archive(conn, run_id).await?,
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

struct DispatchSource<'a> {
    workflow: &'a Workflow,
    process: Option<&'a Process>,
    workflow_run_id: DbId,
    process_run_id: Option<DbId>,
}

async fn build_dispatch(
    pool: &PgPool,
    step: Step,
    source: DispatchSource<'_>,
    principal: &Principal,
    data: FormData,
    message: Option<String>,
) -> LifecycleResult<Dispatch> {
    let workflow_bindings =
        to_bindings(&N8nWorkflowRepo::bindings_for_workflow(pool, source.workflow.id).await?);
    let process_bindings = match source.process {
        Some(process) => to_bindings(&N8nWorkflowRepo::bindings_for_process(pool, process.id).await?),
        None => Bindings::default(),
    };

    Ok(Dispatch {
        step,
        targets: dispatch_targets(step, &workflow_bindings, &process_bindings),
        context: SubmissionContext {
            event: step.event(),
            workflow_id: source.workflow.id,
            workflow_name: source.workflow.name.clone(),
            workflow_run_id: source.workflow_run_id,
            process_run_id: source.process_run_id,
            process_name: source.process.map(|p| p.name.clone()),
            user: SubmissionUser {
                id: principal.id,
                email: principal.email.clone(),
                name: principal.name.clone(),
            },
            data,
            message,
        },
    })
}
