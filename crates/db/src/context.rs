//! Permission context loading.
//!
//! Resolves team names for the entities involved in an operation and hands
//! them to [`PermissionContext`]. Every loader accepts a pool or an open
//! connection, so lifecycle operations can read inside their transaction.

use portal_core::permissions::{PermissionContext, Principal, ScopeKind};
use portal_core::types::{DbId, FormData};
use serde_json::Value;
use sqlx::{Acquire, PgConnection, Postgres};

use crate::repositories::{ScopeOwner, TeamRepo};

/// Context for workflow-level rules (`workflow` key only).
pub async fn workflow_context<'a, A>(
    conn: A,
    principal: &Principal,
    workflow_id: DbId,
    data: FormData,
) -> Result<Value, sqlx::Error>
where
    A: Acquire<'a, Database = Postgres>,
{
    let mut conn = conn.acquire().await?;
    workflow_context_on(&mut conn, principal, workflow_id, data).await
}

/// [`workflow_context`] on an already-acquired connection. Non-generic so
/// callers holding a transaction stay `Send` (see [`TeamRepo::scope_on`]).
pub async fn workflow_context_on(
    conn: &mut PgConnection,
    principal: &Principal,
    workflow_id: DbId,
    data: FormData,
) -> Result<Value, sqlx::Error> {
    let workflow = TeamRepo::scope_on(conn, ScopeOwner::Workflow, workflow_id).await?;
    Ok(PermissionContext::new(principal)
        .with_scope(ScopeKind::Workflow, workflow)
        .with_data(data)
        .build())
}

/// Context for process-level rules (`workflow` and `process` keys).
pub async fn process_context<'a, A>(
    conn: A,
    principal: &Principal,
    workflow_id: DbId,
    process_id: DbId,
    data: FormData,
) -> Result<Value, sqlx::Error>
where
    A: Acquire<'a, Database = Postgres>,
{
    let mut conn = conn.acquire().await?;
    process_context_on(&mut conn, principal, workflow_id, process_id, data).await
}

/// [`process_context`] on an already-acquired connection. Non-generic so
/// callers holding a transaction stay `Send` (see [`TeamRepo::scope_on`]).
pub async fn process_context_on(
    conn: &mut PgConnection,
    principal: &Principal,
    workflow_id: DbId,
    process_id: DbId,
    data: FormData,
) -> Result<Value, sqlx::Error> {
    let workflow = TeamRepo::scope_on(conn, ScopeOwner::Workflow, workflow_id).await?;
    let process = TeamRepo::scope_on(conn, ScopeOwner::Process, process_id).await?;
    Ok(PermissionContext::new(principal)
        .with_scope(ScopeKind::Workflow, workflow)
        .with_scope(ScopeKind::Process, process)
        .with_data(data)
        .build())
}

/// Context for form-level rules (`form` key only).
pub async fn form_context<'a, A>(
    conn: A,
    principal: &Principal,
    form_id: DbId,
    data: FormData,
) -> Result<Value, sqlx::Error>
where
    A: Acquire<'a, Database = Postgres>,
{
    let form = TeamRepo::scope(conn, ScopeOwner::Form, form_id).await?;
    Ok(PermissionContext::new(principal)
        .with_scope(ScopeKind::Form, form)
        .with_data(data)
        .build())
}
