//! Repository for `n8n_workflows` and the workflow/process binding tables.

use portal_core::lifecycle::LifecycleEvent;
use portal_core::types::DbId;
use sqlx::PgPool;

use crate::models::n8n_workflow::{CreateN8nWorkflow, N8nBinding, N8nWorkflow};

/// Column list for n8n_workflows queries.
const COLUMNS: &str = "id, workflow_id, name, created_at, updated_at";

/// Provides CRUD operations for external workflows and their bindings.
pub struct N8nWorkflowRepo;

impl N8nWorkflowRepo {
    /// Register an external workflow, returning the created row.
    pub async fn create(
        pool: &PgPool,
        input: &CreateN8nWorkflow,
    ) -> Result<N8nWorkflow, sqlx::Error> {
        let query = format!(
            "INSERT INTO n8n_workflows (workflow_id, name) VALUES ($1, $2) RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, N8nWorkflow>(&query)
            .bind(&input.workflow_id)
            .bind(&input.name)
            .fetch_one(pool)
            .await
    }

    /// Find an external workflow by ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<N8nWorkflow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM n8n_workflows WHERE id = $1");
        sqlx::query_as::<_, N8nWorkflow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List all external workflows ordered by name.
    pub async fn list(pool: &PgPool) -> Result<Vec<N8nWorkflow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM n8n_workflows ORDER BY name ASC");
        sqlx::query_as::<_, N8nWorkflow>(&query).fetch_all(pool).await
    }

    /// Delete an external workflow and all of its bindings.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM n8n_workflows WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Bind an external workflow to a workflow event. Idempotent.
    pub async fn connect_workflow(
        pool: &PgPool,
        workflow_id: DbId,
        n8n_workflow_id: DbId,
        event: LifecycleEvent,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO workflow_n8n_bindings (workflow_id, n8n_workflow_id, event)
             VALUES ($1, $2, $3)
             ON CONFLICT DO NOTHING",
        )
        .bind(workflow_id)
        .bind(n8n_workflow_id)
        .bind(event.as_str())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Remove a workflow event binding. Returns `true` if it existed.
    pub async fn disconnect_workflow(
        pool: &PgPool,
        workflow_id: DbId,
        n8n_workflow_id: DbId,
        event: LifecycleEvent,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM workflow_n8n_bindings
             WHERE workflow_id = $1 AND n8n_workflow_id = $2 AND event = $3",
        )
        .bind(workflow_id)
        .bind(n8n_workflow_id)
        .bind(event.as_str())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Bind an external workflow to a process event. Idempotent.
    pub async fn connect_process(
        pool: &PgPool,
        process_id: DbId,
        n8n_workflow_id: DbId,
        event: LifecycleEvent,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO process_n8n_bindings (process_id, n8n_workflow_id, event)
             VALUES ($1, $2, $3)
             ON CONFLICT DO NOTHING",
        )
        .bind(process_id)
        .bind(n8n_workflow_id)
        .bind(event.as_str())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Remove a process event binding. Returns `true` if it existed.
    pub async fn disconnect_process(
        pool: &PgPool,
        process_id: DbId,
        n8n_workflow_id: DbId,
        event: LifecycleEvent,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM process_n8n_bindings
             WHERE process_id = $1 AND n8n_workflow_id = $2 AND event = $3",
        )
        .bind(process_id)
        .bind(n8n_workflow_id)
        .bind(event.as_str())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// All bindings of a workflow.
    pub async fn bindings_for_workflow(
        pool: &PgPool,
        workflow_id: DbId,
    ) -> Result<Vec<N8nBinding>, sqlx::Error> {
        sqlx::query_as::<_, N8nBinding>(
            "SELECT n.id AS n8n_workflow_id, n.workflow_id, n.name, b.event
             FROM workflow_n8n_bindings b
             JOIN n8n_workflows n ON n.id = b.n8n_workflow_id
             WHERE b.workflow_id = $1
             ORDER BY b.event, n.id",
        )
        .bind(workflow_id)
        .fetch_all(pool)
        .await
    }

    /// All bindings of a process.
    pub async fn bindings_for_process(
        pool: &PgPool,
        process_id: DbId,
    ) -> Result<Vec<N8nBinding>, sqlx::Error> {
        sqlx::query_as::<_, N8nBinding>(
            "SELECT n.id AS n8n_workflow_id, n.workflow_id, n.name, b.event
             FROM process_n8n_bindings b
             JOIN n8n_workflows n ON n.id = b.n8n_workflow_id
             WHERE b.process_id = $1
             ORDER BY b.event, n.id",
        )
        .bind(process_id)
        .fetch_all(pool)
        .await
    }
}
