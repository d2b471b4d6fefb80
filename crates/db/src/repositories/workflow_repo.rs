//! Repository for the `workflows` table.

use portal_core::rules::DENY_ALL;
use portal_core::types::DbId;
use sqlx::{PgExecutor, PgPool};

use crate::models::workflow::{CreateWorkflow, UpdateWorkflow, Workflow};

/// Column list for workflows queries.
const COLUMNS: &str = "id, name, description, is_active, is_public, responsible_team_id, \
    edit_workflow_permissions, submit_process_permissions, information, \
    initialize_process_id, created_at, updated_at";

/// Provides CRUD operations for workflows.
pub struct WorkflowRepo;

impl WorkflowRepo {
    /// Insert a new workflow. Rule fields default to deny.
    pub async fn create(pool: &PgPool, input: &CreateWorkflow) -> Result<Workflow, sqlx::Error> {
        let query = format!(
            "INSERT INTO workflows
                (name, description, is_active, is_public, responsible_team_id,
                 edit_workflow_permissions, submit_process_permissions, information)
             VALUES ($1, $2, COALESCE($3, TRUE), COALESCE($4, FALSE), $5, $6, $7,
                     COALESCE($8, '[]'::jsonb))
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Workflow>(&query)
            .bind(&input.name)
            .bind(&input.description)
            .bind(input.is_active)
            .bind(input.is_public)
            .bind(input.responsible_team_id)
            .bind(input.edit_workflow_permissions.as_deref().unwrap_or(DENY_ALL))
            .bind(input.submit_process_permissions.as_deref().unwrap_or(DENY_ALL))
            .bind(&input.information)
            .fetch_one(pool)
            .await
    }

    /// Find a workflow by ID.
    pub async fn find_by_id<'e>(
        executor: impl PgExecutor<'e>,
        id: DbId,
    ) -> Result<Option<Workflow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM workflows WHERE id = $1");
        sqlx::query_as::<_, Workflow>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// List all workflows ordered by name.
    pub async fn list(pool: &PgPool) -> Result<Vec<Workflow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM workflows ORDER BY name ASC, id ASC");
        sqlx::query_as::<_, Workflow>(&query).fetch_all(pool).await
    }

    /// Update a workflow. Only non-`None` fields are applied.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateWorkflow,
    ) -> Result<Option<Workflow>, sqlx::Error> {
        let query = format!(
            "UPDATE workflows SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                is_active = COALESCE($4, is_active),
                is_public = COALESCE($5, is_public),
                responsible_team_id = COALESCE($6, responsible_team_id),
                edit_workflow_permissions = COALESCE($7, edit_workflow_permissions),
                submit_process_permissions = COALESCE($8, submit_process_permissions),
                information = COALESCE($9, information),
                initialize_process_id = COALESCE($10, initialize_process_id)
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Workflow>(&query)
            .bind(id)
            .bind(&input.name)
            .bind(&input.description)
            .bind(input.is_active)
            .bind(input.is_public)
            .bind(input.responsible_team_id)
            .bind(&input.edit_workflow_permissions)
            .bind(&input.submit_process_permissions)
            .bind(&input.information)
            .bind(input.initialize_process_id)
            .fetch_optional(pool)
            .await
    }

    /// Delete a workflow with all processes and runs. Returns `true` if a row
    /// was removed.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM workflows WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
