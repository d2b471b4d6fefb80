//! Repository for the `processes` and `process_dependencies` tables.

use portal_core::rules::DENY_ALL;
use portal_core::types::DbId;
use sqlx::{PgExecutor, PgPool};

use crate::models::process::{CreateProcess, Process, UpdateProcess};

/// Column list for processes queries.
const COLUMNS: &str = "id, workflow_id, name, description, is_category, parent_id, \
    sort_order, schema, theme, responsible_team_id, edit_process_permissions, \
    submit_process_permissions, view_process_permissions, reset_process_permissions, \
    deleted_at, created_at, updated_at";

/// Provides CRUD operations for processes. Deleted processes are hidden from
/// every read.
pub struct ProcessRepo;

impl ProcessRepo {
    /// Insert a new process into a workflow. Rule fields default to deny.
    pub async fn create(
        pool: &PgPool,
        workflow_id: DbId,
        input: &CreateProcess,
    ) -> Result<Process, sqlx::Error> {
        let query = format!(
            "INSERT INTO processes
                (workflow_id, name, description, is_category, parent_id, sort_order,
                 schema, theme, responsible_team_id, edit_process_permissions,
                 submit_process_permissions, view_process_permissions,
                 reset_process_permissions)
             VALUES ($1, $2, $3, COALESCE($4, FALSE), $5, COALESCE($6, 0),
                     $7, $8, $9, $10, $11, $12, $13)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Process>(&query)
            .bind(workflow_id)
            .bind(&input.name)
            .bind(&input.description)
            .bind(input.is_category)
            .bind(input.parent_id)
            .bind(input.sort_order)
            .bind(&input.schema)
            .bind(&input.theme)
            .bind(input.responsible_team_id)
            .bind(input.edit_process_permissions.as_deref().unwrap_or(DENY_ALL))
            .bind(input.submit_process_permissions.as_deref().unwrap_or(DENY_ALL))
            .bind(input.view_process_permissions.as_deref().unwrap_or(DENY_ALL))
            .bind(input.reset_process_permissions.as_deref().unwrap_or(DENY_ALL))
            .fetch_one(pool)
            .await
    }

    /// Find a live process by ID.
    pub async fn find_by_id<'e>(
        executor: impl PgExecutor<'e>,
        id: DbId,
    ) -> Result<Option<Process>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM processes WHERE id = $1 AND deleted_at IS NULL");
        sqlx::query_as::<_, Process>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// List the live processes of a workflow in display order.
    pub async fn list_for_workflow(
        pool: &PgPool,
        workflow_id: DbId,
    ) -> Result<Vec<Process>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM processes
             WHERE workflow_id = $1 AND deleted_at IS NULL
             ORDER BY sort_order ASC, id ASC"
        );
        sqlx::query_as::<_, Process>(&query)
            .bind(workflow_id)
            .fetch_all(pool)
            .await
    }

    /// Update a process. Only non-`None` fields are applied.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateProcess,
    ) -> Result<Option<Process>, sqlx::Error> {
        let query = format!(
            "UPDATE processes SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                is_category = COALESCE($4, is_category),
                parent_id = COALESCE($5, parent_id),
                sort_order = COALESCE($6, sort_order),
                schema = COALESCE($7, schema),
                theme = COALESCE($8, theme),
                responsible_team_id = COALESCE($9, responsible_team_id),
                edit_process_permissions = COALESCE($10, edit_process_permissions),
                submit_process_permissions = COALESCE($11, submit_process_permissions),
                view_process_permissions = COALESCE($12, view_process_permissions),
                reset_process_permissions = COALESCE($13, reset_process_permissions)
             WHERE id = $1 AND deleted_at IS NULL
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Process>(&query)
            .bind(id)
            .bind(&input.name)
            .bind(&input.description)
            .bind(input.is_category)
            .bind(input.parent_id)
            .bind(input.sort_order)
            .bind(&input.schema)
            .bind(&input.theme)
            .bind(input.responsible_team_id)
            .bind(&input.edit_process_permissions)
            .bind(&input.submit_process_permissions)
            .bind(&input.view_process_permissions)
            .bind(&input.reset_process_permissions)
            .fetch_optional(pool)
            .await
    }

    /// Soft-delete a process. Existing process runs are kept. Returns `true`
    /// if a row was marked deleted.
    pub async fn soft_delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE processes SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Replace the dependencies of a process. Ids that are not live,
    /// non-category processes of the same workflow are ignored. Returns the
    /// stored dependency ids.
    pub async fn set_dependencies(
        pool: &PgPool,
        process_id: DbId,
        depends_on: &[DbId],
    ) -> Result<Vec<DbId>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM process_dependencies WHERE process_id = $1")
            .bind(process_id)
            .execute(&mut *tx)
            .await?;

        let stored = sqlx::query_scalar::<_, DbId>(
            "INSERT INTO process_dependencies (process_id, depends_on_id)
             SELECT $1, d.id
             FROM processes p
             JOIN processes d ON d.workflow_id = p.workflow_id
             WHERE p.id = $1
               AND d.id = ANY($2::BIGINT[])
               AND d.id <> $1
               AND d.deleted_at IS NULL
               AND d.is_category = FALSE
             RETURNING depends_on_id",
        )
        .bind(process_id)
        .bind(depends_on)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(stored)
    }

    /// Stored `(process_id, depends_on_id)` pairs between live processes of
    /// a workflow.
    pub async fn dependency_edges(
        pool: &PgPool,
        workflow_id: DbId,
    ) -> Result<Vec<(DbId, DbId)>, sqlx::Error> {
        sqlx::query_as::<_, (DbId, DbId)>(
            "SELECT d.process_id, d.depends_on_id
             FROM process_dependencies d
             JOIN processes p ON p.id = d.process_id
             JOIN processes dp ON dp.id = d.depends_on_id
             WHERE p.workflow_id = $1
               AND p.deleted_at IS NULL
               AND dp.deleted_at IS NULL",
        )
        .bind(workflow_id)
        .fetch_all(pool)
        .await
    }

    /// Ids of the live processes a process depends on.
    pub async fn dependency_ids(pool: &PgPool, process_id: DbId) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar::<_, DbId>(
            "SELECT d.depends_on_id
             FROM process_dependencies d
             JOIN processes p ON p.id = d.depends_on_id
             WHERE d.process_id = $1 AND p.deleted_at IS NULL
             ORDER BY d.depends_on_id",
        )
        .bind(process_id)
        .fetch_all(pool)
        .await
    }
}
