//! Repository for the `forms` table.

use portal_core::rules::DENY_ALL;
use portal_core::types::DbId;
use sqlx::PgPool;

use crate::models::form::{CreateForm, Form, UpdateForm};

/// Column list for forms queries.
const COLUMNS: &str = "id, title, description, schema, is_public, is_active, \
    responsible_team_id, review_form_permissions, edit_form_permissions, \
    created_at, updated_at";

/// Provides CRUD operations for standalone forms.
pub struct FormRepo;

impl FormRepo {
    /// Insert a new form. Rule fields default to deny.
    pub async fn create(pool: &PgPool, input: &CreateForm) -> Result<Form, sqlx::Error> {
        let query = format!(
            "INSERT INTO forms
                (title, description, schema, is_public, is_active, responsible_team_id,
                 review_form_permissions, edit_form_permissions)
             VALUES ($1, $2, COALESCE($3, '{{}}'::jsonb), COALESCE($4, FALSE),
                     COALESCE($5, TRUE), $6, $7, $8)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Form>(&query)
            .bind(&input.title)
            .bind(&input.description)
            .bind(&input.schema)
            .bind(input.is_public)
            .bind(input.is_active)
            .bind(input.responsible_team_id)
            .bind(input.review_form_permissions.as_deref().unwrap_or(DENY_ALL))
            .bind(input.edit_form_permissions.as_deref().unwrap_or(DENY_ALL))
            .fetch_one(pool)
            .await
    }

    /// Find a form by ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Form>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM forms WHERE id = $1");
        sqlx::query_as::<_, Form>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List all forms ordered by title.
    pub async fn list(pool: &PgPool) -> Result<Vec<Form>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM forms ORDER BY title ASC, id ASC");
        sqlx::query_as::<_, Form>(&query).fetch_all(pool).await
    }

    /// Update a form. Only non-`None` fields are applied.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateForm,
    ) -> Result<Option<Form>, sqlx::Error> {
        let query = format!(
            "UPDATE forms SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                schema = COALESCE($4, schema),
                is_public = COALESCE($5, is_public),
                is_active = COALESCE($6, is_active),
                responsible_team_id = COALESCE($7, responsible_team_id),
                review_form_permissions = COALESCE($8, review_form_permissions),
                edit_form_permissions = COALESCE($9, edit_form_permissions)
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Form>(&query)
            .bind(id)
            .bind(&input.title)
            .bind(&input.description)
            .bind(&input.schema)
            .bind(input.is_public)
            .bind(input.is_active)
            .bind(input.responsible_team_id)
            .bind(&input.review_form_permissions)
            .bind(&input.edit_form_permissions)
            .fetch_optional(pool)
            .await
    }

    /// Delete a form and its submissions. Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM forms WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
