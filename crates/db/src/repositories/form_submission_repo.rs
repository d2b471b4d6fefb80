//! Repository for the `form_submissions` table.
//!
//! Status writes are conditional on the expected current status; a `None`
//! result means the row changed concurrently.

use portal_core::status::FormSubmissionStatus;
use portal_core::types::DbId;
use serde_json::Value;
use sqlx::PgPool;

use crate::models::form_submission::FormSubmission;

/// Column list for form_submissions queries.
const COLUMNS: &str = "id, form_id, status_id, is_archived, data, submitted_by_id, \
    submitted_at, reviewed_at, completed_at, created_at, updated_at";

/// Provides CRUD operations for form submissions.
pub struct FormSubmissionRepo;

impl FormSubmissionRepo {
    /// Start a new submission.
    pub async fn create(
        pool: &PgPool,
        form_id: DbId,
        user_id: DbId,
        data: Option<&Value>,
    ) -> Result<FormSubmission, sqlx::Error> {
        let query = format!(
            "INSERT INTO form_submissions (form_id, status_id, data, submitted_by_id)
             VALUES ($1, $2, COALESCE($3, '{{}}'::jsonb), $4)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, FormSubmission>(&query)
            .bind(form_id)
            .bind(FormSubmissionStatus::Ongoing.id())
            .bind(data)
            .bind(user_id)
            .fetch_one(pool)
            .await
    }

    /// Find a submission by ID.
    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<FormSubmission>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM form_submissions WHERE id = $1");
        sqlx::query_as::<_, FormSubmission>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List the submissions of a form, newest first.
    pub async fn list_for_form(
        pool: &PgPool,
        form_id: DbId,
    ) -> Result<Vec<FormSubmission>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM form_submissions
             WHERE form_id = $1
             ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, FormSubmission>(&query)
            .bind(form_id)
            .fetch_all(pool)
            .await
    }

    /// Move a submission from `from` to `to`, optionally replacing its data.
    pub async fn transition(
        pool: &PgPool,
        id: DbId,
        from: FormSubmissionStatus,
        to: FormSubmissionStatus,
        data: Option<&Value>,
    ) -> Result<Option<FormSubmission>, sqlx::Error> {
        let query = format!(
            "UPDATE form_submissions SET
                status_id = $3,
                data = COALESCE($4, data),
                submitted_at = CASE WHEN $3 = $5 THEN NOW() ELSE submitted_at END,
                reviewed_at = CASE WHEN $3 = $6 THEN NOW() ELSE reviewed_at END,
                completed_at = CASE WHEN $3 = $7 THEN NOW() ELSE completed_at END
             WHERE id = $1 AND status_id = $2 AND is_archived = FALSE
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, FormSubmission>(&query)
            .bind(id)
            .bind(from.id())
            .bind(to.id())
            .bind(data)
            .bind(FormSubmissionStatus::Submitted.id())
            .bind(FormSubmissionStatus::Reviewing.id())
            .bind(FormSubmissionStatus::Completed.id())
            .fetch_optional(pool)
            .await
    }

    /// Flip the archive flag from `!archived` to `archived`.
    pub async fn set_archived(
        pool: &PgPool,
        id: DbId,
        archived: bool,
    ) -> Result<Option<FormSubmission>, sqlx::Error> {
        let query = format!(
            "UPDATE form_submissions SET is_archived = $2
             WHERE id = $1 AND is_archived = NOT $2
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, FormSubmission>(&query)
            .bind(id)
            .bind(archived)
            .fetch_optional(pool)
            .await
    }
}
