//! Repository for `teams`, `team_members` and the per-entity team
//! assignment tables.

use portal_core::permissions::EntityScope;
use portal_core::types::DbId;
use sqlx::{Acquire, PgConnection, PgPool, Postgres};

use crate::models::team::{CreateTeam, Team, TeamMember};

/// Column list for teams queries.
const COLUMNS: &str = "id, name, contact_email, created_at, updated_at";

/// Entities that carry a responsible team plus assigned teams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeOwner {
    Workflow,
    Process,
    Form,
}

impl ScopeOwner {
    fn table(self) -> &'static str {
        match self {
            ScopeOwner::Workflow => "workflows",
            ScopeOwner::Process => "processes",
            ScopeOwner::Form => "forms",
        }
    }

    fn junction(self) -> (&'static str, &'static str) {
        match self {
            ScopeOwner::Workflow => ("workflow_teams", "workflow_id"),
            ScopeOwner::Process => ("process_teams", "process_id"),
            ScopeOwner::Form => ("form_teams", "form_id"),
        }
    }
}

/// Provides CRUD operations for teams and their memberships.
pub struct TeamRepo;

impl TeamRepo {
    /// Insert a new team, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateTeam) -> Result<Team, sqlx::Error> {
        let query = format!(
            "INSERT INTO teams (name, contact_email) VALUES ($1, $2) RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Team>(&query)
            .bind(&input.name)
            .bind(&input.contact_email)
            .fetch_one(pool)
            .await
    }

    /// Find a team by ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Team>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM teams WHERE id = $1");
        sqlx::query_as::<_, Team>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List all teams ordered by name.
    pub async fn list(pool: &PgPool) -> Result<Vec<Team>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM teams ORDER BY name ASC");
        sqlx::query_as::<_, Team>(&query).fetch_all(pool).await
    }

    /// Delete a team. Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM teams WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Add a user to a team. Adding an existing member is a no-op.
    pub async fn add_member(pool: &PgPool, team_id: DbId, user_id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO team_members (team_id, user_id) VALUES ($1, $2)
             ON CONFLICT DO NOTHING",
        )
        .bind(team_id)
        .bind(user_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Remove a user from a team. Returns `true` if a membership was removed.
    pub async fn remove_member(
        pool: &PgPool,
        team_id: DbId,
        user_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM team_members WHERE team_id = $1 AND user_id = $2")
            .bind(team_id)
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// List the members of a team.
    pub async fn list_members(pool: &PgPool, team_id: DbId) -> Result<Vec<TeamMember>, sqlx::Error> {
        sqlx::query_as::<_, TeamMember>(
            "SELECT u.id AS user_id, u.name, u.email
             FROM team_members tm
             JOIN users u ON u.id = tm.user_id
             WHERE tm.team_id = $1
             ORDER BY u.name ASC",
        )
        .bind(team_id)
        .fetch_all(pool)
        .await
    }

    /// Names of the teams a user belongs to, as used in permission contexts.
    pub async fn names_for_user(pool: &PgPool, user_id: DbId) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            "SELECT t.name
             FROM team_members tm
             JOIN teams t ON t.id = tm.team_id
             WHERE tm.user_id = $1
             ORDER BY t.name ASC",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    /// Load the responsible team name and assigned team names of an entity.
    pub async fn scope<'a, A>(
        conn: A,
        owner: ScopeOwner,
        id: DbId,
    ) -> Result<EntityScope, sqlx::Error>
    where
        A: Acquire<'a, Database = Postgres>,
    {
        let mut conn = conn.acquire().await?;
        Self::scope_on(&mut conn, owner, id).await
    }

    /// [`Self::scope`] on an already-acquired connection. Non-generic so it
    /// can be nested inside other generic `Acquire` fns without tripping
    /// rustc's "Acquire is not general enough" error on `Send` futures.
    pub async fn scope_on(
        conn: &mut PgConnection,
        owner: ScopeOwner,
        id: DbId,
    ) -> Result<EntityScope, sqlx::Error> {
        let table = owner.table();
        let responsible_query = format!(
            "SELECT t.name FROM {table} e
             JOIN teams t ON t.id = e.responsible_team_id
             WHERE e.id = $1"
        );
        let responsible_team = sqlx::query_scalar::<_, String>(&responsible_query)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        let (junction, fk) = owner.junction();
        let teams_query = format!(
            "SELECT t.name FROM {junction} j
             JOIN teams t ON t.id = j.team_id
             WHERE j.{fk} = $1
             ORDER BY t.name ASC"
        );
        let teams = sqlx::query_scalar::<_, String>(&teams_query)
            .bind(id)
            .fetch_all(&mut *conn)
            .await?;

        Ok(EntityScope::new(responsible_team, teams))
    }

    /// Replace the assigned teams of an entity.
    pub async fn set_assigned(
        pool: &PgPool,
        owner: ScopeOwner,
        id: DbId,
        team_ids: &[DbId],
    ) -> Result<(), sqlx::Error> {
        let (junction, fk) = owner.junction();
        let mut tx = pool.begin().await?;

        let delete = format!("DELETE FROM {junction} WHERE {fk} = $1");
        sqlx::query(&delete).bind(id).execute(&mut *tx).await?;

        let insert = format!(
            "INSERT INTO {junction} ({fk}, team_id)
             SELECT $1, UNNEST($2::BIGINT[])
             ON CONFLICT DO NOTHING"
        );
        sqlx::query(&insert)
            .bind(id)
            .bind(team_ids)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
