use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use crate::database::models::TeamMember;
use crate::error::{AppError, is_unique_violation};

/// The capacity-bounded set of (team, user) pairs.
#[derive(Clone)]
pub struct MembershipLedger {
    pool: SqlitePool,
}

impl MembershipLedger {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Current roster size.
    pub async fn count(&self, team_id: Uuid) -> Result<i64, AppError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM team_members WHERE team_id = ?")
                .bind(team_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    pub async fn is_member(&self, team_id: Uuid, user_id: Uuid) -> Result<bool, AppError> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM team_members WHERE team_id = ? AND user_id = ?")
                .bind(team_id)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.is_some())
    }

    pub async fn members_of(&self, team_id: Uuid) -> Result<Vec<TeamMember>, AppError> {
        let members = sqlx::query_as::<_, TeamMember>(
            r#"
            SELECT
                id,
                team_id,
                user_id,
                joined_at
            FROM
                team_members
            WHERE
                team_id = ?
            ORDER BY
                joined_at
            "#,
        )
        .bind(team_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(members)
    }

    /// Admit a user into the roster, enforcing the duplicate-membership and
    /// capacity invariants in a single conditional insert: the row lands
    /// only if the user is not already on the roster and a slot is open at
    /// the moment of the write.
    pub async fn admit(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        team_id: Uuid,
        user_id: Uuid,
        capacity: i64,
    ) -> Result<TeamMember, AppError> {
        let now = Utc::now();

        let inserted = sqlx::query_as::<_, TeamMember>(
            r#"
            INSERT INTO
                team_members (id, team_id, user_id, joined_at)
            SELECT
                ?, ?, ?, ?
            WHERE
                NOT EXISTS (
                    SELECT 1 FROM team_members WHERE team_id = ? AND user_id = ?
                )
                AND (SELECT COUNT(*) FROM team_members WHERE team_id = ?) < ?
            RETURNING
                id,
                team_id,
                user_id,
                joined_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(team_id)
        .bind(user_id)
        .bind(now)
        .bind(team_id)
        .bind(user_id)
        .bind(team_id)
        .bind(capacity)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::AlreadyMember
            } else {
                AppError::from(e)
            }
        })?;

        match inserted {
            Some(member) => Ok(member),
            None => {
                // diagnose which guard rejected the insert
                let member: Option<(i64,)> = sqlx::query_as(
                    "SELECT 1 FROM team_members WHERE team_id = ? AND user_id = ?",
                )
                .bind(team_id)
                .bind(user_id)
                .fetch_optional(&mut **tx)
                .await?;

                if member.is_some() {
                    Err(AppError::AlreadyMember)
                } else {
                    Err(AppError::TeamFull)
                }
            }
        }
    }

    /// Captain-initiated removal of another member.
    pub async fn remove(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        team_id: Uuid,
        user_id: Uuid,
        caller_id: Uuid,
    ) -> Result<(), AppError> {
        let captain_id = self.captain_of(tx, team_id).await?;

        if caller_id != captain_id {
            return Err(AppError::NotCaptain);
        }
        if user_id == captain_id {
            return Err(AppError::CaptainCannotBeRemoved);
        }

        self.delete_membership(tx, team_id, user_id).await
    }

    /// Voluntary departure of a non-captain member.
    pub async fn leave(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        team_id: Uuid,
        user_id: Uuid,
    ) -> Result<(), AppError> {
        let captain_id = self.captain_of(tx, team_id).await?;

        if user_id == captain_id {
            return Err(AppError::CaptainMustTransferOrDisband);
        }

        self.delete_membership(tx, team_id, user_id).await
    }

    async fn captain_of(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        team_id: Uuid,
    ) -> Result<Uuid, AppError> {
        let row: Option<(Uuid,)> = sqlx::query_as("SELECT captain_id FROM teams WHERE id = ?")
            .bind(team_id)
            .fetch_optional(&mut **tx)
            .await?;

        row.map(|(captain_id,)| captain_id)
            .ok_or_else(|| AppError::NotFound("Team".to_string()))
    }

    async fn delete_membership(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        team_id: Uuid,
        user_id: Uuid,
    ) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM team_members WHERE team_id = ? AND user_id = ?")
            .bind(team_id)
            .bind(user_id)
            .execute(&mut **tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(
                "User is not a member of this team".to_string(),
            ));
        }

        Ok(())
    }
}
