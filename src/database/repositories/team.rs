use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use crate::database::models::{CreateTeamInput, Team, UpdateTeamInput};
use crate::error::{AppError, is_unique_violation};

const NAME_MIN_LEN: usize = 3;
const NAME_MAX_LEN: usize = 25;
const TAG_MIN_LEN: usize = 3;
const TAG_MAX_LEN: usize = 5;

/// Owns team identity: name/tag uniqueness and the captain pointer.
#[derive(Clone)]
pub struct TeamRegistry {
    pool: SqlitePool,
}

impl TeamRegistry {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new team. The caller is responsible for admitting the
    /// captain into the roster within the same transaction.
    pub async fn create_team(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        input: &CreateTeamInput,
        captain_id: Uuid,
    ) -> Result<Team, AppError> {
        let name = input.name.trim().to_string();
        let tag = normalize_tag(&input.tag);
        validate_name(&name)?;
        validate_tag(&tag)?;

        self.check_name_free(tx, &name, None).await?;
        self.check_tag_free(tx, &tag, None).await?;

        let now = Utc::now();
        let team = sqlx::query_as::<_, Team>(
            r#"
            INSERT INTO
                teams (
                    id,
                    name,
                    tag,
                    description,
                    logo_url,
                    captain_id,
                    created_at
                )
            VALUES
                (?, ?, ?, ?, NULL, ?, ?)
            RETURNING
                id,
                name,
                tag,
                description,
                logo_url,
                captain_id,
                created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&name)
        .bind(&tag)
        .bind(&input.description)
        .bind(captain_id)
        .bind(now)
        .fetch_one(&mut **tx)
        .await
        .map_err(map_team_unique_violation)?;

        Ok(team)
    }

    /// Apply the provided fields only; absent fields are left untouched.
    pub async fn update_team(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        team_id: Uuid,
        caller_id: Uuid,
        input: &UpdateTeamInput,
    ) -> Result<Team, AppError> {
        let team = self
            .find_by_id_tx(tx, team_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Team".to_string()))?;

        if team.captain_id != caller_id {
            return Err(AppError::NotCaptain);
        }

        let name = match &input.name {
            Some(raw) => {
                let name = raw.trim().to_string();
                validate_name(&name)?;
                if name != team.name {
                    self.check_name_free(tx, &name, Some(team_id)).await?;
                }
                Some(name)
            }
            None => None,
        };

        let tag = match &input.tag {
            Some(raw) => {
                let tag = normalize_tag(raw);
                validate_tag(&tag)?;
                if tag != team.tag {
                    self.check_tag_free(tx, &tag, Some(team_id)).await?;
                }
                Some(tag)
            }
            None => None,
        };

        let team = sqlx::query_as::<_, Team>(
            r#"
            UPDATE
                teams
            SET
                name = COALESCE(?, name),
                tag = COALESCE(?, tag),
                description = COALESCE(?, description),
                logo_url = COALESCE(?, logo_url)
            WHERE
                id = ?
            RETURNING
                id,
                name,
                tag,
                description,
                logo_url,
                captain_id,
                created_at
            "#,
        )
        .bind(name)
        .bind(tag)
        .bind(&input.description)
        .bind(&input.logo_url)
        .bind(team_id)
        .fetch_one(&mut **tx)
        .await
        .map_err(map_team_unique_violation)?;

        Ok(team)
    }

    /// Delete the team; memberships and invitations cascade with the row.
    pub async fn delete_team(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        team_id: Uuid,
        caller_id: Uuid,
    ) -> Result<(), AppError> {
        let team = self
            .find_by_id_tx(tx, team_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Team".to_string()))?;

        if team.captain_id != caller_id {
            return Err(AppError::NotCaptain);
        }

        sqlx::query("DELETE FROM teams WHERE id = ?")
            .bind(team_id)
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    pub async fn find_by_id(&self, team_id: Uuid) -> Result<Option<Team>, AppError> {
        let team = sqlx::query_as::<_, Team>(
            r#"
            SELECT
                id,
                name,
                tag,
                description,
                logo_url,
                captain_id,
                created_at
            FROM
                teams
            WHERE
                id = ?
            "#,
        )
        .bind(team_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(team)
    }

    pub async fn find_by_id_tx(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        team_id: Uuid,
    ) -> Result<Option<Team>, AppError> {
        let team = sqlx::query_as::<_, Team>(
            r#"
            SELECT
                id,
                name,
                tag,
                description,
                logo_url,
                captain_id,
                created_at
            FROM
                teams
            WHERE
                id = ?
            "#,
        )
        .bind(team_id)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(team)
    }

    /// All teams the user currently holds a membership in.
    pub async fn teams_for_user(&self, user_id: Uuid) -> Result<Vec<Team>, AppError> {
        let teams = sqlx::query_as::<_, Team>(
            r#"
            SELECT
                t.id,
                t.name,
                t.tag,
                t.description,
                t.logo_url,
                t.captain_id,
                t.created_at
            FROM
                teams t
                INNER JOIN team_members tm ON t.id = tm.team_id
            WHERE
                tm.user_id = ?
            ORDER BY
                t.name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(teams)
    }

    async fn check_name_free(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        name: &str,
        exclude: Option<Uuid>,
    ) -> Result<(), AppError> {
        let clash: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM teams WHERE name = ? AND id IS NOT ?")
                .bind(name)
                .bind(exclude)
                .fetch_optional(&mut **tx)
                .await?;

        if clash.is_some() {
            return Err(AppError::NameTaken);
        }
        Ok(())
    }

    async fn check_tag_free(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        tag: &str,
        exclude: Option<Uuid>,
    ) -> Result<(), AppError> {
        let clash: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM teams WHERE tag = ? AND id IS NOT ?")
                .bind(tag)
                .bind(exclude)
                .fetch_optional(&mut **tx)
                .await?;

        if clash.is_some() {
            return Err(AppError::TagTaken);
        }
        Ok(())
    }
}

/// Tags compare case-insensitively; normalizing at the write boundary lets
/// the plain unique index enforce that.
fn normalize_tag(tag: &str) -> String {
    tag.trim().to_uppercase()
}

fn validate_name(name: &str) -> Result<(), AppError> {
    let len = name.chars().count();
    if !(NAME_MIN_LEN..=NAME_MAX_LEN).contains(&len) {
        return Err(AppError::Validation(format!(
            "team name must be {}-{} characters",
            NAME_MIN_LEN, NAME_MAX_LEN
        )));
    }
    Ok(())
}

fn validate_tag(tag: &str) -> Result<(), AppError> {
    let len = tag.chars().count();
    if !(TAG_MIN_LEN..=TAG_MAX_LEN).contains(&len) {
        return Err(AppError::Validation(format!(
            "team tag must be {}-{} characters",
            TAG_MIN_LEN, TAG_MAX_LEN
        )));
    }
    Ok(())
}

/// Backstop for inserts racing past the in-transaction uniqueness checks.
fn map_team_unique_violation(error: sqlx::Error) -> AppError {
    if is_unique_violation(&error) {
        let message = match &error {
            sqlx::Error::Database(db) => db.message().to_string(),
            _ => String::new(),
        };
        if message.contains("teams.tag") {
            return AppError::TagTaken;
        }
        return AppError::NameTaken;
    }
    AppError::from(error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_is_normalized_to_upper_case() {
        assert_eq!(normalize_tag(" alp "), "ALP");
        assert_eq!(normalize_tag("T1a"), "T1A");
    }

    #[test]
    fn name_length_bounds() {
        assert!(validate_name("abc").is_ok());
        assert!(validate_name("ab").is_err());
        assert!(validate_name(&"x".repeat(26)).is_err());
    }

    #[test]
    fn tag_length_bounds() {
        assert!(validate_tag("ALP").is_ok());
        assert!(validate_tag("ALPHA").is_ok());
        assert!(validate_tag("AL").is_err());
        assert!(validate_tag("ALPHAS").is_err());
    }
}
