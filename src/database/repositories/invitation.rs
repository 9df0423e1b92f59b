use chrono::{DateTime, Duration, Utc};
use futures_util::TryFutureExt;
use sqlx::{Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use crate::database::models::{InvitationStatus, TeamInvitation};
use crate::error::AppError;

/// Generate a cryptographically secure random token
fn generate_token() -> String {
    use rand::Rng;
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ\
                                abcdefghijklmnopqrstuvwxyz\
                                0123456789";
    const TOKEN_LEN: usize = 32;
    let mut rng = rand::rng();

    (0..TOKEN_LEN)
        .map(|_| {
            let idx = rng.random_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}

/// Issues, validates and exactly-once-consumes invitation tokens.
#[derive(Clone)]
pub struct InvitationAuthority {
    pool: SqlitePool,
}

impl InvitationAuthority {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Mint an open link: anyone holding the token may join while a slot
    /// is open.
    pub async fn issue_link(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        team_id: Uuid,
        inviter_id: Uuid,
        ttl: Duration,
    ) -> Result<TeamInvitation, AppError> {
        self.insert_invitation(tx, team_id, inviter_id, None, ttl)
            .await
    }

    /// Mint a nomination bound to a specific invitee.
    pub async fn issue_nomination(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        team_id: Uuid,
        inviter_id: Uuid,
        invitee_id: Uuid,
        ttl: Duration,
    ) -> Result<TeamInvitation, AppError> {
        // advisory early rejection; the authoritative membership check runs
        // again inside the acceptance transaction
        let member: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM team_members WHERE team_id = ? AND user_id = ?")
                .bind(team_id)
                .bind(invitee_id)
                .fetch_optional(&mut **tx)
                .await?;

        if member.is_some() {
            return Err(AppError::AlreadyMember);
        }

        self.insert_invitation(tx, team_id, inviter_id, Some(invitee_id), ttl)
            .await
    }

    /// Look up the Pending invitation owning this token and check its
    /// clock. Does not transition state; consumption happens in
    /// `mark_accepted` once the roster admit has succeeded.
    pub async fn validate(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<TeamInvitation, AppError> {
        let invitation = sqlx::query_as::<_, TeamInvitation>(
            r#"
            SELECT
                id,
                team_id,
                inviter_id,
                invitee_id,
                token,
                status,
                created_at,
                expires_at
            FROM
                team_invitations
            WHERE
                token = ?
                AND status = ?
            "#,
        )
        .bind(token)
        .bind(InvitationStatus::Pending)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(AppError::InvalidToken)?;

        // the clock is authoritative even while the stored status still
        // says pending
        if invitation.is_expired(now) {
            return Err(AppError::Expired);
        }

        Ok(invitation)
    }

    /// Consume the token: Pending -> Accepted, binding the invitee if the
    /// invitation was an open link. The status predicate makes the
    /// transition exactly-once; the losing request of a race affects zero
    /// rows.
    pub async fn mark_accepted(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        invitation_id: Uuid,
        accepting_user_id: Uuid,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE
                team_invitations
            SET
                status = ?,
                invitee_id = COALESCE(invitee_id, ?)
            WHERE
                id = ?
                AND status = ?
            "#,
        )
        .bind(InvitationStatus::Accepted)
        .bind(accepting_user_id)
        .bind(invitation_id)
        .bind(InvitationStatus::Pending)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::InvalidToken);
        }

        Ok(())
    }

    /// Pending -> Rejected, same conditional-write shape as acceptance.
    pub async fn mark_rejected(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        invitation_id: Uuid,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE team_invitations SET status = ? WHERE id = ? AND status = ?",
        )
        .bind(InvitationStatus::Rejected)
        .bind(invitation_id)
        .bind(InvitationStatus::Pending)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::InvalidToken);
        }

        Ok(())
    }

    /// Flip a stale Pending record to Expired. Runs on the pool: the
    /// validation that detected expiry rolls its transaction back, so the
    /// sweep has to land outside it.
    pub async fn mark_expired(&self, token: &str) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE team_invitations SET status = ? WHERE token = ? AND status = ?",
        )
        .bind(InvitationStatus::Expired)
        .bind(token)
        .bind(InvitationStatus::Pending)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Audit read: the invitation in whatever state it currently holds.
    pub async fn find_by_token(&self, token: &str) -> Result<Option<TeamInvitation>, AppError> {
        let invitation = sqlx::query_as::<_, TeamInvitation>(
            r#"
            SELECT
                id,
                team_id,
                inviter_id,
                invitee_id,
                token,
                status,
                created_at,
                expires_at
            FROM
                team_invitations
            WHERE
                token = ?
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(invitation)
    }

    async fn insert_invitation(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        team_id: Uuid,
        inviter_id: Uuid,
        invitee_id: Option<Uuid>,
        ttl: Duration,
    ) -> Result<TeamInvitation, AppError> {
        let now = Utc::now();

        let invitation = sqlx::query_as::<_, TeamInvitation>(
            r#"
            INSERT INTO
                team_invitations (
                    id,
                    team_id,
                    inviter_id,
                    invitee_id,
                    token,
                    status,
                    created_at,
                    expires_at
                )
            VALUES
                (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING
                id,
                team_id,
                inviter_id,
                invitee_id,
                token,
                status,
                created_at,
                expires_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(team_id)
        .bind(inviter_id)
        .bind(invitee_id)
        .bind(generate_token())
        .bind(InvitationStatus::Pending)
        .bind(now)
        .bind(now + ttl)
        .fetch_one(&mut **tx)
        .map_err(|e| {
            log::error!("Failed to create invitation: {}", e);
            e
        })
        .await?;

        Ok(invitation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_long_and_charset_bounded() {
        let token = generate_token();
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn tokens_do_not_repeat() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
    }
}
