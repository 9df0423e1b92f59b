use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::Config;
use crate::database::DatabaseTransaction;
use crate::database::models::{CreateNotificationInput, TEAM_INVITE, TeamInvitation, TeamMember};
use crate::database::repositories::{
    InvitationAuthority, MembershipLedger, NotificationRelay, TeamRegistry,
};
use crate::error::AppError;

/// Coordinates the invitation lifecycle: issuance by the captain, and the
/// atomic acceptance path that joins token consumption to the roster
/// admit. Notification cleanup stays outside the transaction and never
/// gates the outcome.
#[derive(Clone)]
pub struct InvitationService {
    authority: InvitationAuthority,
    ledger: MembershipLedger,
    registry: TeamRegistry,
    relay: NotificationRelay,
    tx: DatabaseTransaction,
    config: Config,
}

impl InvitationService {
    pub fn new(
        authority: InvitationAuthority,
        ledger: MembershipLedger,
        registry: TeamRegistry,
        relay: NotificationRelay,
        tx: DatabaseTransaction,
        config: Config,
    ) -> Self {
        Self {
            authority,
            ledger,
            registry,
            relay,
            tx,
            config,
        }
    }

    /// Mint an open invite link for the team. Captain only; the captaincy
    /// is re-checked against the stored team, never taken from the caller.
    pub async fn issue_link(
        &self,
        team_id: Uuid,
        caller_id: Uuid,
    ) -> Result<TeamInvitation, AppError> {
        let ttl = self.config.link_ttl();
        let registry = self.registry.clone();
        let authority = self.authority.clone();

        self.tx
            .run(move |tx| {
                Box::pin(async move {
                    let team = registry
                        .find_by_id_tx(tx, team_id)
                        .await?
                        .ok_or_else(|| AppError::NotFound("Team".to_string()))?;

                    if team.captain_id != caller_id {
                        return Err(AppError::NotCaptain);
                    }

                    authority.issue_link(tx, team_id, caller_id, ttl).await
                })
            })
            .await
    }

    /// Nominate a specific user. The invitation and the nominee's
    /// notification are created in the same transaction.
    pub async fn issue_nomination(
        &self,
        team_id: Uuid,
        caller_id: Uuid,
        invitee_id: Uuid,
    ) -> Result<TeamInvitation, AppError> {
        let ttl = self.config.nomination_ttl();
        let registry = self.registry.clone();
        let authority = self.authority.clone();
        let relay = self.relay.clone();

        self.tx
            .run(move |tx| {
                Box::pin(async move {
                    let team = registry
                        .find_by_id_tx(tx, team_id)
                        .await?
                        .ok_or_else(|| AppError::NotFound("Team".to_string()))?;

                    if team.captain_id != caller_id {
                        return Err(AppError::NotCaptain);
                    }

                    let invitation = authority
                        .issue_nomination(tx, team_id, caller_id, invitee_id, ttl)
                        .await?;

                    let notification = CreateNotificationInput {
                        user_id: invitee_id,
                        notification_type: TEAM_INVITE.to_string(),
                        title: "Team invitation".to_string(),
                        message: format!("You have been invited to join team {}", team.name),
                        token: Some(invitation.token.clone()),
                        team_id: Some(team.id),
                        data: None,
                    };
                    relay.create(tx, &notification).await?;

                    Ok(invitation)
                })
            })
            .await
    }

    /// Accept an invitation. Validation, the capacity-checked admit and the
    /// exactly-once token consumption commit or roll back as one unit; only
    /// then is the nominee's notification cleared, best-effort.
    pub async fn accept(
        &self,
        token: &str,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<TeamMember, AppError> {
        let capacity = self.config.roster_capacity;
        let authority = self.authority.clone();
        let ledger = self.ledger.clone();
        let presented = token.to_string();

        let result = self
            .tx
            .run(move |tx| {
                Box::pin(async move {
                    let invitation = authority.validate(tx, &presented, now).await?;

                    if let Some(invitee_id) = invitation.invitee_id {
                        if invitee_id != user_id {
                            return Err(AppError::NotYourInvitation);
                        }
                    }

                    let member = ledger
                        .admit(tx, invitation.team_id, user_id, capacity)
                        .await?;

                    // losing a race on the token aborts the whole attempt,
                    // rolling the admit back
                    authority.mark_accepted(tx, invitation.id, user_id).await?;

                    Ok(member)
                })
            })
            .await;

        match result {
            Ok(member) => {
                if let Err(err) = self
                    .relay
                    .delete_by_correlation(user_id, TEAM_INVITE, token)
                    .await
                {
                    log::warn!(
                        "Failed to delete invitation notification for user {}: {}",
                        user_id,
                        err
                    );
                }
                Ok(member)
            }
            Err(AppError::Expired) => {
                self.lazily_expire(token).await;
                Err(AppError::Expired)
            }
            Err(err) => Err(err),
        }
    }

    /// A nominated invitee turns the invitation down: Pending -> Rejected,
    /// exactly once. Open links carry no addressee and cannot be declined.
    pub async fn decline(
        &self,
        token: &str,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let authority = self.authority.clone();
        let presented = token.to_string();

        let result = self
            .tx
            .run(move |tx| {
                Box::pin(async move {
                    let invitation = authority.validate(tx, &presented, now).await?;

                    match invitation.invitee_id {
                        Some(invitee_id) if invitee_id == user_id => {}
                        _ => return Err(AppError::NotYourInvitation),
                    }

                    authority.mark_rejected(tx, invitation.id).await
                })
            })
            .await;

        match result {
            Ok(()) => {
                if let Err(err) = self
                    .relay
                    .delete_by_correlation(user_id, TEAM_INVITE, token)
                    .await
                {
                    log::warn!(
                        "Failed to delete invitation notification for user {}: {}",
                        user_id,
                        err
                    );
                }
                Ok(())
            }
            Err(AppError::Expired) => {
                self.lazily_expire(token).await;
                Err(AppError::Expired)
            }
            Err(err) => Err(err),
        }
    }

    /// Audit read used by callers that render invitation state.
    pub async fn find_by_token(&self, token: &str) -> Result<Option<TeamInvitation>, AppError> {
        self.authority.find_by_token(token).await
    }

    /// The validation transaction rolls back on expiry, so the stored
    /// status is flipped afterwards on the pool. Purely cosmetic for
    /// audit: a stale Pending record is inert either way.
    async fn lazily_expire(&self, token: &str) {
        if let Err(err) = self.authority.mark_expired(token).await {
            log::warn!("Failed to mark invitation expired: {}", err);
        }
    }
}
