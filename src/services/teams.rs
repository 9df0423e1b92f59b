use uuid::Uuid;

use crate::config::Config;
use crate::database::DatabaseTransaction;
use crate::database::models::{CreateTeamInput, Team, TeamMember, UpdateTeamInput};
use crate::database::repositories::{MembershipLedger, TeamRegistry};
use crate::error::AppError;

/// Team lifecycle and roster mutations. Every multi-step operation runs as
/// one transaction; partial states (a team without its captain membership)
/// are never observable.
#[derive(Clone)]
pub struct TeamService {
    registry: TeamRegistry,
    ledger: MembershipLedger,
    tx: DatabaseTransaction,
    config: Config,
}

impl TeamService {
    pub fn new(
        registry: TeamRegistry,
        ledger: MembershipLedger,
        tx: DatabaseTransaction,
        config: Config,
    ) -> Self {
        Self {
            registry,
            ledger,
            tx,
            config,
        }
    }

    /// Create the team and admit its creator as captain, atomically.
    pub async fn create_team(
        &self,
        input: CreateTeamInput,
        captain_id: Uuid,
    ) -> Result<Team, AppError> {
        let capacity = self.config.roster_capacity;
        let registry = self.registry.clone();
        let ledger = self.ledger.clone();

        self.tx
            .run(move |tx| {
                Box::pin(async move {
                    let team = registry.create_team(tx, &input, captain_id).await?;
                    ledger.admit(tx, team.id, captain_id, capacity).await?;
                    Ok(team)
                })
            })
            .await
    }

    pub async fn update_team(
        &self,
        team_id: Uuid,
        caller_id: Uuid,
        input: UpdateTeamInput,
    ) -> Result<Team, AppError> {
        let registry = self.registry.clone();

        self.tx
            .run(move |tx| {
                Box::pin(async move { registry.update_team(tx, team_id, caller_id, &input).await })
            })
            .await
    }

    pub async fn delete_team(&self, team_id: Uuid, caller_id: Uuid) -> Result<(), AppError> {
        let registry = self.registry.clone();

        self.tx
            .run(move |tx| {
                Box::pin(async move { registry.delete_team(tx, team_id, caller_id).await })
            })
            .await
    }

    /// Captain expels another member.
    pub async fn remove_member(
        &self,
        team_id: Uuid,
        user_id: Uuid,
        caller_id: Uuid,
    ) -> Result<(), AppError> {
        let ledger = self.ledger.clone();

        self.tx
            .run(move |tx| {
                Box::pin(async move { ledger.remove(tx, team_id, user_id, caller_id).await })
            })
            .await
    }

    /// A non-captain member walks away.
    pub async fn leave_team(&self, team_id: Uuid, user_id: Uuid) -> Result<(), AppError> {
        let ledger = self.ledger.clone();

        self.tx
            .run(move |tx| Box::pin(async move { ledger.leave(tx, team_id, user_id).await }))
            .await
    }

    pub async fn find_team(&self, team_id: Uuid) -> Result<Option<Team>, AppError> {
        self.registry.find_by_id(team_id).await
    }

    pub async fn my_teams(&self, user_id: Uuid) -> Result<Vec<Team>, AppError> {
        self.registry.teams_for_user(user_id).await
    }

    pub async fn roster(&self, team_id: Uuid) -> Result<Vec<TeamMember>, AppError> {
        self.ledger.members_of(team_id).await
    }
}
