pub mod config;
pub mod database;
pub mod error;
pub mod services;

pub use config::Config;
pub use database::repositories::{
    InvitationAuthority, MembershipLedger, NotificationRelay, TeamRegistry,
};
pub use error::{AppError, ErrorKind};
pub use services::{InvitationService, TeamService};

use database::DatabaseTransaction;
use sqlx::SqlitePool;

/// Explicitly wired component graph; the request-handling layer constructs
/// one of these per process and calls the services on it.
pub struct AppState {
    pub teams: TeamService,
    pub invitations: InvitationService,
}

impl AppState {
    pub fn new(pool: SqlitePool, config: Config) -> Self {
        // one runner shared by both services so every write transaction
        // passes through the same writer lock
        let tx = DatabaseTransaction::new(pool.clone());
        let registry = TeamRegistry::new(pool.clone());
        let ledger = MembershipLedger::new(pool.clone());
        let authority = InvitationAuthority::new(pool.clone());
        let relay = NotificationRelay::new(pool);

        let teams = TeamService::new(
            registry.clone(),
            ledger.clone(),
            tx.clone(),
            config.clone(),
        );
        let invitations =
            InvitationService::new(authority, ledger, registry, relay, tx, config);

        AppState { teams, invitations }
    }
}
