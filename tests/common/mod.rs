use anyhow::Result;
use sqlx::SqlitePool;
use tempfile::NamedTempFile;
use uuid::Uuid;

use vortex_core::database::init_database;
use vortex_core::database::models::{CreateTeamInput, Team};
use vortex_core::{AppState, Config};

/// Test database wrapper that provides an isolated testing environment
pub struct TestDb {
    pub pool: SqlitePool,
    _temp_file: NamedTempFile,
}

impl TestDb {
    /// Create a new test database with fresh schema
    pub async fn new() -> Result<Self> {
        let temp_file = NamedTempFile::new()?;
        let database_url = format!("sqlite:{}", temp_file.path().display());
        let pool = init_database(&database_url).await?;

        Ok(TestDb {
            pool,
            _temp_file: temp_file,
        })
    }
}

/// Fully wired application state over a fresh test database
pub struct TestApp {
    pub db: TestDb,
    pub config: Config,
    pub state: AppState,
}

impl TestApp {
    pub async fn new() -> Result<Self> {
        let _ = env_logger::builder().is_test(true).try_init();

        let db = TestDb::new().await?;
        let config = test_config();
        let state = AppState::new(db.pool.clone(), config.clone());

        Ok(TestApp { db, config, state })
    }
}

pub fn test_config() -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        roster_capacity: 6,
        link_ttl_hours: 24,
        nomination_ttl_hours: 48,
        environment: "test".to_string(),
    }
}

/// Team names cap at 25 characters, so keep the random suffix short.
pub fn unique_name(prefix: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{} {}", prefix, &suffix[..8])
}

pub fn unique_tag() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    suffix[..5].to_uppercase()
}

pub async fn create_team(app: &TestApp, captain_id: Uuid) -> Result<Team> {
    let input = CreateTeamInput {
        name: unique_name("Team"),
        tag: unique_tag(),
        description: None,
    };

    Ok(app.state.teams.create_team(input, captain_id).await?)
}
