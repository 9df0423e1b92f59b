use anyhow::Result;
use chrono::Duration;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Maximum number of concurrent memberships per team.
    pub roster_capacity: i64,
    /// Lifetime of an open invite link, in hours.
    pub link_ttl_hours: i64,
    /// Lifetime of a targeted nomination, in hours.
    pub nomination_ttl_hours: i64,
    pub environment: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        Ok(Config {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:vortex.db".to_string()),
            roster_capacity: env::var("ROSTER_CAPACITY")
                .unwrap_or_else(|_| "6".to_string())
                .parse()
                .unwrap_or(6),
            link_ttl_hours: env::var("INVITE_LINK_TTL_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()
                .unwrap_or(24),
            nomination_ttl_hours: env::var("NOMINATION_TTL_HOURS")
                .unwrap_or_else(|_| "48".to_string())
                .parse()
                .unwrap_or(48),
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        })
    }

    pub fn link_ttl(&self) -> Duration {
        Duration::hours(self.link_ttl_hours)
    }

    pub fn nomination_ttl(&self) -> Duration {
        Duration::hours(self.nomination_ttl_hours)
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_helpers_convert_hours() {
        let config = Config {
            database_url: "sqlite::memory:".to_string(),
            roster_capacity: 6,
            link_ttl_hours: 24,
            nomination_ttl_hours: 48,
            environment: "test".to_string(),
        };

        assert_eq!(config.link_ttl(), Duration::hours(24));
        assert_eq!(config.nomination_ttl(), Duration::hours(48));
        assert!(!config.is_production());
    }
}
