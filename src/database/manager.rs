use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::DatabaseConfig;

/// Errors from DatabaseManager
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL: {0}")]
    InvalidDatabaseUrl(String),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Builds the process-wide Postgres pool and applies migrations.
pub struct DatabaseManager;

impl DatabaseManager {
    /// Connect eagerly, failing if the database cannot be reached in time.
    pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, DatabaseError> {
        let url = Self::connection_string(config)?;
        let pool = Self::pool_options(config).connect(&url).await?;
        info!("Connected to database ({} max connections)", config.max_connections);
        Ok(pool)
    }

    /// Connect, or fall back to a pool that connects on first use.
    ///
    /// A database outage at startup is logged instead of aborting the
    /// process; `/health` reports it and data routes answer 503 until the
    /// database becomes reachable. Migrations are left to `PgStore`, which
    /// applies them on the first call that reaches the database.
    pub async fn connect_or_lazy(config: &DatabaseConfig) -> Result<PgPool, DatabaseError> {
        match Self::connect(config).await {
            Ok(pool) => Ok(pool),
            Err(DatabaseError::Sqlx(e)) => {
                error!("Database connection failed, continuing with lazy pool: {}", e);
                let url = Self::connection_string(config)?;
                Ok(Self::pool_options(config).connect_lazy(&url)?)
            }
            Err(other) => Err(other),
        }
    }

    pub async fn migrate(pool: &PgPool) -> Result<(), DatabaseError> {
        sqlx::migrate!("./migrations").run(pool).await?;
        info!("Database migrations applied");
        Ok(())
    }

    fn pool_options(config: &DatabaseConfig) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
    }

    /// Validates the configured URL and returns it.
    pub fn connection_string(config: &DatabaseConfig) -> Result<String, DatabaseError> {
        let raw = config
            .url
            .as_deref()
            .ok_or(DatabaseError::ConfigMissing("DATABASE_URL"))?;

        let url = url::Url::parse(raw).map_err(|e| DatabaseError::InvalidDatabaseUrl(e.to_string()))?;
        match url.scheme() {
            "postgres" | "postgresql" => {}
            other => {
                return Err(DatabaseError::InvalidDatabaseUrl(format!("unsupported scheme '{}'", other)));
            }
        }
        if url.path().trim_start_matches('/').is_empty() {
            warn!("DATABASE_URL has no database name; the server default will be used");
        }
        Ok(url.into())
    }
}
