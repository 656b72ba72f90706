pub mod admin;
pub mod db;

use sqlx::PgPool;

use crate::config::config;
use crate::database::DatabaseManager;

/// Every command talks to the configured Postgres database.
async fn connect() -> anyhow::Result<PgPool> {
    Ok(DatabaseManager::connect(&config().database).await?)
}
