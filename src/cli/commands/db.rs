use serde_json::json;

use super::connect;
use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::database::{DatabaseManager, PgStore, Store};
use crate::services::seed::seed_default_configs;

pub async fn migrate(output_format: OutputFormat) -> anyhow::Result<()> {
    let pool = connect().await?;
    DatabaseManager::migrate(&pool).await?;
    output_success(&output_format, "Migrations applied", None)
}

pub async fn seed(output_format: OutputFormat) -> anyhow::Result<()> {
    let store = PgStore::new(connect().await?);
    let created = seed_default_configs(&store).await?;
    output_success(
        &output_format,
        &format!("Seeded {} configuration document(s)", created),
        Some(json!({ "created": created })),
    )
}

pub async fn ping(output_format: OutputFormat) -> anyhow::Result<()> {
    let store = PgStore::new(connect().await?);
    store.ping().await?;
    output_success(&output_format, "Database reachable", None)
}
