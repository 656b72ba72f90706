use anyhow::bail;
use serde_json::json;

use super::connect;
use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::AdminBootstrap;
use crate::database::PgStore;
use crate::services::seed::bootstrap_admin;
use crate::services::validation::MIN_PASSWORD_LEN;

pub async fn create_admin(
    email: String,
    password: String,
    name: String,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        bail!("password must be at least {} characters", MIN_PASSWORD_LEN);
    }

    let store = PgStore::new(connect().await?);
    let bootstrap = AdminBootstrap {
        email: Some(email),
        password: Some(password),
        name,
    };

    match bootstrap_admin(&store, &bootstrap).await? {
        Some(user) => output_success(
            &output_format,
            &format!("Super-admin ready: {}", user.email),
            Some(json!({ "user": user })),
        ),
        None => bail!("no admin email configured"),
    }
}
