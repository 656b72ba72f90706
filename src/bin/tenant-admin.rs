use clap::Parser;
use tenant_admin_api::cli::utils::output_error;
use tenant_admin_api::cli::{Cli, OutputFormat};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tenant_admin_api::telemetry::init_cli();

    let cli = Cli::parse();
    let output_format = OutputFormat::from_cli(&cli);

    if let Err(e) = tenant_admin_api::cli::run(cli).await {
        match std::env::var("CLI_VERBOSE").as_deref() {
            Ok("true") | Ok("1") => output_error(&output_format, &format!("{e:?}")),
            _ => output_error(&output_format, &e.to_string()),
        }
        std::process::exit(1);
    }

    Ok(())
}
