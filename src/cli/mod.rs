pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "tenant-admin")]
#[command(about = "Tenant Admin CLI - database and account maintenance for the administration API")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Apply pending database migrations")]
    Migrate,

    #[command(about = "Insert any missing default configuration documents")]
    Seed,

    #[command(about = "Create a super-admin, or promote an existing account")]
    CreateAdmin {
        #[arg(long, help = "Account email")]
        email: String,
        #[arg(long, help = "Account password (at least 8 characters)")]
        password: String,
        #[arg(long, default_value = "Administrator", help = "Display name for a new account")]
        name: String,
    },

    #[command(about = "Check that the configured database is reachable")]
    Ping,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Migrate => commands::db::migrate(output_format).await,
        Commands::Seed => commands::db::seed(output_format).await,
        Commands::Ping => commands::db::ping(output_format).await,
        Commands::CreateAdmin { email, password, name } => {
            commands::admin::create_admin(email, password, name, output_format).await
        }
    }
}
