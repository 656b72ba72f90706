//! Tracing subscriber setup.
//!
//! `RUST_LOG` overrides the default filter. Production emits one JSON object
//! per line; other environments use the human-readable formatter.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::Environment;

const DEFAULT_FILTER: &str = "tenant_admin_api=info,tower_http=info";

pub fn init(environment: Environment) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    let result = match environment {
        Environment::Production => registry.with(fmt::layer().json().with_current_span(false)).try_init(),
        _ => registry.with(fmt::layer().with_target(false)).try_init(),
    };
    if result.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

/// Warnings and errors only, so command output stays readable.
pub fn init_cli() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
