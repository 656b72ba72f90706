pub mod manager;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod repository;

pub use manager::{DatabaseError, DatabaseManager};
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use repository::{
    ActivityRepository, ConfigRepository, InvoiceRepository, Page, Store, SubscriptionChange, SubscriptionOutcome,
    TenantRepository, UserRepository,
};

use thiserror::Error;

/// Errors raised by store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique constraint rejected the write.
    #[error("duplicate value for field '{field}'")]
    Duplicate { field: String },

    /// A record referenced by a multi-record write does not exist.
    #[error("{0}")]
    NotFound(String),

    #[error("database unavailable: {0}")]
    Unavailable(String),

    #[error("stored data could not be decoded: {0}")]
    Corrupt(String),

    /// Migrations could not be applied to a reachable database.
    #[error("schema migration failed: {0}")]
    Schema(String),

    #[error(transparent)]
    Sqlx(sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => StoreError::Duplicate {
                field: field_for_constraint(db_err.constraint().unwrap_or_default()).to_string(),
            },
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
                StoreError::Unavailable(err.to_string())
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => StoreError::Corrupt(err.to_string()),
            _ => StoreError::Sqlx(err),
        }
    }
}

/// Maps a unique constraint name from the migrations to the API field it guards.
fn field_for_constraint(constraint: &str) -> &str {
    match constraint {
        "users_email_key" => "email",
        "tenants_slug_key" => "slug",
        "tenants_domain_key" => "domain",
        "configs_config_type_key" => "config_type",
        "invoices_invoice_number_key" => "invoice_number",
        other => other,
    }
}
