pub mod auth;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod mail;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;
pub mod telemetry;

pub use routes::app;
pub use state::AppState;
