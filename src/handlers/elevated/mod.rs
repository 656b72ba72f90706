pub mod activities;
pub mod config;
pub mod invoices;
pub mod stats;
pub mod tenants;
pub mod users;
