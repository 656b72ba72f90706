pub mod auth;
pub mod contact;
pub mod plans;
pub mod system;
