pub mod auth;
pub mod dashboard;
pub mod realty;
pub mod tenancy;
