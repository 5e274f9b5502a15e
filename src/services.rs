pub mod auth;
pub mod dashboard_service;
pub mod lifecycle_service;
pub mod token_service;
