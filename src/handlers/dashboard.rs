// src/handlers/dashboard.rs

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::{
    common::error::AppError, config::AppState, db::Store, middleware::auth::AuthenticatedUser,
};

// GET /api/dashboard/summary
pub async fn get_summary<S: Store>(
    State(app_state): State<AppState<S>>,
    AuthenticatedUser(principal): AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    let summary = app_state.dashboard_service.get_summary(&principal).await?;
    Ok((StatusCode::OK, Json(summary)))
}
