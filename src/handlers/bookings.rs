// src/handlers/bookings.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    common::error::AppError,
    config::AppState,
    db::Store,
    middleware::auth::AuthenticatedUser,
};

// Valores monetários precisam ser estritamente positivos
pub fn validate_positive_amount(amount: &Decimal) -> Result<(), ValidationError> {
    if amount.is_sign_positive() && !amount.is_zero() {
        return Ok(());
    }
    let mut err = ValidationError::new("positive");
    err.message = Some("O valor deve ser maior que zero.".into());
    Err(err)
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingPayload {
    pub unit_id: Uuid,
    #[validate(length(min = 3, message = "O nome do cliente deve ter no mínimo 3 caracteres."))]
    pub client_name: String,
    #[validate(custom(function = "validate_positive_amount"))]
    pub amount: Decimal,
}

pub async fn create_booking<S: Store>(
    State(app_state): State<AppState<S>>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Json(payload): Json<CreateBookingPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    let booking = app_state
        .lifecycle_service
        .create_booking(
            &principal,
            payload.unit_id,
            payload.client_name.trim(),
            payload.amount,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(booking)))
}

pub async fn cancel_booking<S: Store>(
    State(app_state): State<AppState<S>>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Path(booking_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let booking = app_state
        .lifecycle_service
        .cancel_booking(&principal, booking_id)
        .await?;

    Ok((StatusCode::OK, Json(booking)))
}
