// src/handlers/sales.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::{error::AppError, pagination::Pagination},
    config::AppState,
    db::Store,
    handlers::bookings::validate_positive_amount,
    middleware::auth::AuthenticatedUser,
    models::realty::SaleFilter,
};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSalePayload {
    pub unit_id: Uuid,
    #[validate(custom(function = "validate_positive_amount"))]
    pub amount: Decimal,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSalePayload {
    #[validate(custom(function = "validate_positive_amount"))]
    pub amount: Decimal,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListSalesQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

pub async fn create_sale<S: Store>(
    State(app_state): State<AppState<S>>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Json(payload): Json<CreateSalePayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    let sale = app_state
        .lifecycle_service
        .create_sale(&principal, payload.unit_id, payload.amount)
        .await?;

    Ok((StatusCode::CREATED, Json(sale)))
}

pub async fn list_sales<S: Store>(
    State(app_state): State<AppState<S>>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Query(query): Query<ListSalesQuery>,
) -> Result<impl IntoResponse, AppError> {
    let filter = SaleFilter {
        from: query.from,
        to: query.to,
    };
    let page = app_state
        .lifecycle_service
        .list_sales(&principal, &filter, Pagination::new(query.page, query.limit))
        .await?;

    Ok((StatusCode::OK, Json(page)))
}

pub async fn get_sale<S: Store>(
    State(app_state): State<AppState<S>>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Path(sale_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let sale = app_state.lifecycle_service.get_sale(&principal, sale_id).await?;
    Ok((StatusCode::OK, Json(sale)))
}

pub async fn update_sale<S: Store>(
    State(app_state): State<AppState<S>>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Path(sale_id): Path<Uuid>,
    Json(payload): Json<UpdateSalePayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    let sale = app_state
        .lifecycle_service
        .update_sale_amount(&principal, sale_id, payload.amount)
        .await?;

    Ok((StatusCode::OK, Json(sale)))
}

pub async fn delete_sale<S: Store>(
    State(app_state): State<AppState<S>>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Path(sale_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    app_state.lifecycle_service.delete_sale(&principal, sale_id).await?;
    Ok((
        StatusCode::OK,
        Json(json!({ "message": "Venda removida com sucesso." })),
    ))
}
