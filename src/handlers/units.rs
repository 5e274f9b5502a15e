// src/handlers/units.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::{
    common::{error::AppError, pagination::Pagination},
    config::AppState,
    db::Store,
    handlers::bookings::validate_positive_amount,
    middleware::auth::AuthenticatedUser,
    models::realty::{NewUnit, UnitChanges, UnitFilter, UnitStatus},
};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUnitPayload {
    pub project_id: Uuid,
    #[validate(length(min = 1, max = 50, message = "O número da unidade é obrigatório."))]
    pub plot_number: String,
    #[validate(custom(function = "validate_positive_amount"))]
    pub area: Decimal,
    #[validate(custom(function = "validate_positive_amount"))]
    pub price: Decimal,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUnitPayload {
    pub plot_number: Option<String>,
    pub area: Option<Decimal>,
    pub price: Option<Decimal>,
}

// Campos opcionais: só valida o que veio no corpo
impl Validate for UpdateUnitPayload {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Some(plot_number) = &self.plot_number {
            let len = plot_number.trim().chars().count();
            if len == 0 || len > 50 {
                let mut err = ValidationError::new("length");
                err.message = Some("O número da unidade é obrigatório.".into());
                errors.add("plotNumber", err);
            }
        }
        if let Some(Err(err)) = self.area.as_ref().map(validate_positive_amount) {
            errors.add("area", err);
        }
        if let Some(Err(err)) = self.price.as_ref().map(validate_positive_amount) {
            errors.add("price", err);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListUnitsQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<UnitStatus>,
    pub search: Option<String>,
}

pub async fn list_units<S: Store>(
    State(app_state): State<AppState<S>>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Query(query): Query<ListUnitsQuery>,
) -> Result<impl IntoResponse, AppError> {
    // Busca vazia equivale a não filtrar
    let search = query
        .search
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty());
    let filter = UnitFilter {
        status: query.status,
        search,
    };
    let page = app_state
        .lifecycle_service
        .list_units(&principal, &filter, Pagination::new(query.page, query.limit))
        .await?;

    Ok((StatusCode::OK, Json(page)))
}

pub async fn get_unit<S: Store>(
    State(app_state): State<AppState<S>>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Path(unit_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let unit = app_state.lifecycle_service.get_unit(&principal, unit_id).await?;
    Ok((StatusCode::OK, Json(unit)))
}

pub async fn create_unit<S: Store>(
    State(app_state): State<AppState<S>>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Json(payload): Json<CreateUnitPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    let unit = app_state
        .lifecycle_service
        .create_unit(
            &principal,
            NewUnit {
                project_id: payload.project_id,
                plot_number: payload.plot_number.trim().to_owned(),
                area: payload.area,
                price: payload.price,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(unit)))
}

pub async fn update_unit<S: Store>(
    State(app_state): State<AppState<S>>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Path(unit_id): Path<Uuid>,
    Json(payload): Json<UpdateUnitPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    let changes = UnitChanges {
        plot_number: payload.plot_number.map(|p| p.trim().to_owned()),
        area: payload.area,
        price: payload.price,
    };
    let unit = app_state
        .lifecycle_service
        .update_unit(&principal, unit_id, &changes)
        .await?;

    Ok((StatusCode::OK, Json(unit)))
}

pub async fn delete_unit<S: Store>(
    State(app_state): State<AppState<S>>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Path(unit_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    app_state
        .lifecycle_service
        .delete_unit(&principal, unit_id)
        .await?;

    Ok((
        StatusCode::OK,
        Json(json!({ "message": "Unidade removida com sucesso." })),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_update_only_checks_present_fields() {
        assert!(UpdateUnitPayload::default().validate().is_ok());

        let payload = UpdateUnitPayload {
            price: Some(Decimal::new(250_000, 0)),
            ..Default::default()
        };
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn partial_update_rejects_blank_plot_and_non_positive_values() {
        let payload = UpdateUnitPayload {
            plot_number: Some("   ".into()),
            area: Some(Decimal::ZERO),
            price: Some(Decimal::new(-1, 0)),
        };
        let errors = payload.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("plotNumber"));
        assert!(fields.contains_key("area"));
        assert!(fields.contains_key("price"));
    }
}
