// src/models/dashboard.rs

use rust_decimal::Decimal;
use serde::Serialize;

// Indicadores do painel, já recortados pelo escopo do usuário
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    // Só o SUPER_ADMIN enxerga empresas; para os demais é sempre 0
    pub total_companies: i64,
    pub total_projects: i64,
    pub total_units: i64,
    pub available_units: i64,
    pub booked_units: i64,
    pub sold_units: i64,
    pub total_sales_count: i64,
    pub total_revenue: Decimal,
}
