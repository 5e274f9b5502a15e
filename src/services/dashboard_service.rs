// src/services/dashboard_service.rs

use crate::{
    common::error::AppError,
    db::Store,
    models::{auth::Principal, dashboard::DashboardSummary, tenancy::TenantScope},
};

#[derive(Clone)]
pub struct DashboardService<S: Store> {
    store: S,
}

impl<S: Store> DashboardService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn get_summary(&self, principal: &Principal) -> Result<DashboardSummary, AppError> {
        self.store
            .dashboard_summary(&TenantScope::for_principal(principal))
            .await
    }
}
