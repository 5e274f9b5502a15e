// src/db/store.rs
//
// Contrato de persistência consumido pelos serviços. Há duas implementações:
// `PgStore` (produção) e `MemoryStore` (testes). Toda leitura de dados de
// empresa recebe um `&TenantScope` já resolvido.

use std::future::Future;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    common::{error::AppError, pagination::Pagination},
    models::{
        auth::{NewRefreshToken, RefreshToken, User},
        dashboard::DashboardSummary,
        realty::{
            Booking, BookingStatus, NewBooking, NewSale, NewUnit, Project, Sale, SaleFilter, Unit,
            UnitChanges, UnitFilter, UnitStatus,
        },
        tenancy::TenantScope,
    },
};

pub trait Store: Clone + Send + Sync + 'static {
    type Tx: StoreTx;

    /// Abre uma transação. Soltar (drop) sem `commit` desfaz tudo.
    fn begin(&self) -> impl Future<Output = Result<Self::Tx, AppError>> + Send;

    // --- Usuários ---

    fn find_user_by_username(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<Option<User>, AppError>> + Send;

    fn find_user_by_id(&self, id: Uuid)
    -> impl Future<Output = Result<Option<User>, AppError>> + Send;

    // --- Refresh tokens (fora de transação) ---

    fn insert_refresh_token(
        &self,
        new: NewRefreshToken,
    ) -> impl Future<Output = Result<RefreshToken, AppError>> + Send;

    /// Desativa uma única linha. Retorna quantas linhas mudaram (0 se não existir).
    fn deactivate_refresh_token(
        &self,
        token_hash: &str,
    ) -> impl Future<Output = Result<u64, AppError>> + Send;

    // --- Leituras e manutenção escopadas ---

    /// Apenas projetos ativos dentro do escopo.
    fn find_project(
        &self,
        scope: &TenantScope,
        id: Uuid,
    ) -> impl Future<Output = Result<Option<Project>, AppError>> + Send;

    /// Número de lote repetido no mesmo projeto vira `AlreadyExists`.
    fn insert_unit(&self, new: NewUnit) -> impl Future<Output = Result<Unit, AppError>> + Send;

    /// `None` se a unidade não existe, está inativa ou fora do escopo.
    fn update_unit(
        &self,
        scope: &TenantScope,
        id: Uuid,
        changes: &UnitChanges,
    ) -> impl Future<Output = Result<Option<Unit>, AppError>> + Send;

    fn find_unit(
        &self,
        scope: &TenantScope,
        id: Uuid,
    ) -> impl Future<Output = Result<Option<Unit>, AppError>> + Send;

    fn list_units(
        &self,
        scope: &TenantScope,
        filter: &UnitFilter,
        pagination: Pagination,
    ) -> impl Future<Output = Result<(Vec<Unit>, i64), AppError>> + Send;

    fn find_sale(
        &self,
        scope: &TenantScope,
        id: Uuid,
    ) -> impl Future<Output = Result<Option<Sale>, AppError>> + Send;

    fn list_sales(
        &self,
        scope: &TenantScope,
        filter: &SaleFilter,
        pagination: Pagination,
    ) -> impl Future<Output = Result<(Vec<Sale>, i64), AppError>> + Send;

    fn update_sale_amount(
        &self,
        scope: &TenantScope,
        id: Uuid,
        amount: Decimal,
    ) -> impl Future<Output = Result<Option<Sale>, AppError>> + Send;

    /// Soft delete. `false` se a venda não existe (ou não está no escopo).
    fn deactivate_sale(
        &self,
        scope: &TenantScope,
        id: Uuid,
    ) -> impl Future<Output = Result<bool, AppError>> + Send;

    fn dashboard_summary(
        &self,
        scope: &TenantScope,
    ) -> impl Future<Output = Result<DashboardSummary, AppError>> + Send;
}

/// Operações dentro de uma transação. Os métodos `*_for_update` travam a linha
/// até o `commit` (ou rollback).
pub trait StoreTx: Send {
    // --- Refresh tokens ---

    fn find_refresh_token_for_update(
        &mut self,
        token_hash: &str,
    ) -> impl Future<Output = Result<Option<RefreshToken>, AppError>> + Send;

    fn find_user_by_id(
        &mut self,
        id: Uuid,
    ) -> impl Future<Output = Result<Option<User>, AppError>> + Send;

    fn deactivate_refresh_token_by_id(
        &mut self,
        id: Uuid,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Revogação em cascata: desativa todos os tokens do usuário.
    fn deactivate_user_refresh_tokens(
        &mut self,
        user_id: Uuid,
    ) -> impl Future<Output = Result<u64, AppError>> + Send;

    fn insert_refresh_token(
        &mut self,
        new: NewRefreshToken,
    ) -> impl Future<Output = Result<RefreshToken, AppError>> + Send;

    // --- Unidades / reservas / vendas ---

    /// Apenas unidades ativas dentro do escopo.
    fn find_unit_for_update(
        &mut self,
        scope: &TenantScope,
        id: Uuid,
    ) -> impl Future<Output = Result<Option<Unit>, AppError>> + Send;

    fn set_unit_status(
        &mut self,
        id: Uuid,
        status: UnitStatus,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    fn find_booking(
        &mut self,
        id: Uuid,
    ) -> impl Future<Output = Result<Option<Booking>, AppError>> + Send;

    fn find_booking_for_update(
        &mut self,
        id: Uuid,
    ) -> impl Future<Output = Result<Option<Booking>, AppError>> + Send;

    fn find_active_booking(
        &mut self,
        unit_id: Uuid,
    ) -> impl Future<Output = Result<Option<Booking>, AppError>> + Send;

    fn insert_booking(
        &mut self,
        new: NewBooking,
    ) -> impl Future<Output = Result<Booking, AppError>> + Send;

    fn set_booking_status(
        &mut self,
        id: Uuid,
        status: BookingStatus,
    ) -> impl Future<Output = Result<Booking, AppError>> + Send;

    fn insert_sale(&mut self, new: NewSale)
    -> impl Future<Output = Result<Sale, AppError>> + Send;

    fn has_active_sale(&mut self, unit_id: Uuid)
    -> impl Future<Output = Result<bool, AppError>> + Send;

    /// Soft delete da unidade.
    fn deactivate_unit(&mut self, id: Uuid) -> impl Future<Output = Result<(), AppError>> + Send;

    fn commit(self) -> impl Future<Output = Result<(), AppError>> + Send;
}
