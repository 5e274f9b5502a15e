// src/services/lifecycle_service.rs

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    common::{
        error::AppError,
        pagination::{Paginated, Pagination},
    },
    db::{Store, StoreTx},
    models::{
        auth::Principal,
        realty::{
            can_manage_units, Booking, BookingStatus, NewBooking, NewSale, NewUnit, Sale,
            SaleFilter, Unit, UnitChanges, UnitFilter, UnitStatus, UnitTransition,
        },
        tenancy::TenantScope,
    },
};

const UNIT_NOT_FOUND: &str = "Unidade não encontrada ou acesso negado.";
const BOOKING_NOT_FOUND: &str = "Reserva não encontrada.";
const SALE_NOT_FOUND: &str = "Venda não encontrada.";
const PROJECT_NOT_FOUND: &str = "Projeto não encontrado.";

/// Máquina de estados da unidade (AVAILABLE -> BOOKED -> SOLD).
///
/// Cada operação de escrita roda em uma única transação: o status da unidade e
/// o registro de reserva/venda são gravados juntos ou nenhum dos dois é.
#[derive(Clone)]
pub struct LifecycleService<S: Store> {
    store: S,
}

impl<S: Store> LifecycleService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    // --- RESERVA ---

    pub async fn create_booking(
        &self,
        principal: &Principal,
        unit_id: Uuid,
        client_name: &str,
        amount: Decimal,
    ) -> Result<Booking, AppError> {
        let transition = UnitTransition::Book;
        ensure_role(transition, principal, "Super admin não pode criar reservas.")?;

        let scope = TenantScope::for_principal(principal);
        let mut tx = self.store.begin().await?;

        // 1. Trava a unidade (fora do escopo = não existe)
        let unit = tx
            .find_unit_for_update(&scope, unit_id)
            .await?
            .ok_or(AppError::NotFound(UNIT_NOT_FOUND))?;

        // 2. Confere a transição na tabela
        let next = transition
            .next(unit.status)
            .ok_or(AppError::InvalidState("A unidade não está disponível para reserva."))?;

        // 3. Reserva + status, atomicamente
        let booking = tx
            .insert_booking(NewBooking {
                unit_id: unit.id,
                agent_id: principal.id,
                client_name: client_name.to_owned(),
                amount,
            })
            .await?;
        tx.set_unit_status(unit.id, next).await?;

        tx.commit().await?;

        tracing::info!(unit_id = %unit.id, booking_id = %booking.id, "📌 Unidade reservada");
        Ok(booking)
    }

    pub async fn cancel_booking(
        &self,
        principal: &Principal,
        booking_id: Uuid,
    ) -> Result<Booking, AppError> {
        let scope = TenantScope::for_principal(principal);
        let mut tx = self.store.begin().await?;

        // 1. Descobre a unidade da reserva (sem trava)
        let booking = tx
            .find_booking(booking_id)
            .await?
            .ok_or(AppError::NotFound(BOOKING_NOT_FOUND))?;

        // 2. Trava a unidade primeiro, na mesma ordem das outras operações
        let unit = tx
            .find_unit_for_update(&TenantScope::Unrestricted, booking.unit_id)
            .await?
            .ok_or(AppError::NotFound(BOOKING_NOT_FOUND))?;

        if !scope.permits(unit.company_id) {
            tracing::warn!(
                principal_id = %principal.id,
                booking_id = %booking_id,
                "Tentativa de cancelar reserva de outra empresa"
            );
            return Err(AppError::Forbidden("Acesso negado."));
        }

        // 3. Relê a reserva já travada (o status pode ter mudado enquanto esperávamos)
        let booking = tx
            .find_booking_for_update(booking_id)
            .await?
            .ok_or(AppError::NotFound(BOOKING_NOT_FOUND))?;

        if booking.status != BookingStatus::Active {
            return Err(AppError::AlreadyCancelled);
        }

        let next = UnitTransition::CancelBooking
            .next(unit.status)
            .ok_or(AppError::InvalidState("A unidade não está reservada."))?;

        // 4. Cancela + libera a unidade
        let cancelled = tx
            .set_booking_status(booking.id, BookingStatus::Cancelled)
            .await?;
        tx.set_unit_status(unit.id, next).await?;

        tx.commit().await?;

        tracing::info!(unit_id = %unit.id, booking_id = %booking_id, "↩️ Reserva cancelada");
        Ok(cancelled)
    }

    // --- VENDA ---

    pub async fn create_sale(
        &self,
        principal: &Principal,
        unit_id: Uuid,
        amount: Decimal,
    ) -> Result<Sale, AppError> {
        let transition = UnitTransition::Sell;
        ensure_role(transition, principal, "Super admin não pode criar vendas.")?;

        let scope = TenantScope::for_principal(principal);
        let mut tx = self.store.begin().await?;

        let unit = tx
            .find_unit_for_update(&scope, unit_id)
            .await?
            .ok_or(AppError::NotFound(UNIT_NOT_FOUND))?;

        let next = transition
            .next(unit.status)
            .ok_or(AppError::InvalidState("Apenas unidades reservadas podem ser vendidas."))?;

        // BOOKED sem reserva ativa não deveria existir, mas a venda exige as duas coisas
        if tx.find_active_booking(unit.id).await?.is_none() {
            return Err(AppError::InvalidState(
                "Nenhuma reserva ativa encontrada para esta unidade.",
            ));
        }

        let sale = tx
            .insert_sale(NewSale {
                unit_id: unit.id,
                agent_id: principal.id,
                company_id: unit.company_id,
                amount,
            })
            .await?;
        tx.set_unit_status(unit.id, next).await?;

        tx.commit().await?;

        tracing::info!(unit_id = %unit.id, sale_id = %sale.id, "💰 Unidade vendida");
        Ok(sale)
    }

    // --- CADASTRO DE UNIDADES ---

    /// A unidade nasce AVAILABLE; a empresa vem do projeto, nunca do payload.
    pub async fn create_unit(&self, principal: &Principal, new: NewUnit) -> Result<Unit, AppError> {
        ensure_unit_manager(principal)?;

        let scope = TenantScope::for_principal(principal);
        self.store
            .find_project(&scope, new.project_id)
            .await?
            .ok_or(AppError::NotFound(PROJECT_NOT_FOUND))?;

        let unit = self.store.insert_unit(new).await?;

        tracing::info!(unit_id = %unit.id, project_id = %unit.project_id, "🏗️ Unidade cadastrada");
        Ok(unit)
    }

    /// Edita número, área e preço. O status só muda pela máquina de estados.
    pub async fn update_unit(
        &self,
        principal: &Principal,
        unit_id: Uuid,
        changes: &UnitChanges,
    ) -> Result<Unit, AppError> {
        ensure_unit_manager(principal)?;

        self.store
            .update_unit(&TenantScope::for_principal(principal), unit_id, changes)
            .await?
            .ok_or(AppError::NotFound(UNIT_NOT_FOUND))
    }

    /// Soft delete. Unidade vendida, com venda ativa ou reservada não sai do estoque.
    pub async fn delete_unit(&self, principal: &Principal, unit_id: Uuid) -> Result<(), AppError> {
        ensure_unit_manager(principal)?;

        let scope = TenantScope::for_principal(principal);
        let mut tx = self.store.begin().await?;

        let unit = tx
            .find_unit_for_update(&scope, unit_id)
            .await?
            .ok_or(AppError::NotFound(UNIT_NOT_FOUND))?;

        if unit.status == UnitStatus::Sold || tx.has_active_sale(unit.id).await? {
            return Err(AppError::InvalidState(
                "Não é possível remover uma unidade vendida.",
            ));
        }
        if unit.status == UnitStatus::Booked {
            return Err(AppError::InvalidState(
                "Cancele a reserva antes de remover a unidade.",
            ));
        }

        tx.deactivate_unit(unit.id).await?;
        tx.commit().await?;

        tracing::info!(unit_id = %unit.id, "🗑️ Unidade removida");
        Ok(())
    }

    // --- LEITURAS / MANUTENÇÃO ---

    pub async fn get_unit(&self, principal: &Principal, unit_id: Uuid) -> Result<Unit, AppError> {
        self.store
            .find_unit(&TenantScope::for_principal(principal), unit_id)
            .await?
            .ok_or(AppError::NotFound(UNIT_NOT_FOUND))
    }

    pub async fn list_units(
        &self,
        principal: &Principal,
        filter: &UnitFilter,
        pagination: Pagination,
    ) -> Result<Paginated<Unit>, AppError> {
        let scope = TenantScope::for_principal(principal);
        let (units, total) = self.store.list_units(&scope, filter, pagination).await?;
        Ok(Paginated::new(units, total, pagination))
    }

    pub async fn get_sale(&self, principal: &Principal, sale_id: Uuid) -> Result<Sale, AppError> {
        self.store
            .find_sale(&TenantScope::for_principal(principal), sale_id)
            .await?
            .ok_or(AppError::NotFound(SALE_NOT_FOUND))
    }

    pub async fn list_sales(
        &self,
        principal: &Principal,
        filter: &SaleFilter,
        pagination: Pagination,
    ) -> Result<Paginated<Sale>, AppError> {
        let scope = TenantScope::for_principal(principal);
        let (sales, total) = self.store.list_sales(&scope, filter, pagination).await?;
        Ok(Paginated::new(sales, total, pagination))
    }

    /// Só o valor da venda é editável; o vínculo com a unidade é imutável.
    pub async fn update_sale_amount(
        &self,
        principal: &Principal,
        sale_id: Uuid,
        amount: Decimal,
    ) -> Result<Sale, AppError> {
        self.store
            .update_sale_amount(&TenantScope::for_principal(principal), sale_id, amount)
            .await?
            .ok_or(AppError::NotFound(SALE_NOT_FOUND))
    }

    /// Soft delete. A unidade continua SOLD.
    pub async fn delete_sale(&self, principal: &Principal, sale_id: Uuid) -> Result<(), AppError> {
        let deleted = self
            .store
            .deactivate_sale(&TenantScope::for_principal(principal), sale_id)
            .await?;

        if !deleted {
            return Err(AppError::NotFound(SALE_NOT_FOUND));
        }
        Ok(())
    }
}

fn ensure_role(
    transition: UnitTransition,
    principal: &Principal,
    message: &'static str,
) -> Result<(), AppError> {
    if transition.permits_role(principal.role) {
        return Ok(());
    }
    tracing::warn!(principal_id = %principal.id, ?transition, "Papel sem permissão para a transição");
    Err(AppError::Forbidden(message))
}

fn ensure_unit_manager(principal: &Principal) -> Result<(), AppError> {
    if can_manage_units(principal.role) {
        return Ok(());
    }
    tracing::warn!(principal_id = %principal.id, "Papel sem permissão para cadastrar unidades");
    Err(AppError::Forbidden("Apenas administradores podem gerenciar unidades."))
}
