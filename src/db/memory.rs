// src/db/memory.rs
//
// Implementação em memória do `Store`. A transação segura um único mutex
// assíncrono do início ao fim, ou seja, execução serializável. As escritas
// vão para uma cópia e só são publicadas no `commit`.
//
// `fail_unit_status_writes` faz `set_unit_status` falhar dentro da transação,
// para exercitar o rollback das operações do ciclo de vida.

use std::{collections::HashMap, sync::Arc};

use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::{
    common::{error::AppError, pagination::Pagination},
    db::store::{Store, StoreTx},
    models::{
        auth::{NewRefreshToken, RefreshToken, User},
        dashboard::DashboardSummary,
        realty::{
            Booking, BookingStatus, Company, NewBooking, NewSale, NewUnit, Project, Sale,
            SaleFilter, Unit, UnitChanges, UnitFilter, UnitStatus,
        },
        tenancy::TenantScope,
    },
};

#[derive(Debug, Default, Clone)]
struct MemoryState {
    companies: HashMap<Uuid, Company>,
    users: HashMap<Uuid, User>,
    refresh_tokens: Vec<RefreshToken>,
    projects: HashMap<Uuid, Project>,
    units: HashMap<Uuid, Unit>,
    bookings: HashMap<Uuid, Booking>,
    sales: HashMap<Uuid, Sale>,
    fail_unit_status_writes: bool,
}

impl MemoryState {
    fn insert_refresh_token(&mut self, new: NewRefreshToken) -> Result<RefreshToken, AppError> {
        if self.refresh_tokens.iter().any(|t| t.token_hash == new.token_hash) {
            return Err(anyhow::anyhow!("token_hash duplicado").into());
        }
        let token = RefreshToken {
            id: Uuid::new_v4(),
            token_hash: new.token_hash,
            user_id: new.user_id,
            company_id: new.company_id,
            expires_at: new.expires_at,
            is_active: true,
            created_at: Utc::now(),
        };
        self.refresh_tokens.push(token.clone());
        Ok(token)
    }

    // Mesmo papel do UNIQUE (project_id, plot_number), que vale também para unidades inativas
    fn plot_number_taken(&self, project_id: Uuid, plot_number: &str, except: Option<Uuid>) -> bool {
        self.units.values().any(|u| {
            u.project_id == project_id && u.plot_number == plot_number && Some(u.id) != except
        })
    }

    fn scoped_unit(&self, scope: &TenantScope, id: Uuid) -> Option<Unit> {
        self.units
            .get(&id)
            .filter(|u| u.is_active && scope.permits(u.company_id))
            .cloned()
    }

    fn scoped_sale_mut(&mut self, scope: &TenantScope, id: Uuid) -> Option<&mut Sale> {
        self.sales
            .get_mut(&id)
            .filter(|s| s.is_active && scope.permits(s.company_id))
    }
}

fn paginate<T>(mut items: Vec<T>, pagination: Pagination) -> (Vec<T>, i64) {
    let total = items.len() as i64;
    let offset = pagination.offset().max(0) as usize;
    let page = if offset >= items.len() {
        Vec::new()
    } else {
        items
            .drain(offset..)
            .take(pagination.limit as usize)
            .collect()
    };
    (page, total)
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Carga de dados (o CRUD de usuários/projetos/unidades é externo) ---

    pub async fn insert_user(&self, user: User) {
        self.state.lock().await.users.insert(user.id, user);
    }

    pub async fn insert_company(&self, company: Company) {
        self.state.lock().await.companies.insert(company.id, company);
    }

    pub async fn set_user_active(&self, user_id: Uuid, is_active: bool) {
        if let Some(user) = self.state.lock().await.users.get_mut(&user_id) {
            user.is_active = is_active;
        }
    }

    pub async fn insert_project(&self, project: Project) {
        self.state.lock().await.projects.insert(project.id, project);
    }

    /// Insere a unidade. O `company_id` é copiado do projeto, como no JOIN do Postgres.
    pub async fn seed_unit(&self, mut unit: Unit) -> Result<Unit, AppError> {
        let mut state = self.state.lock().await;
        let project = state
            .projects
            .get(&unit.project_id)
            .ok_or(AppError::NotFound("Projeto não encontrado."))?;
        unit.company_id = project.company_id;
        state.units.insert(unit.id, unit.clone());
        Ok(unit)
    }

    pub async fn fail_unit_status_writes(&self, fail: bool) {
        self.state.lock().await.fail_unit_status_writes = fail;
    }

    // --- Inspeção ---

    pub async fn refresh_tokens_of(&self, user_id: Uuid) -> Vec<RefreshToken> {
        self.state
            .lock()
            .await
            .refresh_tokens
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect()
    }

    pub async fn bookings_of(&self, unit_id: Uuid) -> Vec<Booking> {
        self.state
            .lock()
            .await
            .bookings
            .values()
            .filter(|b| b.unit_id == unit_id)
            .cloned()
            .collect()
    }

    pub async fn sales_of(&self, unit_id: Uuid) -> Vec<Sale> {
        self.state
            .lock()
            .await
            .sales
            .values()
            .filter(|s| s.unit_id == unit_id)
            .cloned()
            .collect()
    }

    pub async fn unit(&self, unit_id: Uuid) -> Option<Unit> {
        self.state.lock().await.units.get(&unit_id).cloned()
    }
}

impl Store for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx, AppError> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(MemoryTx { guard, staged })
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let state = self.state.lock().await;
        Ok(state.users.values().find(|u| u.username == username).cloned())
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }

    async fn insert_refresh_token(&self, new: NewRefreshToken) -> Result<RefreshToken, AppError> {
        self.state.lock().await.insert_refresh_token(new)
    }

    async fn deactivate_refresh_token(&self, token_hash: &str) -> Result<u64, AppError> {
        let mut state = self.state.lock().await;
        let mut changed = 0;
        for token in state
            .refresh_tokens
            .iter_mut()
            .filter(|t| t.token_hash == token_hash && t.is_active)
        {
            token.is_active = false;
            changed += 1;
        }
        Ok(changed)
    }

    async fn find_unit(&self, scope: &TenantScope, id: Uuid) -> Result<Option<Unit>, AppError> {
        Ok(self.state.lock().await.scoped_unit(scope, id))
    }

    async fn find_project(
        &self,
        scope: &TenantScope,
        id: Uuid,
    ) -> Result<Option<Project>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .projects
            .get(&id)
            .filter(|p| p.is_active && scope.permits(p.company_id))
            .cloned())
    }

    async fn insert_unit(&self, new: NewUnit) -> Result<Unit, AppError> {
        let mut state = self.state.lock().await;
        let company_id = state
            .projects
            .get(&new.project_id)
            .map(|p| p.company_id)
            .ok_or_else(|| anyhow::anyhow!("projeto inexistente"))?;

        if state.plot_number_taken(new.project_id, &new.plot_number, None) {
            return Err(AppError::AlreadyExists(
                "Já existe uma unidade com este número neste projeto.",
            ));
        }

        let now = Utc::now();
        let unit = Unit {
            id: Uuid::new_v4(),
            project_id: new.project_id,
            company_id,
            plot_number: new.plot_number,
            area: new.area,
            price: new.price,
            status: UnitStatus::Available,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        state.units.insert(unit.id, unit.clone());
        Ok(unit)
    }

    async fn update_unit(
        &self,
        scope: &TenantScope,
        id: Uuid,
        changes: &UnitChanges,
    ) -> Result<Option<Unit>, AppError> {
        let mut state = self.state.lock().await;
        let Some(current) = state.scoped_unit(scope, id) else {
            return Ok(None);
        };

        if let Some(plot_number) = &changes.plot_number {
            if state.plot_number_taken(current.project_id, plot_number, Some(id)) {
                return Err(AppError::AlreadyExists(
                    "Já existe uma unidade com este número neste projeto.",
                ));
            }
        }

        let Some(unit) = state.units.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(plot_number) = &changes.plot_number {
            unit.plot_number = plot_number.clone();
        }
        if let Some(area) = changes.area {
            unit.area = area;
        }
        if let Some(price) = changes.price {
            unit.price = price;
        }
        unit.updated_at = Utc::now();
        Ok(Some(unit.clone()))
    }

    async fn list_units(
        &self,
        scope: &TenantScope,
        filter: &UnitFilter,
        pagination: Pagination,
    ) -> Result<(Vec<Unit>, i64), AppError> {
        let state = self.state.lock().await;
        let mut units: Vec<Unit> = state
            .units
            .values()
            .filter(|u| u.is_active && scope.permits(u.company_id))
            .filter(|u| filter.status.is_none_or(|s| u.status == s))
            .filter(|u| {
                filter
                    .search
                    .as_deref()
                    .is_none_or(|search| u.plot_number.contains(search))
            })
            .cloned()
            .collect();
        units.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(units, pagination))
    }

    async fn find_sale(&self, scope: &TenantScope, id: Uuid) -> Result<Option<Sale>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .sales
            .get(&id)
            .filter(|s| s.is_active && scope.permits(s.company_id))
            .cloned())
    }

    async fn list_sales(
        &self,
        scope: &TenantScope,
        filter: &SaleFilter,
        pagination: Pagination,
    ) -> Result<(Vec<Sale>, i64), AppError> {
        let state = self.state.lock().await;
        let mut sales: Vec<Sale> = state
            .sales
            .values()
            .filter(|s| s.is_active && scope.permits(s.company_id))
            .filter(|s| filter.from.is_none_or(|from| s.created_at >= from))
            .filter(|s| filter.to.is_none_or(|to| s.created_at <= to))
            .cloned()
            .collect();
        sales.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(sales, pagination))
    }

    async fn update_sale_amount(
        &self,
        scope: &TenantScope,
        id: Uuid,
        amount: Decimal,
    ) -> Result<Option<Sale>, AppError> {
        let mut state = self.state.lock().await;
        Ok(state.scoped_sale_mut(scope, id).map(|sale| {
            sale.amount = amount;
            sale.updated_at = Utc::now();
            sale.clone()
        }))
    }

    async fn deactivate_sale(&self, scope: &TenantScope, id: Uuid) -> Result<bool, AppError> {
        let mut state = self.state.lock().await;
        Ok(state
            .scoped_sale_mut(scope, id)
            .map(|sale| {
                sale.is_active = false;
                sale.updated_at = Utc::now();
            })
            .is_some())
    }

    async fn dashboard_summary(&self, scope: &TenantScope) -> Result<DashboardSummary, AppError> {
        let state = self.state.lock().await;
        let mut summary = DashboardSummary {
            total_companies: match scope {
                TenantScope::Unrestricted => {
                    state.companies.values().filter(|c| c.is_active).count() as i64
                }
                TenantScope::Company(_) => 0,
            },
            total_projects: state
                .projects
                .values()
                .filter(|p| p.is_active && scope.permits(p.company_id))
                .count() as i64,
            ..Default::default()
        };

        for unit in state
            .units
            .values()
            .filter(|u| u.is_active && scope.permits(u.company_id))
        {
            summary.total_units += 1;
            match unit.status {
                UnitStatus::Available => summary.available_units += 1,
                UnitStatus::Booked => summary.booked_units += 1,
                UnitStatus::Sold => summary.sold_units += 1,
            }
        }

        for sale in state
            .sales
            .values()
            .filter(|s| s.is_active && scope.permits(s.company_id))
        {
            summary.total_sales_count += 1;
            summary.total_revenue += sale.amount;
        }

        Ok(summary)
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
}

impl StoreTx for MemoryTx {
    async fn find_refresh_token_for_update(
        &mut self,
        token_hash: &str,
    ) -> Result<Option<RefreshToken>, AppError> {
        Ok(self
            .staged
            .refresh_tokens
            .iter()
            .find(|t| t.token_hash == token_hash)
            .cloned())
    }

    async fn find_user_by_id(&mut self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.staged.users.get(&id).cloned())
    }

    async fn deactivate_refresh_token_by_id(&mut self, id: Uuid) -> Result<(), AppError> {
        if let Some(token) = self.staged.refresh_tokens.iter_mut().find(|t| t.id == id) {
            token.is_active = false;
        }
        Ok(())
    }

    async fn deactivate_user_refresh_tokens(&mut self, user_id: Uuid) -> Result<u64, AppError> {
        let mut changed = 0;
        for token in self
            .staged
            .refresh_tokens
            .iter_mut()
            .filter(|t| t.user_id == user_id && t.is_active)
        {
            token.is_active = false;
            changed += 1;
        }
        Ok(changed)
    }

    async fn insert_refresh_token(&mut self, new: NewRefreshToken) -> Result<RefreshToken, AppError> {
        self.staged.insert_refresh_token(new)
    }

    async fn find_unit_for_update(
        &mut self,
        scope: &TenantScope,
        id: Uuid,
    ) -> Result<Option<Unit>, AppError> {
        Ok(self.staged.scoped_unit(scope, id))
    }

    async fn set_unit_status(&mut self, id: Uuid, status: UnitStatus) -> Result<(), AppError> {
        if self.staged.fail_unit_status_writes {
            return Err(anyhow::anyhow!("falha simulada ao gravar o status da unidade").into());
        }
        if let Some(unit) = self.staged.units.get_mut(&id) {
            unit.status = status;
            unit.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn find_booking(&mut self, id: Uuid) -> Result<Option<Booking>, AppError> {
        Ok(self.staged.bookings.get(&id).cloned())
    }

    async fn find_booking_for_update(&mut self, id: Uuid) -> Result<Option<Booking>, AppError> {
        Ok(self.staged.bookings.get(&id).cloned())
    }

    async fn find_active_booking(&mut self, unit_id: Uuid) -> Result<Option<Booking>, AppError> {
        Ok(self
            .staged
            .bookings
            .values()
            .find(|b| b.unit_id == unit_id && b.status == BookingStatus::Active)
            .cloned())
    }

    async fn insert_booking(&mut self, new: NewBooking) -> Result<Booking, AppError> {
        let now = Utc::now();
        let booking = Booking {
            id: Uuid::new_v4(),
            unit_id: new.unit_id,
            agent_id: new.agent_id,
            client_name: new.client_name,
            amount: new.amount,
            status: BookingStatus::Active,
            created_at: now,
            updated_at: now,
        };
        self.staged.bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }

    async fn set_booking_status(
        &mut self,
        id: Uuid,
        status: BookingStatus,
    ) -> Result<Booking, AppError> {
        let booking = self
            .staged
            .bookings
            .get_mut(&id)
            .ok_or(AppError::NotFound("Reserva não encontrada."))?;
        booking.status = status;
        booking.updated_at = Utc::now();
        Ok(booking.clone())
    }

    async fn insert_sale(&mut self, new: NewSale) -> Result<Sale, AppError> {
        // Mesmo papel do UNIQUE (unit_id) da tabela `sales`
        if self.staged.sales.values().any(|s| s.unit_id == new.unit_id) {
            return Err(anyhow::anyhow!("unidade já possui venda").into());
        }
        let now = Utc::now();
        let sale = Sale {
            id: Uuid::new_v4(),
            unit_id: new.unit_id,
            agent_id: new.agent_id,
            company_id: new.company_id,
            amount: new.amount,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.staged.sales.insert(sale.id, sale.clone());
        Ok(sale)
    }

    async fn has_active_sale(&mut self, unit_id: Uuid) -> Result<bool, AppError> {
        Ok(self
            .staged
            .sales
            .values()
            .any(|s| s.unit_id == unit_id && s.is_active))
    }

    async fn deactivate_unit(&mut self, id: Uuid) -> Result<(), AppError> {
        if let Some(unit) = self.staged.units.get_mut(&id) {
            unit.is_active = false;
            unit.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn commit(mut self) -> Result<(), AppError> {
        *self.guard = self.staged;
        Ok(())
    }
}
