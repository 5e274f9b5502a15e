// src/models/realty.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::auth::Role;

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "unit_status", rename_all = "SCREAMING_SNAKE_CASE")] // Banco
#[serde(rename_all = "SCREAMING_SNAKE_CASE")] // JSON
pub enum UnitStatus {
    Available,
    Booked,
    Sold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "booking_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Active,
    Cancelled,
}

// --- Transições da unidade ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitTransition {
    Book,
    CancelBooking,
    Sell,
}

/// (transição, estado de origem, estado de destino). Nada sai de SOLD.
pub const UNIT_TRANSITIONS: [(UnitTransition, UnitStatus, UnitStatus); 3] = [
    (UnitTransition::Book, UnitStatus::Available, UnitStatus::Booked),
    (UnitTransition::CancelBooking, UnitStatus::Booked, UnitStatus::Available),
    (UnitTransition::Sell, UnitStatus::Booked, UnitStatus::Sold),
];

impl UnitTransition {
    /// Estado de destino, se a transição for permitida a partir de `from`.
    pub fn next(self, from: UnitStatus) -> Option<UnitStatus> {
        UNIT_TRANSITIONS
            .iter()
            .find(|(transition, source, _)| *transition == self && *source == from)
            .map(|(_, _, target)| *target)
    }

    /// SUPER_ADMIN pode cancelar, mas não reservar nem vender.
    pub fn permits_role(self, role: Role) -> bool {
        match self {
            UnitTransition::Book | UnitTransition::Sell => role != Role::SuperAdmin,
            UnitTransition::CancelBooking => true,
        }
    }
}

/// Cadastro e manutenção de unidades: só administradores.
pub fn can_manage_units(role: Role) -> bool {
    matches!(role, Role::SuperAdmin | Role::CompanyAdmin)
}

// --- Entidades ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub id: Uuid,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

// Colaborador: o CRUD de projetos fica fora deste serviço, mas o escopo da unidade vem dele.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Uuid,
    pub company_id: Uuid,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

// A unidade vendável (o "lote"). `company_id` vem do JOIN com `projects`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    pub id: Uuid,
    pub project_id: Uuid,
    pub company_id: Uuid,
    pub plot_number: String,
    pub area: Decimal,
    pub price: Decimal,
    pub status: UnitStatus,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: Uuid,
    pub unit_id: Uuid,
    pub agent_id: Uuid,
    pub client_name: String,
    pub amount: Decimal,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    pub id: Uuid,
    pub unit_id: Uuid,
    pub agent_id: Uuid,
    pub company_id: Uuid,
    pub amount: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// --- Inserções / alterações ---

#[derive(Debug, Clone)]
pub struct NewUnit {
    pub project_id: Uuid,
    pub plot_number: String,
    pub area: Decimal,
    pub price: Decimal,
}

// Campos ausentes ficam como estão
#[derive(Debug, Clone, Default)]
pub struct UnitChanges {
    pub plot_number: Option<String>,
    pub area: Option<Decimal>,
    pub price: Option<Decimal>,
}

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub unit_id: Uuid,
    pub agent_id: Uuid,
    pub client_name: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone)]
pub struct NewSale {
    pub unit_id: Uuid,
    pub agent_id: Uuid,
    pub company_id: Uuid,
    pub amount: Decimal,
}

// --- Filtros de listagem ---

#[derive(Debug, Clone, Default)]
pub struct UnitFilter {
    pub status: Option<UnitStatus>,
    /// Trecho do número do lote (case-sensitive).
    pub search: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SaleFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_table_matches_lifecycle() {
        use UnitStatus::*;
        use UnitTransition::*;

        assert_eq!(Book.next(Available), Some(Booked));
        assert_eq!(Book.next(Booked), None);
        assert_eq!(Book.next(Sold), None);

        assert_eq!(CancelBooking.next(Booked), Some(Available));
        assert_eq!(CancelBooking.next(Available), None);
        assert_eq!(CancelBooking.next(Sold), None);

        assert_eq!(Sell.next(Booked), Some(Sold));
        assert_eq!(Sell.next(Available), None);
        assert_eq!(Sell.next(Sold), None);
    }

    #[test]
    fn sold_is_terminal() {
        for (_, source, _) in UNIT_TRANSITIONS {
            assert_ne!(source, UnitStatus::Sold);
        }
    }

    #[test]
    fn super_admin_cannot_book_or_sell() {
        assert!(!UnitTransition::Book.permits_role(Role::SuperAdmin));
        assert!(!UnitTransition::Sell.permits_role(Role::SuperAdmin));
        assert!(UnitTransition::CancelBooking.permits_role(Role::SuperAdmin));
        assert!(UnitTransition::Book.permits_role(Role::Agent));
        assert!(UnitTransition::Sell.permits_role(Role::CompanyAdmin));
    }

    #[test]
    fn only_admins_manage_units() {
        assert!(can_manage_units(Role::SuperAdmin));
        assert!(can_manage_units(Role::CompanyAdmin));
        assert!(!can_manage_units(Role::Agent));
    }
}
