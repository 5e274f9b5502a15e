// src/models/tenancy.rs

use uuid::Uuid;

use crate::models::auth::{Principal, Role};

/// O recorte de dados que um principal pode ver/alterar.
///
/// Toda consulta sobre dados de empresa recebe um `&TenantScope`; nenhum
/// repositório monta o filtro por conta própria.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenantScope {
    /// SUPER_ADMIN: enxerga todas as empresas.
    Unrestricted,
    /// Demais papéis: apenas a própria empresa.
    Company(Uuid),
}

impl TenantScope {
    pub fn for_principal(principal: &Principal) -> Self {
        match (principal.role, principal.company_id) {
            (Role::SuperAdmin, _) => TenantScope::Unrestricted,
            (_, Some(company_id)) => TenantScope::Company(company_id),
            // Usuário de empresa sem empresa: não enxerga nada
            (_, None) => TenantScope::Company(Uuid::nil()),
        }
    }

    /// Valor para o bind `($n::uuid IS NULL OR <coluna> = $n)` nas queries SQL.
    pub fn company_id(&self) -> Option<Uuid> {
        match self {
            TenantScope::Unrestricted => None,
            TenantScope::Company(id) => Some(*id),
        }
    }

    pub fn permits(&self, company_id: Uuid) -> bool {
        match self {
            TenantScope::Unrestricted => true,
            TenantScope::Company(id) => *id == company_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(role: Role, company_id: Option<Uuid>) -> Principal {
        Principal { id: Uuid::new_v4(), role, company_id }
    }

    #[test]
    fn super_admin_is_unrestricted() {
        let scope = TenantScope::for_principal(&principal(Role::SuperAdmin, None));
        assert_eq!(scope, TenantScope::Unrestricted);
        assert_eq!(scope.company_id(), None);
        assert!(scope.permits(Uuid::new_v4()));
    }

    #[test]
    fn company_roles_are_restricted_to_their_company() {
        let c1 = Uuid::new_v4();
        let c2 = Uuid::new_v4();

        for role in [Role::CompanyAdmin, Role::Agent] {
            let scope = TenantScope::for_principal(&principal(role, Some(c1)));
            assert_eq!(scope, TenantScope::Company(c1));
            assert_eq!(scope.company_id(), Some(c1));
            assert!(scope.permits(c1));
            assert!(!scope.permits(c2));
        }
    }

    #[test]
    fn company_role_without_company_sees_nothing() {
        let scope = TenantScope::for_principal(&principal(Role::Agent, None));
        assert!(!scope.permits(Uuid::new_v4()));
    }
}
