// tests/common/mod.rs
#![allow(dead_code)]

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use realty_backend::{
    config::{AppState, Config},
    db::MemoryStore,
    models::{
        auth::{Principal, Role, User},
        realty::{Company, Project, Unit, UnitStatus},
    },
    services::token_service::TokenService,
};
use uuid::Uuid;

pub const PASSWORD: &str = "senha-forte-123";
pub const JWT_SECRET: &str = "segredo-de-teste-com-mais-de-32-bytes!!";

pub fn test_config() -> Config {
    Config {
        database_url: "postgres://localhost/nao-usado".into(),
        jwt_secret: JWT_SECRET.into(),
        access_token_ttl: Duration::minutes(15),
        refresh_token_ttl: Duration::days(7),
        cookie_secure: false,
        db_max_connections: 1,
        db_lock_timeout_ms: 1_000,
        port: 0,
        cors_origins: vec![],
    }
}

pub fn token_service() -> TokenService {
    test_config().token_service()
}

/// Duas empresas, um projeto e uma unidade AVAILABLE em cada, e usuários de todos os papéis.
pub struct Fixture {
    pub store: MemoryStore,
    pub company_a: Uuid,
    pub company_b: Uuid,
    pub project_a: Uuid,
    pub project_b: Uuid,
    pub unit_a: Unit,
    pub unit_b: Unit,
    pub agent_a: User,
    pub admin_a: User,
    pub agent_b: User,
    pub super_admin: User,
}

impl Fixture {
    pub async fn new() -> Self {
        let store = MemoryStore::new();
        let company_a = Uuid::new_v4();
        let company_b = Uuid::new_v4();
        store.insert_company(company(company_a, "Construtora A")).await;
        store.insert_company(company(company_b, "Construtora B")).await;

        let project_a = project(company_a);
        let project_b = project(company_b);
        store.insert_project(project_a.clone()).await;
        store.insert_project(project_b.clone()).await;

        let unit_a = store.seed_unit(unit(project_a.id, "A-01")).await.unwrap();
        let unit_b = store.seed_unit(unit(project_b.id, "B-01")).await.unwrap();

        let agent_a = user("agente.a", Role::Agent, Some(company_a));
        let admin_a = user("admin.a", Role::CompanyAdmin, Some(company_a));
        let agent_b = user("agente.b", Role::Agent, Some(company_b));
        let super_admin = user("super", Role::SuperAdmin, None);
        for u in [&agent_a, &admin_a, &agent_b, &super_admin] {
            store.insert_user(u.clone()).await;
        }

        Self {
            store,
            company_a,
            company_b,
            project_a: project_a.id,
            project_b: project_b.id,
            unit_a,
            unit_b,
            agent_a,
            admin_a,
            agent_b,
            super_admin,
        }
    }

    pub fn app_state(&self) -> AppState<MemoryStore> {
        AppState::new(self.store.clone(), &test_config())
    }

    pub async fn add_unit(&self, company_id: Uuid, plot_number: &str) -> Unit {
        let project = project(company_id);
        self.store.insert_project(project.clone()).await;
        self.store
            .seed_unit(unit(project.id, plot_number))
            .await
            .unwrap()
    }
}

pub fn principal(user: &User) -> Principal {
    Principal {
        id: user.id,
        role: user.role,
        company_id: user.company_id,
    }
}

pub fn user(username: &str, role: Role, company_id: Option<Uuid>) -> User {
    User {
        id: Uuid::new_v4(),
        username: username.into(),
        password_hash: bcrypt::hash(PASSWORD, 4).unwrap(),
        role,
        company_id,
        is_active: true,
        created_at: Utc::now(),
    }
}

pub fn company(id: Uuid, name: &str) -> Company {
    Company {
        id,
        name: name.into(),
        is_active: true,
        created_at: Utc::now(),
    }
}

pub fn project(company_id: Uuid) -> Project {
    Project {
        id: Uuid::new_v4(),
        company_id,
        name: "Residencial Teste".into(),
        is_active: true,
        created_at: Utc::now(),
    }
}

pub fn unit(project_id: Uuid, plot_number: &str) -> Unit {
    let now = Utc::now();
    Unit {
        id: Uuid::new_v4(),
        project_id,
        // Sobrescrito pelo store a partir do projeto
        company_id: Uuid::nil(),
        plot_number: plot_number.into(),
        area: Decimal::new(360, 0),
        price: Decimal::new(180_000, 0),
        status: UnitStatus::Available,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}
