// tests/postgres_store_test.rs
//
// Rodam contra um Postgres real quando `DATABASE_URL` está definido; sem ele,
// cada teste retorna logo no início. Cada teste cria as próprias empresas,
// então podem compartilhar o mesmo banco.

mod common;

use realty_backend::{
    common::{error::AppError, pagination::Pagination},
    db::{PgStore, Store, StoreTx},
    models::{
        auth::{Principal, Role},
        realty::{NewBooking, NewUnit, UnitChanges, UnitFilter, UnitStatus},
        tenancy::TenantScope,
    },
    services::{auth::AuthService, lifecycle_service::LifecycleService},
};
use rust_decimal::Decimal;
use sqlx::{postgres::PgPoolOptions, PgPool};
use uuid::Uuid;

use common::{token_service, PASSWORD};

async fn pg_store(lock_timeout_ms: u64) -> Option<PgStore> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL não definido; teste de Postgres ignorado.");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await
        .unwrap();
    sqlx::migrate!().run(&pool).await.unwrap();

    Some(PgStore::new(pool, lock_timeout_ms))
}

struct Seed {
    company_a: Uuid,
    project_a: Uuid,
    unit_a: Uuid,
    unit_b: Uuid,
    agent_a: Principal,
    admin_a: Principal,
}

async fn insert_company(pool: &PgPool, name: &str) -> Uuid {
    sqlx::query_scalar("INSERT INTO companies (name) VALUES ($1) RETURNING id")
        .bind(name)
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn insert_project(pool: &PgPool, company_id: Uuid) -> Uuid {
    sqlx::query_scalar(
        "INSERT INTO projects (company_id, name) VALUES ($1, 'Residencial Teste') RETURNING id",
    )
    .bind(company_id)
    .fetch_one(pool)
    .await
    .unwrap()
}

async fn insert_unit(pool: &PgPool, project_id: Uuid, plot_number: &str) -> Uuid {
    sqlx::query_scalar(
        r#"
        INSERT INTO units (project_id, plot_number, area, price)
        VALUES ($1, $2, 360, 180000)
        RETURNING id
        "#,
    )
    .bind(project_id)
    .bind(plot_number)
    .fetch_one(pool)
    .await
    .unwrap()
}

async fn insert_user(pool: &PgPool, role: Role, company_id: Uuid) -> Principal {
    let id = sqlx::query_scalar(
        r#"
        INSERT INTO users (username, password_hash, role, company_id)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(format!("usuario.{}", Uuid::new_v4()))
    .bind(bcrypt::hash(PASSWORD, 4).unwrap())
    .bind(role)
    .bind(company_id)
    .fetch_one(pool)
    .await
    .unwrap();

    Principal {
        id,
        role,
        company_id: Some(company_id),
    }
}

async fn seed(pool: &PgPool) -> Seed {
    let company_a = insert_company(pool, "Construtora A").await;
    let company_b = insert_company(pool, "Construtora B").await;
    let project_a = insert_project(pool, company_a).await;
    let project_b = insert_project(pool, company_b).await;

    Seed {
        company_a,
        project_a,
        unit_a: insert_unit(pool, project_a, "A-01").await,
        unit_b: insert_unit(pool, project_b, "B-01").await,
        agent_a: insert_user(pool, Role::Agent, company_a).await,
        admin_a: insert_user(pool, Role::CompanyAdmin, company_a).await,
    }
}

fn amount(value: i64) -> Decimal {
    Decimal::new(value, 0)
}

#[tokio::test]
async fn company_scope_is_bound_in_every_unit_query() {
    let Some(store) = pg_store(1_000).await else {
        return;
    };
    let seed = seed(store.pool()).await;
    let scope_a = TenantScope::Company(seed.company_a);

    assert!(store.find_unit(&scope_a, seed.unit_b).await.unwrap().is_none());
    assert!(store
        .find_unit(&TenantScope::Unrestricted, seed.unit_b)
        .await
        .unwrap()
        .is_some());

    let mut tx = store.begin().await.unwrap();
    assert!(tx
        .find_unit_for_update(&scope_a, seed.unit_b)
        .await
        .unwrap()
        .is_none());
    drop(tx);

    let (units, total) = store
        .list_units(&scope_a, &UnitFilter::default(), Pagination::default())
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(units[0].id, seed.unit_a);
    assert_eq!(units[0].company_id, seed.company_a);

    let missing = UnitFilter {
        search: Some("B-01".into()),
        ..Default::default()
    };
    let (_, total) = store
        .list_units(&scope_a, &missing, Pagination::default())
        .await
        .unwrap();
    assert_eq!(total, 0);

    let changes = UnitChanges {
        price: Some(amount(1)),
        ..Default::default()
    };
    assert!(store
        .update_unit(&scope_a, seed.unit_b, &changes)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn locked_unit_times_out_as_transaction_conflict() {
    let Some(store) = pg_store(100).await else {
        return;
    };
    let seed = seed(store.pool()).await;

    let mut holder = store.begin().await.unwrap();
    assert!(holder
        .find_unit_for_update(&TenantScope::Unrestricted, seed.unit_a)
        .await
        .unwrap()
        .is_some());

    let mut waiter = store.begin().await.unwrap();
    let result = waiter
        .find_unit_for_update(&TenantScope::Unrestricted, seed.unit_a)
        .await;
    assert!(matches!(result, Err(AppError::TransactionConflict(_))));
    drop(waiter);

    // Leitura sem trava não espera
    assert!(store
        .find_unit(&TenantScope::Company(seed.company_a), seed.unit_a)
        .await
        .unwrap()
        .is_some());

    // FOR UPDATE OF u: a linha do projeto continua livre
    let mut other = store.pool().begin().await.unwrap();
    sqlx::query("SET LOCAL lock_timeout = '100ms'")
        .execute(&mut *other)
        .await
        .unwrap();
    sqlx::query("SELECT id FROM projects WHERE id = $1 FOR UPDATE")
        .bind(seed.project_a)
        .fetch_one(&mut *other)
        .await
        .unwrap();
    drop(other);

    holder.commit().await.unwrap();
}

#[tokio::test]
async fn dropped_transaction_persists_nothing() {
    let Some(store) = pg_store(1_000).await else {
        return;
    };
    let seed = seed(store.pool()).await;

    let mut tx = store.begin().await.unwrap();
    tx.find_unit_for_update(&TenantScope::Unrestricted, seed.unit_a)
        .await
        .unwrap();
    tx.insert_booking(NewBooking {
        unit_id: seed.unit_a,
        agent_id: seed.agent_a.id,
        client_name: "Maria Silva".into(),
        amount: amount(50_000),
    })
    .await
    .unwrap();
    drop(tx);

    let bookings: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bookings WHERE unit_id = $1")
        .bind(seed.unit_a)
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(bookings, 0);

    let unit = store
        .find_unit(&TenantScope::Unrestricted, seed.unit_a)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(unit.status, UnitStatus::Available);
}

#[tokio::test]
async fn lifecycle_runs_end_to_end_on_postgres() {
    let Some(store) = pg_store(1_000).await else {
        return;
    };
    let seed = seed(store.pool()).await;
    let lifecycle = LifecycleService::new(store.clone());

    lifecycle
        .create_booking(&seed.agent_a, seed.unit_a, "Maria Silva", amount(50_000))
        .await
        .unwrap();
    let sale = lifecycle
        .create_sale(&seed.agent_a, seed.unit_a, amount(90_000))
        .await
        .unwrap();
    assert_eq!(sale.company_id, seed.company_a);

    assert!(matches!(
        lifecycle
            .create_sale(&seed.agent_a, seed.unit_a, amount(90_000))
            .await,
        Err(AppError::InvalidState(_))
    ));
    assert!(matches!(
        lifecycle.delete_unit(&seed.admin_a, seed.unit_a).await,
        Err(AppError::InvalidState(_))
    ));
    assert_eq!(
        lifecycle.get_unit(&seed.agent_a, seed.unit_a).await.unwrap().status,
        UnitStatus::Sold
    );

    // Número de lote repetido no mesmo projeto
    let duplicate = NewUnit {
        project_id: seed.project_a,
        plot_number: "A-01".into(),
        area: amount(360),
        price: amount(180_000),
    };
    assert!(matches!(
        lifecycle.create_unit(&seed.admin_a, duplicate).await,
        Err(AppError::AlreadyExists(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_refresh_rotates_once_and_flags_the_other_as_reuse() {
    let Some(store) = pg_store(5_000).await else {
        return;
    };
    let seed = seed(store.pool()).await;
    let auth = AuthService::new(store.clone(), token_service());

    let pair = auth
        .issue(seed.agent_a.id, Role::Agent, Some(seed.company_a))
        .await
        .unwrap();

    let (first, second) = tokio::join!(
        auth.refresh(&pair.refresh_token),
        auth.refresh(&pair.refresh_token)
    );

    let outcomes = [first, second];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        outcomes
            .iter()
            .filter(|r| matches!(r, Err(AppError::ReuseDetected)))
            .count(),
        1
    );

    // A detecção de reuso revoga inclusive o token recém-emitido
    let active: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM refresh_tokens WHERE user_id = $1 AND is_active",
    )
    .bind(seed.agent_a.id)
    .fetch_one(store.pool())
    .await
    .unwrap();
    assert_eq!(active, 0);
}
