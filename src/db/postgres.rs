// src/db/postgres.rs

use rust_decimal::Decimal;
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, Transaction};
use std::time::Duration;
use uuid::Uuid;

use crate::{
    common::{error::AppError, pagination::Pagination},
    config::Config,
    db::store::{Store, StoreTx},
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

const DUPLICATE_PLOT_NUMBER: &str = "Já existe uma unidade com este número neste projeto.";

// UNIQUE (project_id, plot_number) vira um erro de negócio; o resto segue o `From<sqlx::Error>`
fn map_unit_write_error(e: sqlx::Error) -> AppError {
    if let Some(db_err) = e.as_database_error() {
        if db_err.is_unique_violation() {
            return AppError::AlreadyExists(DUPLICATE_PLOT_NUMBER);
        }
    }
    e.into()
}

// A unidade sempre é lida com o `company_id` do projeto (chave de partição do tenant).
const UNIT_SELECT: &str = r#"
    SELECT u.id, u.project_id, p.company_id, u.plot_number, u.area, u.price, u.status,
           u.is_active, u.created_at, u.updated_at
    FROM units u
    JOIN projects p ON p.id = u.project_id
"#;

// Repositório Postgres. Cada método é uma query; as transações ficam em `PgTx`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    lock_timeout_ms: u64,
}

impl PgStore {
    pub fn new(pool: PgPool, lock_timeout_ms: u64) -> Self {
        Self { pool, lock_timeout_ms }
    }

    /// Conecta ao banco de dados usando as configurações carregadas do ambiente.
    pub async fn connect(config: &Config) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await?; // <-- Se falhar, retorna um Err em vez de dar panic

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");
        Ok(Self::new(pool, config.db_lock_timeout_ms))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl Store for PgStore {
    type Tx = PgTx;

    async fn begin(&self) -> Result<PgTx, AppError> {
        let mut tx = self.pool.begin().await?;

        // Nenhuma transação espera indefinidamente por um lock:
        // estourar o tempo vira 55P03 -> AppError::TransactionConflict
        sqlx::query("SELECT set_config('lock_timeout', $1, true)")
            .bind(format!("{}ms", self.lock_timeout_ms))
            .execute(&mut *tx)
            .await?;

        Ok(PgTx { tx })
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn insert_refresh_token(&self, new: NewRefreshToken) -> Result<RefreshToken, AppError> {
        insert_refresh_token(&self.pool, new).await
    }

    async fn deactivate_refresh_token(&self, token_hash: &str) -> Result<u64, AppError> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET is_active = FALSE WHERE token_hash = $1 AND is_active",
        )
        .bind(token_hash)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn find_unit(&self, scope: &TenantScope, id: Uuid) -> Result<Option<Unit>, AppError> {
        let sql = format!(
            "{UNIT_SELECT} WHERE u.id = $1 AND u.is_active AND ($2::uuid IS NULL OR p.company_id = $2)"
        );
        let unit = sqlx::query_as::<_, Unit>(&sql)
            .bind(id)
            .bind(scope.company_id())
            .fetch_optional(&self.pool)
            .await?;
        Ok(unit)
    }

    async fn find_project(
        &self,
        scope: &TenantScope,
        id: Uuid,
    ) -> Result<Option<Project>, AppError> {
        let project = sqlx::query_as::<_, Project>(
            r#"
            SELECT * FROM projects
            WHERE id = $1 AND is_active AND ($2::uuid IS NULL OR company_id = $2)
            "#,
        )
        .bind(id)
        .bind(scope.company_id())
        .fetch_optional(&self.pool)
        .await?;
        Ok(project)
    }

    async fn insert_unit(&self, new: NewUnit) -> Result<Unit, AppError> {
        sqlx::query_as::<_, Unit>(
            r#"
            WITH u AS (
                INSERT INTO units (project_id, plot_number, area, price)
                VALUES ($1, $2, $3, $4)
                RETURNING *
            )
            SELECT u.id, u.project_id, p.company_id, u.plot_number, u.area, u.price, u.status,
                   u.is_active, u.created_at, u.updated_at
            FROM u
            JOIN projects p ON p.id = u.project_id
            "#,
        )
        .bind(new.project_id)
        .bind(new.plot_number)
        .bind(new.area)
        .bind(new.price)
        .fetch_one(&self.pool)
        .await
        .map_err(map_unit_write_error)
    }

    async fn update_unit(
        &self,
        scope: &TenantScope,
        id: Uuid,
        changes: &UnitChanges,
    ) -> Result<Option<Unit>, AppError> {
        sqlx::query_as::<_, Unit>(
            r#"
            UPDATE units u
            SET plot_number = COALESCE($3, u.plot_number),
                area        = COALESCE($4, u.area),
                price       = COALESCE($5, u.price),
                updated_at  = now()
            FROM projects p
            WHERE p.id = u.project_id
              AND u.id = $1 AND u.is_active
              AND ($2::uuid IS NULL OR p.company_id = $2)
            RETURNING u.id, u.project_id, p.company_id, u.plot_number, u.area, u.price, u.status,
                      u.is_active, u.created_at, u.updated_at
            "#,
        )
        .bind(id)
        .bind(scope.company_id())
        .bind(changes.plot_number.as_deref())
        .bind(changes.area)
        .bind(changes.price)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_unit_write_error)
    }

    async fn list_units(
        &self,
        scope: &TenantScope,
        filter: &UnitFilter,
        pagination: Pagination,
    ) -> Result<(Vec<Unit>, i64), AppError> {
        const WHERE: &str = r#"
            WHERE u.is_active
              AND ($1::uuid IS NULL OR p.company_id = $1)
              AND ($2::unit_status IS NULL OR u.status = $2)
              AND ($3::text IS NULL OR strpos(u.plot_number, $3) > 0)
        "#;

        let sql = format!("{UNIT_SELECT} {WHERE} ORDER BY u.created_at DESC LIMIT $4 OFFSET $5");
        let units = sqlx::query_as::<_, Unit>(&sql)
            .bind(scope.company_id())
            .bind(filter.status)
            .bind(filter.search.as_deref())
            .bind(pagination.limit)
            .bind(pagination.offset())
            .fetch_all(&self.pool)
            .await?;

        let count_sql =
            format!("SELECT COUNT(*) FROM units u JOIN projects p ON p.id = u.project_id {WHERE}");
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(scope.company_id())
            .bind(filter.status)
            .bind(filter.search.as_deref())
            .fetch_one(&self.pool)
            .await?;

        Ok((units, total))
    }

    async fn find_sale(&self, scope: &TenantScope, id: Uuid) -> Result<Option<Sale>, AppError> {
        let sale = sqlx::query_as::<_, Sale>(
            r#"
            SELECT * FROM sales
            WHERE id = $1 AND is_active AND ($2::uuid IS NULL OR company_id = $2)
            "#,
        )
        .bind(id)
        .bind(scope.company_id())
        .fetch_optional(&self.pool)
        .await?;
        Ok(sale)
    }

    async fn list_sales(
        &self,
        scope: &TenantScope,
        filter: &SaleFilter,
        pagination: Pagination,
    ) -> Result<(Vec<Sale>, i64), AppError> {
        const WHERE: &str = r#"
            WHERE is_active
              AND ($1::uuid IS NULL OR company_id = $1)
              AND ($2::timestamptz IS NULL OR created_at >= $2)
              AND ($3::timestamptz IS NULL OR created_at <= $3)
        "#;

        let sql = format!("SELECT * FROM sales {WHERE} ORDER BY created_at DESC LIMIT $4 OFFSET $5");
        let sales = sqlx::query_as::<_, Sale>(&sql)
            .bind(scope.company_id())
            .bind(filter.from)
            .bind(filter.to)
            .bind(pagination.limit)
            .bind(pagination.offset())
            .fetch_all(&self.pool)
            .await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM sales {WHERE}"))
            .bind(scope.company_id())
            .bind(filter.from)
            .bind(filter.to)
            .fetch_one(&self.pool)
            .await?;

        Ok((sales, total))
    }

    async fn update_sale_amount(
        &self,
        scope: &TenantScope,
        id: Uuid,
        amount: Decimal,
    ) -> Result<Option<Sale>, AppError> {
        let sale = sqlx::query_as::<_, Sale>(
            r#"
            UPDATE sales SET amount = $3, updated_at = now()
            WHERE id = $1 AND is_active AND ($2::uuid IS NULL OR company_id = $2)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(scope.company_id())
        .bind(amount)
        .fetch_optional(&self.pool)
        .await?;
        Ok(sale)
    }

    async fn deactivate_sale(&self, scope: &TenantScope, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE sales SET is_active = FALSE, updated_at = now()
            WHERE id = $1 AND is_active AND ($2::uuid IS NULL OR company_id = $2)
            "#,
        )
        .bind(id)
        .bind(scope.company_id())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn dashboard_summary(&self, scope: &TenantScope) -> Result<DashboardSummary, AppError> {
        let company_id = scope.company_id();

        let total_companies: i64 = match scope {
            TenantScope::Unrestricted => {
                sqlx::query_scalar("SELECT COUNT(*) FROM companies WHERE is_active")
                    .fetch_one(&self.pool)
                    .await?
            }
            TenantScope::Company(_) => 0,
        };

        let total_projects: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM projects WHERE is_active AND ($1::uuid IS NULL OR company_id = $1)",
        )
        .bind(company_id)
        .fetch_one(&self.pool)
        .await?;

        // Uma única varredura para os quatro contadores de unidades
        let (total_units, available_units, booked_units, sold_units): (i64, i64, i64, i64) =
            sqlx::query_as(
                r#"
                SELECT
                    COUNT(*),
                    COUNT(*) FILTER (WHERE u.status = 'AVAILABLE'),
                    COUNT(*) FILTER (WHERE u.status = 'BOOKED'),
                    COUNT(*) FILTER (WHERE u.status = 'SOLD')
                FROM units u
                JOIN projects p ON p.id = u.project_id
                WHERE u.is_active AND ($1::uuid IS NULL OR p.company_id = $1)
                "#,
            )
            .bind(company_id)
            .fetch_one(&self.pool)
            .await?;

        let (total_sales_count, total_revenue): (i64, Decimal) = sqlx::query_as(
            r#"
            SELECT COUNT(*), COALESCE(SUM(amount), 0)
            FROM sales
            WHERE is_active AND ($1::uuid IS NULL OR company_id = $1)
            "#,
        )
        .bind(company_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(DashboardSummary {
            total_companies,
            total_projects,
            total_units,
            available_units,
            booked_units,
            sold_units,
            total_sales_count,
            total_revenue,
        })
    }
}

async fn insert_refresh_token<'e, E>(executor: E, new: NewRefreshToken) -> Result<RefreshToken, AppError>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let token = sqlx::query_as::<_, RefreshToken>(
        r#"
        INSERT INTO refresh_tokens (token_hash, user_id, company_id, expires_at)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(new.token_hash)
    .bind(new.user_id)
    .bind(new.company_id)
    .bind(new.expires_at)
    .fetch_one(executor)
    .await?;
    Ok(token)
}

// Transação Postgres (READ COMMITTED + travas de linha com FOR UPDATE).
// Se for solta sem commit, o sqlx faz rollback automático.
pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

impl StoreTx for PgTx {
    async fn find_refresh_token_for_update(
        &mut self,
        token_hash: &str,
    ) -> Result<Option<RefreshToken>, AppError> {
        // Uma segunda rotação concorrente espera aqui e depois enxerga is_active = false
        let token = sqlx::query_as::<_, RefreshToken>(
            "SELECT * FROM refresh_tokens WHERE token_hash = $1 FOR UPDATE",
        )
        .bind(token_hash)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(token)
    }

    async fn find_user_by_id(&mut self, id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(user)
    }

    async fn deactivate_refresh_token_by_id(&mut self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE refresh_tokens SET is_active = FALSE WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn deactivate_user_refresh_tokens(&mut self, user_id: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET is_active = FALSE WHERE user_id = $1 AND is_active",
        )
        .bind(user_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected())
    }

    async fn insert_refresh_token(&mut self, new: NewRefreshToken) -> Result<RefreshToken, AppError> {
        insert_refresh_token(&mut *self.tx, new).await
    }

    async fn find_unit_for_update(
        &mut self,
        scope: &TenantScope,
        id: Uuid,
    ) -> Result<Option<Unit>, AppError> {
        let sql = format!(
            "{UNIT_SELECT} WHERE u.id = $1 AND u.is_active AND ($2::uuid IS NULL OR p.company_id = $2) FOR UPDATE OF u"
        );
        let unit = sqlx::query_as::<_, Unit>(&sql)
            .bind(id)
            .bind(scope.company_id())
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(unit)
    }

    async fn set_unit_status(&mut self, id: Uuid, status: UnitStatus) -> Result<(), AppError> {
        sqlx::query("UPDATE units SET status = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn find_booking(&mut self, id: Uuid) -> Result<Option<Booking>, AppError> {
        let booking = sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(booking)
    }

    async fn find_booking_for_update(&mut self, id: Uuid) -> Result<Option<Booking>, AppError> {
        let booking =
            sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *self.tx)
                .await?;
        Ok(booking)
    }

    async fn find_active_booking(&mut self, unit_id: Uuid) -> Result<Option<Booking>, AppError> {
        let booking = sqlx::query_as::<_, Booking>(
            "SELECT * FROM bookings WHERE unit_id = $1 AND status = 'ACTIVE' FOR UPDATE",
        )
        .bind(unit_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(booking)
    }

    async fn insert_booking(&mut self, new: NewBooking) -> Result<Booking, AppError> {
        let booking = sqlx::query_as::<_, Booking>(
            r#"
            INSERT INTO bookings (unit_id, agent_id, client_name, amount, status)
            VALUES ($1, $2, $3, $4, 'ACTIVE')
            RETURNING *
            "#,
        )
        .bind(new.unit_id)
        .bind(new.agent_id)
        .bind(new.client_name)
        .bind(new.amount)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(booking)
    }

    async fn set_booking_status(
        &mut self,
        id: Uuid,
        status: BookingStatus,
    ) -> Result<Booking, AppError> {
        let booking = sqlx::query_as::<_, Booking>(
            "UPDATE bookings SET status = $2, updated_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(status)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(booking)
    }

    async fn insert_sale(&mut self, new: NewSale) -> Result<Sale, AppError> {
        let sale = sqlx::query_as::<_, Sale>(
            r#"
            INSERT INTO sales (unit_id, agent_id, company_id, amount)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(new.unit_id)
        .bind(new.agent_id)
        .bind(new.company_id)
        .bind(new.amount)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(sale)
    }

    async fn has_active_sale(&mut self, unit_id: Uuid) -> Result<bool, AppError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM sales WHERE unit_id = $1 AND is_active)",
        )
        .bind(unit_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(exists)
    }

    async fn deactivate_unit(&mut self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE units SET is_active = FALSE, updated_at = now() WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn commit(self) -> Result<(), AppError> {
        self.tx.commit().await?;
        Ok(())
    }
}
