// src/config.rs

use anyhow::{anyhow, Context};
use chrono::Duration;
use std::{env, str::FromStr};

use crate::{
    db::{PgStore, Store},
    services::{
        auth::AuthService, dashboard_service::DashboardService,
        lifecycle_service::LifecycleService, token_service::TokenService,
    },
};

const MIN_JWT_SECRET_LEN: usize = 32;
const DEFAULT_CORS_ORIGINS: &str = "http://localhost:5173,http://localhost:3000,http://localhost:4173";

// Configuração lida do ambiente (.env em desenvolvimento)
#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub cookie_secure: bool,
    pub db_max_connections: u32,
    pub db_lock_timeout_ms: u64,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL").context("DATABASE_URL deve ser definida")?;
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET deve ser definido")?;
        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(anyhow!(
                "JWT_SECRET deve ter no mínimo {} bytes",
                MIN_JWT_SECRET_LEN
            ));
        }

        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| DEFAULT_CORS_ORIGINS.to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        Ok(Self {
            database_url,
            jwt_secret,
            access_token_ttl: Duration::minutes(env_or("JWT_ACCESS_TTL_MINUTES", 15)?),
            refresh_token_ttl: Duration::days(env_or("REFRESH_TOKEN_TTL_DAYS", 7)?),
            cookie_secure: env_or("COOKIE_SECURE", true)?,
            db_max_connections: env_or("DB_MAX_CONNECTIONS", 5)?,
            db_lock_timeout_ms: env_or("DB_LOCK_TIMEOUT_MS", 5_000)?,
            port: env_or("PORT", 5000)?,
            cors_origins,
        })
    }

    pub fn token_service(&self) -> TokenService {
        TokenService::new(
            self.jwt_secret.clone(),
            self.access_token_ttl,
            self.refresh_token_ttl,
        )
    }
}

// Lê uma variável opcional; se presente, precisa ser válida.
fn env_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("{} inválida ({:?}): {}", key, raw, e)),
        Err(_) => Ok(default),
    }
}

// O estado compartilhado que será acessível em toda a aplicação
#[derive(Clone)]
pub struct AppState<S: Store = PgStore> {
    pub auth_service: AuthService<S>,
    pub lifecycle_service: LifecycleService<S>,
    pub dashboard_service: DashboardService<S>,
    pub cookie_secure: bool,
}

impl<S: Store> AppState<S> {
    // --- Monta o gráfico de dependências ---
    pub fn new(store: S, config: &Config) -> Self {
        Self {
            auth_service: AuthService::new(store.clone(), config.token_service()),
            lifecycle_service: LifecycleService::new(store.clone()),
            dashboard_service: DashboardService::new(store),
            cookie_secure: config.cookie_secure,
        }
    }
}
