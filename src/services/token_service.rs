// src/services/token_service.rs

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::auth::{Claims, Principal, Role},
};

// 64 bytes = 512 bits de entropia por refresh token
const REFRESH_TOKEN_BYTES: usize = 64;

/// Emissor de tokens: access token JWT (HS256, sem estado) e refresh token opaco.
#[derive(Clone)]
pub struct TokenService {
    jwt_secret: String,
    access_token_ttl: Duration,
    refresh_token_ttl: Duration,
}

impl TokenService {
    pub fn new(jwt_secret: String, access_token_ttl: Duration, refresh_token_ttl: Duration) -> Self {
        Self {
            jwt_secret,
            access_token_ttl,
            refresh_token_ttl,
        }
    }

    pub fn refresh_token_ttl(&self) -> Duration {
        self.refresh_token_ttl
    }

    pub fn refresh_token_expiry(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + self.refresh_token_ttl
    }

    pub fn sign_access_token(
        &self,
        user_id: Uuid,
        role: Role,
        company_id: Option<Uuid>,
    ) -> Result<String, AppError> {
        let now = Utc::now();
        let expires_at = now + self.access_token_ttl;

        let claims = Claims {
            sub: user_id,
            role,
            company_id,
            exp: expires_at.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        Ok(encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_ref()),
        )?)
    }

    /// Verifica assinatura + expiração. Não consulta o banco.
    pub fn verify_access_token(&self, token: &str) -> Result<Principal, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_ref()),
            &validation,
        )
        .map_err(|_| AppError::InvalidToken)?;

        Ok(token_data.claims.into())
    }

    pub fn generate_refresh_token() -> String {
        let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }

    /// O que fica no banco: SHA-256 do token bruto, em hex.
    pub fn hash_refresh_token(raw: &str) -> String {
        hex::encode(Sha256::digest(raw.as_bytes()))
    }
}
