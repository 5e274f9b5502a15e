// src/services/auth.rs

use std::sync::LazyLock;

use bcrypt::verify;
use chrono::Utc;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{Store, StoreTx},
    models::auth::{LoginOutcome, NewRefreshToken, Principal, Role, TokenPair, User, UserSummary},
    services::token_service::TokenService,
};

// Hash de referência para quando o usuário não existe: o login sempre paga
// o custo de um bcrypt, exista ou não o username.
static DUMMY_PASSWORD_HASH: LazyLock<Option<String>> = LazyLock::new(|| {
    bcrypt::hash("usuario-inexistente", bcrypt::DEFAULT_COST).ok()
});

#[derive(Clone)]
pub struct AuthService<S: Store> {
    store: S,
    tokens: TokenService,
}

impl<S: Store> AuthService<S> {
    pub fn new(store: S, tokens: TokenService) -> Self {
        Self { store, tokens }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub async fn login_user(&self, username: &str, password: &str) -> Result<LoginOutcome, AppError> {
        let user = self.verify_credentials(username, password).await?;
        let tokens = self.issue(user.id, user.role, user.company_id).await?;

        tracing::info!(user_id = %user.id, "🔑 Login efetuado");
        Ok(LoginOutcome {
            tokens,
            user: UserSummary::from(&user),
        })
    }

    /// Usuário inexistente, inativo ou senha errada: sempre `InvalidCredentials`.
    pub async fn verify_credentials(&self, username: &str, password: &str) -> Result<User, AppError> {
        let user = self.store.find_user_by_username(username).await?;

        let password_clone = password.to_owned();
        let password_hash_clone = user
            .as_ref()
            .map(|u| u.password_hash.clone())
            .or_else(|| DUMMY_PASSWORD_HASH.clone());

        // Executa a verificação em um thread separado
        let is_password_valid = tokio::task::spawn_blocking(move || match password_hash_clone {
            Some(hash) => verify(&password_clone, &hash).unwrap_or(false),
            None => false,
        })
        .await
        .map_err(|e| anyhow::anyhow!("Falha na task de verificação de senha: {}", e))?;

        match user {
            Some(user) if user.is_active && is_password_valid => Ok(user),
            _ => Err(AppError::InvalidCredentials),
        }
    }

    /// Emite um novo par e persiste o refresh token (uma linha por emissão).
    pub async fn issue(
        &self,
        user_id: Uuid,
        role: Role,
        company_id: Option<Uuid>,
    ) -> Result<TokenPair, AppError> {
        let access_token = self.tokens.sign_access_token(user_id, role, company_id)?;
        let refresh_token = TokenService::generate_refresh_token();

        self.store
            .insert_refresh_token(NewRefreshToken {
                token_hash: TokenService::hash_refresh_token(&refresh_token),
                user_id,
                company_id,
                expires_at: self.tokens.refresh_token_expiry(Utc::now()),
            })
            .await?;

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Rotaciona um refresh token.
    ///
    /// Apresentar um token já inativo é tratado como roubo: **todos** os tokens
    /// do usuário são revogados (e a revogação é persistida) antes de retornar
    /// `ReuseDetected`. É a única falha com efeito colateral.
    pub async fn refresh(&self, raw_token: &str) -> Result<TokenPair, AppError> {
        let token_hash = TokenService::hash_refresh_token(raw_token);

        let mut tx = self.store.begin().await?;

        // 1. Busca (e trava) a linha do token
        let existing = tx.find_refresh_token_for_update(&token_hash).await?;

        // 2. Reuso: token existe mas já foi rotacionado/revogado
        if let Some(reused) = existing.as_ref().filter(|t| !t.is_active) {
            let revoked = tx.deactivate_user_refresh_tokens(reused.user_id).await?;
            tx.commit().await?;

            tracing::warn!(
                user_id = %reused.user_id,
                revoked,
                "🚨 Reuso de refresh token detectado. Todas as sessões do usuário foram revogadas."
            );
            return Err(AppError::ReuseDetected);
        }

        // 3. Inexistente ou expirado
        let current = match existing {
            Some(token) if token.expires_at >= Utc::now() => token,
            _ => return Err(AppError::InvalidOrExpired),
        };

        // 4. Dono desativado
        let user = match tx.find_user_by_id(current.user_id).await? {
            Some(user) if user.is_active => user,
            _ => {
                tracing::warn!(user_id = %current.user_id, "Refresh recusado: usuário desativado");
                return Err(AppError::UserDisabled);
            }
        };

        // 5. Rotação: desativa o atual, insere o novo, assina o access token, commit
        tx.deactivate_refresh_token_by_id(current.id).await?;

        let refresh_token = TokenService::generate_refresh_token();
        tx.insert_refresh_token(NewRefreshToken {
            token_hash: TokenService::hash_refresh_token(&refresh_token),
            user_id: user.id,
            company_id: current.company_id,
            expires_at: self.tokens.refresh_token_expiry(Utc::now()),
        })
        .await?;

        // Papel e empresa vêm do usuário atual, não do token antigo
        let access_token = self.tokens.sign_access_token(user.id, user.role, user.company_id)?;

        tx.commit().await?;

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Logout: desativa só este token. Idempotente e sem cascata.
    pub async fn logout(&self, raw_token: &str) -> Result<(), AppError> {
        let token_hash = TokenService::hash_refresh_token(raw_token);
        let revoked = self.store.deactivate_refresh_token(&token_hash).await?;
        tracing::debug!(revoked, "Logout processado");
        Ok(())
    }

    /// Perfil do dono do access token. Usuário removido ou desativado = 401.
    pub async fn current_user(&self, principal: &Principal) -> Result<UserSummary, AppError> {
        match self.store.find_user_by_id(principal.id).await? {
            Some(user) if user.is_active => Ok(UserSummary::from(&user)),
            _ => Err(AppError::InvalidToken),
        }
    }

    pub fn validate_token(&self, token: &str) -> Result<Principal, AppError> {
        self.tokens.verify_access_token(token)
    }
}
