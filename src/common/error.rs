use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// SQLSTATEs que indicam conflito de concorrência: o chamador pode repetir a operação.
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";
const LOCK_NOT_AVAILABLE: &str = "55P03";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    // --- Autenticação ---
    // Internamente distintos; externamente todos viram o mesmo 401.
    #[error("Credenciais inválidas")]
    InvalidCredentials,

    #[error("Refresh token inválido ou expirado")]
    InvalidOrExpired,

    /// Efeito colateral intencional: todos os refresh tokens do usuário já foram revogados.
    #[error("Reutilização de refresh token detectada. Todas as sessões foram revogadas.")]
    ReuseDetected,

    #[error("Conta de usuário desativada")]
    UserDisabled,

    #[error("Token de autenticação inválido ou ausente")]
    InvalidToken,

    // --- Ciclo de vida (reservas / vendas) ---
    #[error("{0}")]
    NotFound(&'static str),

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("{0}")]
    InvalidState(&'static str),

    #[error("Reserva já cancelada")]
    AlreadyCancelled,

    #[error("{0}")]
    AlreadyExists(&'static str),

    // --- Infraestrutura ---
    #[error("Conflito de transação concorrente")]
    TransactionConflict(#[source] sqlx::Error),

    #[error("Erro de banco de dados")]
    DatabaseError(#[source] sqlx::Error),

    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),

    #[error("Erro de Bcrypt: {0}")]
    BcryptError(#[from] bcrypt::BcryptError),

    #[error("Erro de JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

// Não usamos `#[from]` aqui: precisamos separar os conflitos "repetíveis" dos demais erros.
impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        let retryable = e
            .as_database_error()
            .and_then(|db_err| db_err.code())
            .is_some_and(|code| {
                matches!(
                    code.as_ref(),
                    SERIALIZATION_FAILURE | DEADLOCK_DETECTED | LOCK_NOT_AVAILABLE
                )
            });

        if retryable {
            AppError::TransactionConflict(e)
        } else {
            AppError::DatabaseError(e)
        }
    }
}

impl AppError {
    /// Código estável do erro, exposto no campo `error` da resposta.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::InvalidCredentials => "INVALID_CREDENTIALS",
            AppError::InvalidOrExpired => "INVALID_OR_EXPIRED",
            AppError::ReuseDetected => "REUSE_DETECTED",
            AppError::UserDisabled => "USER_DISABLED",
            AppError::InvalidToken => "INVALID_TOKEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::InvalidState(_) => "INVALID_STATE",
            AppError::AlreadyCancelled => "ALREADY_CANCELLED",
            AppError::AlreadyExists(_) => "ALREADY_EXISTS",
            AppError::TransactionConflict(_) => "TRANSACTION_CONFLICT",
            AppError::DatabaseError(_)
            | AppError::InternalServerError(_)
            | AppError::BcryptError(_)
            | AppError::JwtError(_) => "INTERNAL",
        }
    }

    /// Falhas de autenticação: nunca revelamos ao cliente qual pré-condição falhou.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            AppError::InvalidCredentials
                | AppError::InvalidOrExpired
                | AppError::ReuseDetected
                | AppError::UserDisabled
                | AppError::InvalidToken
        )
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::TransactionConflict(_))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.is_auth_failure() {
            tracing::debug!(kind = self.kind(), "Falha de autenticação: {}", self);
            let body = Json(json!({
                "error": "UNAUTHORIZED",
                "message": "Não autorizado.",
            }));
            return (StatusCode::UNAUTHORIZED, body).into_response();
        }

        let status = match &self {
            AppError::ValidationError(errors) => {
                let mut details = std::collections::HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                let body = Json(json!({
                    "error": self.kind(),
                    "message": "Um ou mais campos são inválidos.",
                    "details": details,
                }));
                return (StatusCode::BAD_REQUEST, body).into_response();
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::InvalidState(_) | AppError::AlreadyCancelled => StatusCode::BAD_REQUEST,
            AppError::AlreadyExists(_) => StatusCode::CONFLICT,
            AppError::TransactionConflict(e) => {
                tracing::warn!("Conflito de transação (repetível): {}", e);
                StatusCode::CONFLICT
            }

            // DatabaseError, InternalServerError, Bcrypt e JWT viram 500.
            // O detalhe vai só para o log.
            e => {
                tracing::error!("Erro Interno do Servidor: {:?}", e);
                let body = Json(json!({
                    "error": self.kind(),
                    "message": "Ocorreu um erro inesperado.",
                }));
                return (StatusCode::INTERNAL_SERVER_ERROR, body).into_response();
            }
        };

        let message = match &self {
            AppError::TransactionConflict(_) => {
                "Operação conflitou com outra em andamento. Tente novamente.".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({ "error": self.kind(), "message": message }));
        (status, body).into_response()
    }
}
