// src/common/error.rs

use std::collections::HashMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::middleware::i18n::Locale;

// Nosso tipo de erro, com `thiserror` para melhor ergonomia.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    // Operação não permitida no status atual do registro
    #[error("Transição inválida: {0}")]
    InvalidState(String),

    // Id ou token desconhecido (ou token já consumido)
    #[error("Recurso não encontrado: {0}")]
    ResourceNotFound(String),

    // Falha transitória do banco (pool esgotado, conexão caiu): vale tentar de novo
    #[error("Dependência indisponível: {0}")]
    DependencyError(String),

    #[error("Erro de banco de dados")]
    DatabaseError(sqlx::Error),

    #[error("Token inválido")]
    InvalidToken,

    #[error("Permissão negada: {0}")]
    Forbidden(String),

    #[error("Erro de JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    // Variante genérica para qualquer outro erro inesperado
    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),
}

// Falhas de conexão viram `DependencyError` (503); o resto é erro do banco (500)
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::WorkerCrashed => AppError::DependencyError(err.to_string()),
            other => AppError::DatabaseError(other),
        }
    }
}

impl AppError {
    /// Monta um `ValidationError` para um único campo.
    pub fn field(field: &'static str, code: &'static str, message: &str) -> Self {
        let mut errors = validator::ValidationErrors::new();
        let mut error = validator::ValidationError::new(code);
        error.message = Some(message.to_string().into());
        errors.add(field, error);
        AppError::ValidationError(errors)
    }

    /// Converte o erro de domínio na resposta HTTP, com a mensagem no idioma pedido.
    pub fn to_api_error(&self, locale: &Locale) -> ApiError {
        let pt = locale.is_portuguese();

        match self {
            AppError::ValidationError(errors) => {
                let mut details: HashMap<String, Vec<String>> = HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages = field_errors
                        .iter()
                        .map(|e| {
                            e.message
                                .as_ref()
                                .map(|m| m.to_string())
                                .unwrap_or_else(|| e.code.to_string())
                        })
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                ApiError {
                    status: StatusCode::BAD_REQUEST,
                    error: pick(pt, "Um ou mais campos são inválidos.", "One or more fields are invalid."),
                    details: Some(json!(details)),
                }
            }
            AppError::InvalidState(message) => ApiError {
                status: StatusCode::CONFLICT,
                error: message.clone(),
                details: None,
            },
            AppError::ResourceNotFound(_) => ApiError {
                status: StatusCode::NOT_FOUND,
                error: pick(pt, "Recurso não encontrado.", "Resource not found."),
                details: None,
            },
            AppError::InvalidToken | AppError::JwtError(_) => ApiError {
                status: StatusCode::UNAUTHORIZED,
                error: pick(
                    pt,
                    "Token de autenticação inválido ou ausente.",
                    "Missing or invalid authentication token.",
                ),
                details: None,
            },
            AppError::Forbidden(permission) => ApiError {
                status: StatusCode::FORBIDDEN,
                error: if pt {
                    format!("Você precisa da permissão '{}' para realizar esta ação.", permission)
                } else {
                    format!("The '{}' permission is required for this action.", permission)
                },
                details: None,
            },
            AppError::DependencyError(reason) => {
                tracing::error!("Dependência indisponível: {}", reason);
                ApiError {
                    status: StatusCode::SERVICE_UNAVAILABLE,
                    error: pick(
                        pt,
                        "Serviço temporariamente indisponível. Tente novamente.",
                        "Service temporarily unavailable. Please try again.",
                    ),
                    details: None,
                }
            }
            AppError::DatabaseError(e) => {
                tracing::error!("Erro de banco de dados: {:?}", e);
                ApiError {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    error: pick(pt, "Ocorreu um erro inesperado.", "An unexpected error occurred."),
                    details: None,
                }
            }
            AppError::InternalServerError(e) => {
                tracing::error!("Erro Interno do Servidor: {:?}", e);
                ApiError {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    error: pick(pt, "Ocorreu um erro inesperado.", "An unexpected error occurred."),
                    details: None,
                }
            }
        }
    }
}

fn pick(pt: bool, pt_message: &str, en_message: &str) -> String {
    if pt { pt_message } else { en_message }.to_string()
}

// Sem `Locale` disponível (ex: middlewares) respondemos em português.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.to_api_error(&Locale::default()).into_response()
    }
}

// O erro já "renderizado" que sai para o cliente HTTP.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub error: String,
    pub details: Option<Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.details {
            Some(details) => json!({ "error": self.error, "details": details }),
            None => json!({ "error": self.error }),
        };
        (self.status, Json(body)).into_response()
    }
}
