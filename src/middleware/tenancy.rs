// src/middleware/tenancy.rs

use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::common::error::AppError;

// O nome do nosso cabeçalho HTTP customizado
pub const TENANT_ID_HEADER: &str = "x-tenant-id";

// A construtora (tenant) dona das visitas acessadas na requisição.
#[derive(Debug, Clone, Copy)]
pub struct TenantContext(pub Uuid);

impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts.headers.get(TENANT_ID_HEADER).ok_or_else(|| {
            AppError::field(TENANT_ID_HEADER, "required", "O cabeçalho X-Tenant-ID é obrigatório.")
        })?;

        // Precisa ser texto e um UUID válido
        value
            .to_str()
            .ok()
            .and_then(|s| Uuid::parse_str(s.trim()).ok())
            .map(TenantContext)
            .ok_or_else(|| {
                AppError::field(
                    TENANT_ID_HEADER,
                    "invalid_uuid",
                    "Cabeçalho X-Tenant-ID inválido (não é um UUID).",
                )
            })
    }
}
