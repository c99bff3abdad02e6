// src/handlers/rbac.rs

use axum::{response::IntoResponse, Json};

use crate::models::rbac::{all_permissions, PermissionInfo};

// GET /api/permissions (Para o frontend saber o que mostrar na tela de perfis)
#[utoipa::path(
    get,
    path = "/api/permissions",
    tag = "RBAC",
    responses(
        (status = 200, description = "Permissões do sistema", body = Vec<PermissionInfo>)
    )
)]
pub async fn list_permissions() -> impl IntoResponse {
    Json(all_permissions())
}
