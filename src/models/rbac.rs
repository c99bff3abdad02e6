// src/models/rbac.rs

use serde::Serialize;
use utoipa::ToSchema;

// Permissão do sistema. Cada guardião (`PermissionDef`) registra a sua
// com `inventory::submit!`, e a lista completa sai de `all_permissions()`.
#[derive(Debug, Clone, Copy)]
pub struct Permission {
    pub slug: &'static str,
    pub description: &'static str,
}

inventory::collect!(Permission);

// O que o frontend recebe em GET /api/permissions
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PermissionInfo {
    #[schema(example = "feedback:archive")]
    pub slug: String,
    #[schema(example = "Arquivar feedbacks de visita")]
    pub description: String,
}

pub fn all_permissions() -> Vec<PermissionInfo> {
    let mut permissions: Vec<PermissionInfo> = inventory::iter::<Permission>
        .into_iter()
        .map(|p| PermissionInfo {
            slug: p.slug.to_string(),
            description: p.description.to_string(),
        })
        .collect();
    permissions.sort_by(|a, b| a.slug.cmp(&b.slug));
    permissions
}
