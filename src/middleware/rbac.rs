// src/middleware/rbac.rs

use axum::{extract::FromRequestParts, http::request::Parts};
use std::marker::PhantomData;

use crate::{
    common::error::AppError,
    models::{auth::CurrentUser, rbac::Permission},
};

/// 1. O Trait que define o que é uma Permissão
pub trait PermissionDef: Send + Sync + 'static {
    fn slug() -> &'static str;
}

/// 2. O Extractor (Guardião): checa a capacidade nas claims do JWT
pub struct RequirePermission<T>(pub PhantomData<T>);

impl<T, S> FromRequestParts<S> for RequirePermission<T>
where
    T: PermissionDef,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // O tenant_guard já colocou o usuário nas extensions
        let user = parts
            .extensions
            .get::<CurrentUser>()
            .ok_or(AppError::InvalidToken)?;

        let required_perm = T::slug();
        if !user.has_permission(required_perm) {
            tracing::warn!(user_id = %user.id, permission = required_perm, "Acesso negado");
            return Err(AppError::Forbidden(required_perm.to_string()));
        }

        Ok(RequirePermission(PhantomData))
    }
}

// ---
// DEFINIÇÃO DAS PERMISSÕES (TIPOS)
// ---

pub struct PermVisitsRead;
impl PermissionDef for PermVisitsRead {
    fn slug() -> &'static str { "visits:read" }
}
inventory::submit! { Permission { slug: "visits:read", description: "Consultar visitas e feedbacks" } }

pub struct PermVisitsWrite;
impl PermissionDef for PermVisitsWrite {
    fn slug() -> &'static str { "visits:write" }
}
inventory::submit! { Permission { slug: "visits:write", description: "Agendar, confirmar, cancelar e realizar visitas" } }

pub struct PermFeedbackAgent;
impl PermissionDef for PermFeedbackAgent {
    fn slug() -> &'static str { "feedback:agent" }
}
inventory::submit! { Permission { slug: "feedback:agent", description: "Preencher a avaliação do corretor" } }

pub struct PermFeedbackArchive;
impl PermissionDef for PermFeedbackArchive {
    fn slug() -> &'static str { "feedback:archive" }
}
inventory::submit! { Permission { slug: "feedback:archive", description: "Arquivar feedbacks de visita" } }

pub struct PermFeedbackReport;
impl PermissionDef for PermFeedbackReport {
    fn slug() -> &'static str { "feedback:report" }
}
inventory::submit! { Permission { slug: "feedback:report", description: "Regerar o relatório de feedback" } }
