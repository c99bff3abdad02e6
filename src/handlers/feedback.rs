// src/handlers/feedback.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::{
    common::error::ApiError,
    config::AppState,
    middleware::{
        i18n::Locale,
        rbac::{PermFeedbackAgent, PermFeedbackArchive, PermFeedbackReport, PermVisitsRead, RequirePermission},
        tenancy::TenantContext,
    },
    models::feedback::{AgentSectionInput, VisitFeedback},
};

// GET /api/feedbacks/{id}
#[utoipa::path(
    get,
    path = "/api/feedbacks/{id}",
    tag = "Feedback",
    params(
        ("id" = Uuid, Path, description = "ID do Feedback"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Construtora")
    ),
    responses(
        (status = 200, body = VisitFeedback),
        (status = 404, description = "Feedback não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_feedback(
    State(app_state): State<AppState>,
    locale: Locale,
    tenant: TenantContext,
    _perm: RequirePermission<PermVisitsRead>,
    Path(feedback_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let feedback = app_state
        .feedback_service
        .get_feedback(tenant.0, feedback_id)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(feedback))
}

// GET /api/visits/{id}/feedback
#[utoipa::path(
    get,
    path = "/api/visits/{id}/feedback",
    tag = "Feedback",
    params(
        ("id" = Uuid, Path, description = "ID da Visita"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Construtora")
    ),
    responses(
        (status = 200, body = VisitFeedback),
        (status = 404, description = "Visita ainda sem feedback")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_visit_feedback(
    State(app_state): State<AppState>,
    locale: Locale,
    tenant: TenantContext,
    _perm: RequirePermission<PermVisitsRead>,
    Path(visit_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let feedback = app_state
        .feedback_service
        .get_feedback_by_visit(tenant.0, visit_id)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(feedback))
}

// POST /api/feedbacks/{id}/agent
#[utoipa::path(
    post,
    path = "/api/feedbacks/{id}/agent",
    tag = "Feedback",
    request_body = AgentSectionInput,
    params(
        ("id" = Uuid, Path, description = "ID do Feedback"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Construtora")
    ),
    responses(
        (status = 200, description = "Avaliação do corretor registrada, cliente convidado", body = VisitFeedback),
        (status = 400, description = "Campos inválidos"),
        (status = 409, description = "Avaliação já enviada ou feedback arquivado")
    ),
    security(("api_jwt" = []))
)]
pub async fn submit_agent_section(
    State(app_state): State<AppState>,
    locale: Locale,
    tenant: TenantContext,
    _perm: RequirePermission<PermFeedbackAgent>,
    Path(feedback_id): Path<Uuid>,
    Json(payload): Json<AgentSectionInput>,
) -> Result<impl IntoResponse, ApiError> {
    let feedback = app_state
        .feedback_service
        .submit_agent_section(tenant.0, feedback_id, payload)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(feedback))
}

// POST /api/feedbacks/{id}/archive
#[utoipa::path(
    post,
    path = "/api/feedbacks/{id}/archive",
    tag = "Feedback",
    params(
        ("id" = Uuid, Path, description = "ID do Feedback"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Construtora")
    ),
    responses(
        (status = 200, description = "Feedback arquivado", body = VisitFeedback),
        (status = 409, description = "Já arquivado")
    ),
    security(("api_jwt" = []))
)]
pub async fn archive_feedback(
    State(app_state): State<AppState>,
    locale: Locale,
    tenant: TenantContext,
    _perm: RequirePermission<PermFeedbackArchive>,
    Path(feedback_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let feedback = app_state
        .feedback_service
        .archive_feedback(tenant.0, feedback_id)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(feedback))
}

// POST /api/feedbacks/{id}/report
#[utoipa::path(
    post,
    path = "/api/feedbacks/{id}/report",
    tag = "Feedback",
    params(
        ("id" = Uuid, Path, description = "ID do Feedback"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Construtora")
    ),
    responses(
        (status = 202, description = "Geração do relatório enfileirada", body = VisitFeedback),
        (status = 409, description = "Feedback ainda não está completo")
    ),
    security(("api_jwt" = []))
)]
pub async fn regenerate_report(
    State(app_state): State<AppState>,
    locale: Locale,
    tenant: TenantContext,
    _perm: RequirePermission<PermFeedbackReport>,
    Path(feedback_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let feedback = app_state
        .feedback_service
        .regenerate_report(tenant.0, feedback_id)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::ACCEPTED, Json(feedback)))
}
