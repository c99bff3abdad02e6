// src/handlers/visits.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::{
        error::{ApiError, AppError},
        validation::parse_choice,
    },
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        i18n::Locale,
        rbac::{PermVisitsRead, PermVisitsWrite, RequirePermission},
        tenancy::TenantContext,
    },
    models::{
        feedback::{FeedbackPolicy, VisitFeedback},
        visit::{NewVisit, Visit, VisitStatus},
    },
};

// =============================================================================
//  PAYLOADS
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProposeVisitPayload {
    pub lead_id: Uuid,
    pub property_id: Uuid,
    // Nulo = venda direta, sem imobiliária
    pub agency_id: Option<Uuid>,

    #[validate(length(min = 1, message = "required"))]
    #[schema(example = "João da Silva")]
    pub lead_name: String,

    #[validate(email(message = "invalid_email"))]
    #[schema(example = "joao@email.com")]
    pub lead_email: Option<String>,

    #[validate(length(min = 1, message = "required"))]
    #[schema(example = "Residencial Jardim das Flores - Apto 302")]
    pub property_title: String,

    #[validate(email(message = "invalid_email"))]
    pub agency_email: Option<String>,

    #[schema(example = "2026-11-02T14:00:00Z")]
    pub option1: DateTime<Utc>,
    #[schema(example = "2026-11-03T10:00:00Z")]
    pub option2: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmVisitPayload {
    #[schema(example = "2026-11-02T14:00:00Z")]
    pub chosen_slot: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CancelVisitPayload {
    // Obrigatório; em branco é rejeitado pelo modelo
    #[serde(default)]
    #[schema(example = "Cliente desistiu da compra")]
    pub reason: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RescheduleVisitPayload {
    pub option1: DateTime<Utc>,
    pub option2: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RealizeVisitPayload {
    // Sobrescreve o FEEDBACK_POLICY só para esta visita
    #[schema(example = "client_first")]
    pub policy: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RealizeVisitResponse {
    pub visit: Visit,
    pub feedback: VisitFeedback,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListVisitsQuery {
    /// pending, confirmed, realized, cancelled ou rescheduled
    pub status: Option<String>,
}

// =============================================================================
//  HANDLERS
// =============================================================================

// POST /api/visits
#[utoipa::path(
    post,
    path = "/api/visits",
    tag = "Visits",
    request_body = ProposeVisitPayload,
    responses(
        (status = 201, description = "Visita proposta", body = Visit),
        (status = 400, description = "Horários inválidos")
    ),
    params(
        ("x-tenant-id" = Uuid, Header, description = "ID da Construtora")
    ),
    security(("api_jwt" = []))
)]
pub async fn propose_visit(
    State(app_state): State<AppState>,
    locale: Locale,
    tenant: TenantContext,
    _perm: RequirePermission<PermVisitsWrite>,
    Json(payload): Json<ProposeVisitPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale))?;

    let visit = app_state
        .visit_service
        .propose_visit(NewVisit {
            construtora_id: tenant.0,
            lead_id: payload.lead_id,
            property_id: payload.property_id,
            agency_id: payload.agency_id,
            lead_name: payload.lead_name.trim().to_string(),
            lead_email: payload.lead_email,
            property_title: payload.property_title.trim().to_string(),
            agency_email: payload.agency_email,
            option1: payload.option1,
            option2: payload.option2,
        })
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::CREATED, Json(visit)))
}

// GET /api/visits?status=
#[utoipa::path(
    get,
    path = "/api/visits",
    tag = "Visits",
    params(
        ListVisitsQuery,
        ("x-tenant-id" = Uuid, Header, description = "ID da Construtora")
    ),
    responses(
        (status = 200, description = "Visitas da construtora", body = Vec<Visit>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_visits(
    State(app_state): State<AppState>,
    locale: Locale,
    tenant: TenantContext,
    _perm: RequirePermission<PermVisitsRead>,
    Query(query): Query<ListVisitsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let status = query
        .status
        .as_deref()
        .map(|s| parse_choice::<VisitStatus>("status", s))
        .transpose()
        .map_err(|e| e.to_api_error(&locale))?;

    let visits = app_state
        .visit_service
        .list_visits(tenant.0, status)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(visits))
}

// GET /api/visits/{id}
#[utoipa::path(
    get,
    path = "/api/visits/{id}",
    tag = "Visits",
    params(
        ("id" = Uuid, Path, description = "ID da Visita"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Construtora")
    ),
    responses(
        (status = 200, body = Visit),
        (status = 404, description = "Visita não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_visit(
    State(app_state): State<AppState>,
    locale: Locale,
    tenant: TenantContext,
    _perm: RequirePermission<PermVisitsRead>,
    Path(visit_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let visit = app_state
        .visit_service
        .get_visit(tenant.0, visit_id)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(visit))
}

// POST /api/visits/{id}/confirm
#[utoipa::path(
    post,
    path = "/api/visits/{id}/confirm",
    tag = "Visits",
    request_body = ConfirmVisitPayload,
    params(
        ("id" = Uuid, Path, description = "ID da Visita"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Construtora")
    ),
    responses(
        (status = 200, description = "Visita confirmada", body = Visit),
        (status = 409, description = "Status não permite confirmar")
    ),
    security(("api_jwt" = []))
)]
pub async fn confirm_visit(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _perm: RequirePermission<PermVisitsWrite>,
    Path(visit_id): Path<Uuid>,
    Json(payload): Json<ConfirmVisitPayload>,
) -> Result<impl IntoResponse, ApiError> {
    // Quem confirma vira o corretor responsável
    let agent = user.0.as_agent();

    let visit = app_state
        .visit_service
        .confirm_visit(tenant.0, visit_id, payload.chosen_slot, Some(&agent))
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(visit))
}

// POST /api/visits/{id}/cancel
#[utoipa::path(
    post,
    path = "/api/visits/{id}/cancel",
    tag = "Visits",
    request_body = CancelVisitPayload,
    params(
        ("id" = Uuid, Path, description = "ID da Visita"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Construtora")
    ),
    responses(
        (status = 200, description = "Visita cancelada", body = Visit),
        (status = 400, description = "Motivo em branco"),
        (status = 409, description = "Visita já realizada ou cancelada")
    ),
    security(("api_jwt" = []))
)]
pub async fn cancel_visit(
    State(app_state): State<AppState>,
    locale: Locale,
    tenant: TenantContext,
    _perm: RequirePermission<PermVisitsWrite>,
    Path(visit_id): Path<Uuid>,
    Json(payload): Json<CancelVisitPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let visit = app_state
        .visit_service
        .cancel_visit(tenant.0, visit_id, &payload.reason)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(visit))
}

// POST /api/visits/{id}/reschedule
#[utoipa::path(
    post,
    path = "/api/visits/{id}/reschedule",
    tag = "Visits",
    request_body = RescheduleVisitPayload,
    params(
        ("id" = Uuid, Path, description = "ID da Visita"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Construtora")
    ),
    responses(
        (status = 200, description = "Novos horários propostos", body = Visit),
        (status = 409, description = "Só visitas confirmadas podem ser reagendadas")
    ),
    security(("api_jwt" = []))
)]
pub async fn reschedule_visit(
    State(app_state): State<AppState>,
    locale: Locale,
    tenant: TenantContext,
    _perm: RequirePermission<PermVisitsWrite>,
    Path(visit_id): Path<Uuid>,
    Json(payload): Json<RescheduleVisitPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let visit = app_state
        .visit_service
        .reschedule_visit(tenant.0, visit_id, payload.option1, payload.option2)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(visit))
}

// POST /api/visits/{id}/realize
#[utoipa::path(
    post,
    path = "/api/visits/{id}/realize",
    tag = "Visits",
    request_body(content = RealizeVisitPayload, description = "Corpo opcional"),
    params(
        ("id" = Uuid, Path, description = "ID da Visita"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Construtora")
    ),
    responses(
        (status = 201, description = "Visita realizada e feedback criado", body = RealizeVisitResponse),
        (status = 409, description = "Visita não está confirmada")
    ),
    security(("api_jwt" = []))
)]
pub async fn realize_visit(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _perm: RequirePermission<PermVisitsWrite>,
    Path(visit_id): Path<Uuid>,
    payload: Option<Json<RealizeVisitPayload>>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let policy = payload
        .policy
        .as_deref()
        .map(|p| p.parse::<FeedbackPolicy>())
        .transpose()
        .map_err(|e| e.to_api_error(&locale))?;

    let agent = user.0.as_agent();
    let (visit, feedback) = app_state
        .visit_service
        .realize_visit(tenant.0, visit_id, Some(&agent), policy)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::CREATED, Json(RealizeVisitResponse { visit, feedback })))
}
