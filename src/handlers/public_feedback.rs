// src/handlers/public_feedback.rs
//
// Link público do cliente: sem JWT e sem tenant, só o token.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    common::error::ApiError,
    config::AppState,
    middleware::i18n::Locale,
    models::feedback::{ClientSectionInput, PublicFeedbackView},
};

// O cliente não recebe o registro interno (score, seção do corretor...)
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClientSubmissionResponse {
    #[schema(example = "completo")]
    pub status: String,
    pub message: String,
}

// GET /api/public/feedback/{token}
#[utoipa::path(
    get,
    path = "/api/public/feedback/{token}",
    tag = "Public",
    params(
        ("token" = String, Path, description = "Token do link enviado ao cliente")
    ),
    responses(
        (status = 200, description = "form, waiting_on_agent ou already_submitted", body = PublicFeedbackView),
        (status = 404, description = "Link inválido")
    )
)]
pub async fn get_public_feedback(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let view = app_state
        .feedback_service
        .public_view(&token)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(view))
}

// POST /api/public/feedback/{token}
#[utoipa::path(
    post,
    path = "/api/public/feedback/{token}",
    tag = "Public",
    request_body = ClientSectionInput,
    params(
        ("token" = String, Path, description = "Token do link enviado ao cliente")
    ),
    responses(
        (status = 200, description = "Avaliação registrada", body = ClientSubmissionResponse),
        (status = 400, description = "Campos inválidos"),
        (status = 404, description = "Link inválido ou já utilizado"),
        (status = 409, description = "Corretor ainda não preencheu ou envio concorrente")
    )
)]
pub async fn submit_client_feedback(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(token): Path<String>,
    Json(payload): Json<ClientSectionInput>,
) -> Result<impl IntoResponse, ApiError> {
    let feedback = app_state
        .feedback_service
        .submit_client_section(&token, payload)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    let message = if locale.is_portuguese() {
        "Obrigado! Sua avaliação foi registrada."
    } else {
        "Thank you! Your feedback has been recorded."
    };

    Ok(Json(ClientSubmissionResponse {
        status: feedback.status.as_str().to_string(),
        message: message.to_string(),
    }))
}
