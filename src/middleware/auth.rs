// src/middleware/auth.rs

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    typed_header::TypedHeaderRejection,
    TypedHeader,
};

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::tenancy::TenantContext,
    models::auth::CurrentUser,
};

type BearerHeader = Result<TypedHeader<Authorization<Bearer>>, TypedHeaderRejection>;

// Valida o Bearer, exige o cabeçalho x-tenant-id e coloca o usuário nas extensions
pub async fn tenant_guard(
    State(app_state): State<AppState>,
    bearer: BearerHeader,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = authenticate(&app_state, bearer)?;

    let (mut parts, body) = request.into_parts();
    let tenant = TenantContext::from_request_parts(&mut parts, &app_state).await?;
    request = Request::from_parts(parts, body);

    tracing::debug!(user_id = %user.id, tenant_id = %tenant.0, "Requisição autenticada");
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

fn authenticate(app_state: &AppState, bearer: BearerHeader) -> Result<CurrentUser, AppError> {
    let TypedHeader(Authorization(bearer)) = bearer.map_err(|_| AppError::InvalidToken)?;
    app_state.auth_service.validate_token(bearer.token())
}

// Extrator para obter o usuário autenticado diretamente nos handlers
pub struct AuthenticatedUser(pub CurrentUser);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .map(AuthenticatedUser)
            .ok_or(AppError::InvalidToken)
    }
}
