// src/routes.rs

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    config::AppState,
    docs::ApiDoc,
    handlers,
    middleware::auth::tenant_guard,
};

/// Monta o router completo. Os testes de integração usam o mesmo router.
pub fn app_router(app_state: AppState) -> Router {
    // Rotas internas (JWT + x-tenant-id)
    let visit_routes = Router::new()
        .route("/"
               , post(handlers::visits::propose_visit)
               .get(handlers::visits::list_visits)
        )
        .route("/{id}", get(handlers::visits::get_visit))
        .route("/{id}/confirm", post(handlers::visits::confirm_visit))
        .route("/{id}/cancel", post(handlers::visits::cancel_visit))
        .route("/{id}/reschedule", post(handlers::visits::reschedule_visit))
        .route("/{id}/realize", post(handlers::visits::realize_visit))
        .route("/{id}/feedback", get(handlers::feedback::get_visit_feedback))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            tenant_guard,
        ));

    let feedback_routes = Router::new()
        .route("/{id}", get(handlers::feedback::get_feedback))
        .route("/{id}/agent", post(handlers::feedback::submit_agent_section))
        .route("/{id}/archive", post(handlers::feedback::archive_feedback))
        .route("/{id}/report", post(handlers::feedback::regenerate_report))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            tenant_guard,
        ));

    // Link do cliente: sem login
    let public_routes = Router::new()
        .route("/feedback/{token}"
               , get(handlers::public_feedback::get_public_feedback)
               .post(handlers::public_feedback::submit_client_feedback)
        );

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/api/health", get(|| async { "OK" }))
        .route("/api/permissions", get(handlers::rbac::list_permissions))
        .nest("/api/visits", visit_routes)
        .nest("/api/feedbacks", feedback_routes)
        .nest("/api/public", public_routes)
        .with_state(app_state)
}
