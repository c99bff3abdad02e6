// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Visits ---
        handlers::visits::propose_visit,
        handlers::visits::list_visits,
        handlers::visits::get_visit,
        handlers::visits::confirm_visit,
        handlers::visits::cancel_visit,
        handlers::visits::reschedule_visit,
        handlers::visits::realize_visit,

        // --- Feedback ---
        handlers::feedback::get_feedback,
        handlers::feedback::get_visit_feedback,
        handlers::feedback::submit_agent_section,
        handlers::feedback::archive_feedback,
        handlers::feedback::regenerate_report,

        // --- Public ---
        handlers::public_feedback::get_public_feedback,
        handlers::public_feedback::submit_client_feedback,

        // --- RBAC ---
        handlers::rbac::list_permissions,
    ),
    components(
        schemas(
            // --- Visits ---
            models::visit::VisitStatus,
            models::visit::Visit,
            models::visit::AgentSnapshot,

            // --- Feedback ---
            models::feedback::FeedbackStatus,
            models::feedback::FeedbackPolicy,
            models::feedback::LeadQualification,
            models::feedback::DecisionPower,
            models::feedback::PurchaseHorizon,
            models::feedback::PaymentMethod,
            models::feedback::PurchaseInterest,
            models::feedback::Objection,
            models::feedback::Signature,
            models::feedback::AgentSection,
            models::feedback::StarRatings,
            models::feedback::ClientSection,
            models::feedback::VisitFeedback,
            models::feedback::PublicFeedbackView,
            models::feedback::AgentSectionInput,
            models::feedback::ClientSectionInput,

            // --- Payloads ---
            handlers::visits::ProposeVisitPayload,
            handlers::visits::ConfirmVisitPayload,
            handlers::visits::CancelVisitPayload,
            handlers::visits::RescheduleVisitPayload,
            handlers::visits::RealizeVisitPayload,
            handlers::visits::RealizeVisitResponse,
            handlers::public_feedback::ClientSubmissionResponse,

            // --- Auth / RBAC ---
            models::auth::CurrentUser,
            models::rbac::PermissionInfo,
        )
    ),
    tags(
        (name = "Visits", description = "Agendamento e ciclo de vida das visitas"),
        (name = "Feedback", description = "Avaliação do corretor, arquivamento e relatórios"),
        (name = "Public", description = "Link público do cliente (sem login)"),
        (name = "RBAC", description = "Permissões do sistema")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_the_public_link() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/public/feedback/{token}"));
        assert!(doc.paths.paths.contains_key("/api/visits/{id}/realize"));
    }
}
