// src/services/feedback_service.rs

use std::sync::Arc;

use chrono::Utc;
use rand::{rngs::OsRng, RngCore};
use serde_json::json;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::VisitStore,
    models::{
        feedback::{AgentSectionInput, ClientSectionInput, FeedbackStatus, PublicFeedbackView, VisitFeedback},
        visit::Visit,
    },
    services::dispatch::{DispatchJob, Dispatcher, NotificationTemplate},
};

const TOKEN_BYTES: usize = 32;

/// Token do link público: 32 bytes aleatórios em hex (64 caracteres).
pub fn generate_access_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn public_feedback_link(base_url: &str, access_token: &str) -> String {
    format!("{}/feedback/{}", base_url.trim_end_matches('/'), access_token)
}

#[derive(Clone)]
pub struct FeedbackService {
    store: Arc<dyn VisitStore>,
    dispatcher: Dispatcher,
    public_base_url: String,
}

impl FeedbackService {
    pub fn new(store: Arc<dyn VisitStore>, dispatcher: Dispatcher, public_base_url: String) -> Self {
        Self {
            store,
            dispatcher,
            public_base_url,
        }
    }

    pub async fn get_feedback(&self, construtora_id: Uuid, feedback_id: Uuid) -> Result<VisitFeedback, AppError> {
        self.store
            .find_feedback(construtora_id, feedback_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound(format!("Feedback {}", feedback_id)))
    }

    pub async fn get_feedback_by_visit(
        &self,
        construtora_id: Uuid,
        visit_id: Uuid,
    ) -> Result<VisitFeedback, AppError> {
        self.store
            .find_feedback_by_visit(construtora_id, visit_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound(format!("Feedback da visita {}", visit_id)))
    }

    pub async fn submit_agent_section(
        &self,
        construtora_id: Uuid,
        feedback_id: Uuid,
        input: AgentSectionInput,
    ) -> Result<VisitFeedback, AppError> {
        let now = Utc::now();
        // Entrada inválida nunca chega a tocar no registro
        let section = input.into_section(now)?;

        let mut feedback = self.get_feedback(construtora_id, feedback_id).await?;
        let visit = self.visit_of(&feedback).await?;
        let expected = feedback.status;
        feedback.submit_agent(section, now)?;

        let jobs: Vec<DispatchJob> = DispatchJob::notify(
            NotificationTemplate::FeedbackInvitation,
            visit.lead_email.as_deref(),
            json!({
                "accessToken": feedback.access_token,
                "link": public_feedback_link(&self.public_base_url, &feedback.access_token),
                "propertyTitle": visit.property_title,
                "agentName": visit.agent_name,
            }),
        )
        .into_iter()
        .collect();

        if !self.store.update_feedback(&feedback, expected, &jobs).await? {
            tracing::warn!(%feedback_id, "Seção do corretor enviada em paralelo, requisição descartada");
            return Err(concurrent_change());
        }
        self.dispatcher.wake();

        tracing::info!(
            %feedback_id,
            visit_id = %feedback.visit_id,
            score_lead = ?feedback.score_lead,
            "✍️ Avaliação do corretor registrada"
        );

        Ok(feedback)
    }

    /// Envio pelo link público. Token desconhecido ou já consumido responde
    /// como "não encontrado"; quem perde uma corrida recebe `InvalidState`.
    pub async fn submit_client_section(
        &self,
        access_token: &str,
        input: ClientSectionInput,
    ) -> Result<VisitFeedback, AppError> {
        let now = Utc::now();
        let section = input.into_section(now)?;

        let mut feedback = self
            .store
            .find_feedback_by_token(access_token)
            .await?
            .filter(|f| !matches!(f.status, FeedbackStatus::Completo | FeedbackStatus::Arquivado))
            .ok_or_else(|| AppError::ResourceNotFound("Link de feedback".into()))?;

        let visit = self.visit_of(&feedback).await?;
        let expected = feedback.status;
        feedback.submit_client(section, now)?;

        // O relatório entra no outbox junto com o `completo`: sem gravação, sem job
        let mut jobs = vec![DispatchJob::report(feedback.construtora_id, feedback.id)];
        jobs.extend(DispatchJob::notify(
            NotificationTemplate::ClientFeedbackCompleted,
            visit.lead_email.as_deref(),
            json!({
                "leadName": visit.lead_name,
                "propertyTitle": visit.property_title,
            }),
        ));
        let client = feedback.client_section.as_ref();
        jobs.extend(DispatchJob::notify(
            NotificationTemplate::AgencyFeedbackSummary,
            visit.agency_email.as_deref(),
            json!({
                "feedbackId": feedback.id,
                "visitId": visit.id,
                "leadName": visit.lead_name,
                "propertyTitle": visit.property_title,
                "agentName": visit.agent_name,
                "nps": client.map(|c| c.nps),
                "purchaseInterest": client.map(|c| c.purchase_interest),
                "scoreLead": feedback.score_lead,
            }),
        ));

        if !self.store.update_feedback(&feedback, expected, &jobs).await? {
            tracing::warn!(feedback_id = %feedback.id, "Seção do cliente enviada em paralelo, requisição descartada");
            return Err(AppError::InvalidState(
                "Este feedback já foi respondido.".into(),
            ));
        }
        self.dispatcher.wake();

        tracing::info!(
            feedback_id = %feedback.id,
            visit_id = %feedback.visit_id,
            "🎉 Feedback completo"
        );

        Ok(feedback)
    }

    pub async fn public_view(&self, access_token: &str) -> Result<PublicFeedbackView, AppError> {
        let feedback = self
            .store
            .find_feedback_by_token(access_token)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Link de feedback".into()))?;

        let visit = self.visit_of(&feedback).await?;
        Ok(feedback.public_view(&visit))
    }

    pub async fn archive_feedback(&self, construtora_id: Uuid, feedback_id: Uuid) -> Result<VisitFeedback, AppError> {
        let mut feedback = self.get_feedback(construtora_id, feedback_id).await?;
        let expected = feedback.status;
        feedback.archive(Utc::now())?;

        if !self.store.update_feedback(&feedback, expected, &[]).await? {
            tracing::warn!(%feedback_id, "Feedback alterado durante o arquivamento");
            return Err(concurrent_change());
        }

        tracing::info!(%feedback_id, from = expected.as_str(), "🗄️ Feedback arquivado");
        Ok(feedback)
    }

    /// Reenfileira o relatório de um feedback completo (ex: falha do gerador).
    pub async fn regenerate_report(&self, construtora_id: Uuid, feedback_id: Uuid) -> Result<VisitFeedback, AppError> {
        let feedback = self.get_feedback(construtora_id, feedback_id).await?;
        if feedback.status != FeedbackStatus::Completo {
            return Err(AppError::InvalidState(
                "Só é possível gerar o relatório de um feedback completo.".into(),
            ));
        }

        self.store
            .enqueue_jobs(&[DispatchJob::report(feedback.construtora_id, feedback.id)])
            .await?;
        self.dispatcher.wake();
        tracing::info!(%feedback_id, "📄 Regeração do relatório solicitada");
        Ok(feedback)
    }

    async fn visit_of(&self, feedback: &VisitFeedback) -> Result<Visit, AppError> {
        self.store
            .find_visit(feedback.construtora_id, feedback.visit_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound(format!("Visita {}", feedback.visit_id)))
    }
}

fn concurrent_change() -> AppError {
    AppError::InvalidState("O feedback foi alterado por outra requisição. Recarregue e tente novamente.".into())
}
