// src/services/visit_service.rs

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::VisitStore,
    models::{
        feedback::{FeedbackPolicy, VisitFeedback},
        visit::{AgentSnapshot, NewVisit, Visit, VisitStatus},
    },
    services::{
        dispatch::{DispatchJob, Dispatcher, NotificationTemplate},
        feedback_service::{generate_access_token, public_feedback_link},
    },
};

#[derive(Clone)]
pub struct VisitService {
    store: Arc<dyn VisitStore>,
    dispatcher: Dispatcher,
    default_policy: FeedbackPolicy,
    public_base_url: String,
}

impl VisitService {
    pub fn new(
        store: Arc<dyn VisitStore>,
        dispatcher: Dispatcher,
        default_policy: FeedbackPolicy,
        public_base_url: String,
    ) -> Self {
        Self {
            store,
            dispatcher,
            default_policy,
            public_base_url,
        }
    }

    pub async fn propose_visit(&self, new: NewVisit) -> Result<Visit, AppError> {
        let visit = Visit::propose(new, Utc::now())?;
        self.store.insert_visit(&visit).await?;

        tracing::info!(visit_id = %visit.id, lead_id = %visit.lead_id, "📅 Visita proposta");
        Ok(visit)
    }

    pub async fn get_visit(&self, construtora_id: Uuid, visit_id: Uuid) -> Result<Visit, AppError> {
        self.store
            .find_visit(construtora_id, visit_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound(format!("Visita {}", visit_id)))
    }

    pub async fn list_visits(
        &self,
        construtora_id: Uuid,
        status: Option<VisitStatus>,
    ) -> Result<Vec<Visit>, AppError> {
        self.store.list_visits(construtora_id, status).await
    }

    pub async fn confirm_visit(
        &self,
        construtora_id: Uuid,
        visit_id: Uuid,
        chosen_slot: DateTime<Utc>,
        agent: Option<&AgentSnapshot>,
    ) -> Result<Visit, AppError> {
        let visit = self
            .transition(
                construtora_id,
                visit_id,
                |visit, now| visit.confirm(chosen_slot, agent, now),
                |visit| {
                    DispatchJob::notify(
                        NotificationTemplate::VisitConfirmed,
                        visit.lead_email.as_deref(),
                        json!({
                            "visitId": visit.id,
                            "leadName": visit.lead_name,
                            "propertyTitle": visit.property_title,
                            "confirmedSlot": visit.confirmed_slot,
                            "agentName": visit.agent_name,
                        }),
                    )
                    .into_iter()
                    .collect()
                },
            )
            .await?;

        tracing::info!(visit_id = %visit.id, slot = %chosen_slot, "✅ Visita confirmada");
        Ok(visit)
    }

    pub async fn cancel_visit(&self, construtora_id: Uuid, visit_id: Uuid, reason: &str) -> Result<Visit, AppError> {
        let visit = self
            .transition(
                construtora_id,
                visit_id,
                |visit, now| visit.cancel(reason, now),
                |visit| {
                    DispatchJob::notify(
                        NotificationTemplate::VisitCancelled,
                        visit.lead_email.as_deref(),
                        json!({
                            "visitId": visit.id,
                            "leadName": visit.lead_name,
                            "propertyTitle": visit.property_title,
                            "reason": visit.cancellation_reason,
                        }),
                    )
                    .into_iter()
                    .collect()
                },
            )
            .await?;

        tracing::info!(visit_id = %visit.id, "❌ Visita cancelada");
        Ok(visit)
    }

    pub async fn reschedule_visit(
        &self,
        construtora_id: Uuid,
        visit_id: Uuid,
        option1: DateTime<Utc>,
        option2: DateTime<Utc>,
    ) -> Result<Visit, AppError> {
        let visit = self
            .transition(
                construtora_id,
                visit_id,
                |visit, now| visit.reschedule(option1, option2, now),
                |_| Vec::new(),
            )
            .await?;

        tracing::info!(visit_id = %visit.id, "🔁 Visita reagendada");
        Ok(visit)
    }

    /// Marca a visita como realizada e cria o feedback na mesma operação atômica.
    pub async fn realize_visit(
        &self,
        construtora_id: Uuid,
        visit_id: Uuid,
        agent: Option<&AgentSnapshot>,
        policy: Option<FeedbackPolicy>,
    ) -> Result<(Visit, VisitFeedback), AppError> {
        let now = Utc::now();
        let mut visit = self.get_visit(construtora_id, visit_id).await?;
        visit.realize(agent, now)?;

        let policy = policy.unwrap_or(self.default_policy);
        let feedback = VisitFeedback::new(&visit, policy, generate_access_token(), now);

        let handoff = match policy {
            FeedbackPolicy::AgentFirst => DispatchJob::notify(
                NotificationTemplate::AgentFeedbackRequest,
                visit.agent_email.as_deref(),
                json!({
                    "feedbackId": feedback.id,
                    "visitId": visit.id,
                    "leadName": visit.lead_name,
                    "propertyTitle": visit.property_title,
                }),
            ),
            FeedbackPolicy::ClientFirst => DispatchJob::notify(
                NotificationTemplate::FeedbackInvitation,
                visit.lead_email.as_deref(),
                json!({
                    "accessToken": feedback.access_token,
                    "link": public_feedback_link(&self.public_base_url, &feedback.access_token),
                    "propertyTitle": visit.property_title,
                    "agentName": visit.agent_name,
                }),
            ),
        };
        let jobs: Vec<DispatchJob> = handoff.into_iter().collect();

        if !self.store.realize_visit(&visit, &feedback, &jobs).await? {
            tracing::warn!(%visit_id, "Realização concorrente perdeu a corrida");
            return Err(concurrent_change());
        }
        self.dispatcher.wake();

        tracing::info!(
            visit_id = %visit.id,
            feedback_id = %feedback.id,
            policy = ?policy,
            "🏁 Visita realizada, feedback criado"
        );

        Ok((visit, feedback))
    }

    // Carrega, aplica a transição do modelo e grava com compare-and-set no status,
    // junto com os jobs que a transição gera.
    async fn transition<F, J>(
        &self,
        construtora_id: Uuid,
        visit_id: Uuid,
        apply: F,
        jobs_for: J,
    ) -> Result<Visit, AppError>
    where
        F: FnOnce(&mut Visit, DateTime<Utc>) -> Result<(), AppError>,
        J: FnOnce(&Visit) -> Vec<DispatchJob>,
    {
        let mut visit = self.get_visit(construtora_id, visit_id).await?;
        let expected = visit.status;
        apply(&mut visit, Utc::now())?;
        let jobs = jobs_for(&visit);

        if !self.store.update_visit(&visit, expected, &jobs).await? {
            tracing::warn!(%visit_id, expected = expected.as_str(), "Visita alterada por outra requisição");
            return Err(concurrent_change());
        }
        if !jobs.is_empty() {
            self.dispatcher.wake();
        }
        Ok(visit)
    }
}

fn concurrent_change() -> AppError {
    AppError::InvalidState("A visita foi alterada por outra requisição. Recarregue e tente novamente.".into())
}
