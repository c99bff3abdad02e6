// src/models/outbox.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub const JOB_QUEUED: &str = "queued";
pub const JOB_PROCESSING: &str = "processing";
pub const JOB_SUCCEEDED: &str = "succeeded";
pub const JOB_FAILED: &str = "failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationTemplate {
    VisitConfirmed,
    VisitCancelled,
    AgentFeedbackRequest,
    FeedbackInvitation,
    ClientFeedbackCompleted,
    AgencyFeedbackSummary,
}

impl NotificationTemplate {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationTemplate::VisitConfirmed => "visit_confirmed",
            NotificationTemplate::VisitCancelled => "visit_cancelled",
            NotificationTemplate::AgentFeedbackRequest => "agent_feedback_request",
            NotificationTemplate::FeedbackInvitation => "feedback_invitation",
            NotificationTemplate::ClientFeedbackCompleted => "client_feedback_completed",
            NotificationTemplate::AgencyFeedbackSummary => "agency_feedback_summary",
        }
    }
}

/// Trabalho gravado na tabela `dispatch_jobs` junto com a transição que o originou.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DispatchJob {
    Notify {
        template: NotificationTemplate,
        recipient: String,
        payload: Value,
    },
    GenerateReport {
        construtora_id: Uuid,
        feedback_id: Uuid,
    },
}

impl DispatchJob {
    /// `None` quando não há destinatário (e-mail do lead/imobiliária é opcional).
    pub fn notify(template: NotificationTemplate, recipient: Option<&str>, payload: Value) -> Option<Self> {
        match recipient.map(str::trim) {
            Some(recipient) if !recipient.is_empty() => Some(DispatchJob::Notify {
                template,
                recipient: recipient.to_string(),
                payload,
            }),
            _ => {
                tracing::debug!(template = template.as_str(), "Sem destinatário, notificação ignorada");
                None
            }
        }
    }

    pub fn report(construtora_id: Uuid, feedback_id: Uuid) -> Self {
        DispatchJob::GenerateReport {
            construtora_id,
            feedback_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            DispatchJob::Notify { .. } => "notify",
            DispatchJob::GenerateReport { .. } => "generate_report",
        }
    }
}

/// Job reservado pelo worker. `attempts` conta as reservas, inclusive as
/// que ficaram presas num worker que caiu.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboxJob {
    pub id: Uuid,
    pub job: DispatchJob,
    pub attempts: i32,
    pub locked_until: DateTime<Utc>,
}
