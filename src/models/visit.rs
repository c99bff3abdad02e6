// src/models/visit.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::common::error::AppError;

// --- ENUMS ---

// Mapeia o CREATE TYPE visit_status do banco
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "visit_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum VisitStatus {
    Pending,
    Confirmed,
    Realized,
    Cancelled,
    // Reagendada: volta a ter semântica de `pending`, com novos horários
    Rescheduled,
}

impl VisitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisitStatus::Pending => "pending",
            VisitStatus::Confirmed => "confirmed",
            VisitStatus::Realized => "realized",
            VisitStatus::Cancelled => "cancelled",
            VisitStatus::Rescheduled => "rescheduled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, VisitStatus::Realized | VisitStatus::Cancelled)
    }

    fn awaits_confirmation(&self) -> bool {
        matches!(self, VisitStatus::Pending | VisitStatus::Rescheduled)
    }
}

// Quem conduziu (ou vai conduzir) a visita
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AgentSnapshot {
    #[schema(example = "Carla Mendes")]
    pub name: String,
    #[schema(example = "carla@imobiliaria.com.br")]
    pub email: String,
}

// Dados vindos da captação de leads para abrir a visita
#[derive(Debug, Clone)]
pub struct NewVisit {
    pub construtora_id: Uuid,
    pub lead_id: Uuid,
    pub property_id: Uuid,
    pub agency_id: Option<Uuid>,
    pub lead_name: String,
    pub lead_email: Option<String>,
    pub property_title: String,
    pub agency_email: Option<String>,
    pub option1: DateTime<Utc>,
    pub option2: DateTime<Utc>,
}

// --- VISITA (O Agendamento) ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Visit {
    pub id: Uuid,
    #[schema(ignore)] // Vem do header x-tenant-id
    pub construtora_id: Uuid,

    pub lead_id: Uuid,
    pub property_id: Uuid,
    // Nulo = canal direto
    pub agency_id: Option<Uuid>,

    #[schema(example = "João da Silva")]
    pub lead_name: String,
    #[schema(example = "joao@email.com")]
    pub lead_email: Option<String>,
    #[schema(example = "Residencial Jardim das Flores - Apto 302")]
    pub property_title: String,
    pub agency_email: Option<String>,

    pub option1: DateTime<Utc>,
    pub option2: DateTime<Utc>,
    pub confirmed_slot: Option<DateTime<Utc>>,

    pub status: VisitStatus,
    pub cancellation_reason: Option<String>,

    pub agent_name: Option<String>,
    pub agent_email: Option<String>,

    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub realized_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Os dois horários precisam ser distintos e no futuro.
pub fn validate_slots(
    option1: DateTime<Utc>,
    option2: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    if option1 <= now {
        return Err(AppError::field("option1", "past_slot", "O horário deve estar no futuro."));
    }
    if option2 <= now {
        return Err(AppError::field("option2", "past_slot", "O horário deve estar no futuro."));
    }
    if option1 == option2 {
        return Err(AppError::field(
            "option2",
            "duplicated_slot",
            "As duas opções de horário devem ser diferentes.",
        ));
    }
    Ok(())
}

impl Visit {
    pub fn propose(new: NewVisit, now: DateTime<Utc>) -> Result<Self, AppError> {
        validate_slots(new.option1, new.option2, now)?;

        Ok(Self {
            id: Uuid::new_v4(),
            construtora_id: new.construtora_id,
            lead_id: new.lead_id,
            property_id: new.property_id,
            agency_id: new.agency_id,
            lead_name: new.lead_name,
            lead_email: new.lead_email,
            property_title: new.property_title,
            agency_email: new.agency_email,
            option1: new.option1,
            option2: new.option2,
            confirmed_slot: None,
            status: VisitStatus::Pending,
            cancellation_reason: None,
            agent_name: None,
            agent_email: None,
            created_at: now,
            confirmed_at: None,
            realized_at: None,
            cancelled_at: None,
            updated_at: now,
        })
    }

    pub fn agent(&self) -> Option<AgentSnapshot> {
        match (&self.agent_name, &self.agent_email) {
            (Some(name), Some(email)) => Some(AgentSnapshot {
                name: name.clone(),
                email: email.clone(),
            }),
            _ => None,
        }
    }

    pub fn confirm(
        &mut self,
        chosen_slot: DateTime<Utc>,
        agent: Option<&AgentSnapshot>,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        if !self.status.awaits_confirmation() {
            return Err(self.state_error("confirmada"));
        }
        if chosen_slot != self.option1 && chosen_slot != self.option2 {
            return Err(AppError::field(
                "chosenSlot",
                "not_offered",
                "O horário escolhido não é uma das opções oferecidas.",
            ));
        }

        self.confirmed_slot = Some(chosen_slot);
        self.status = VisitStatus::Confirmed;
        self.confirmed_at = Some(now.max(self.created_at));
        self.capture_agent(agent);
        self.updated_at = now;
        Ok(())
    }

    pub fn cancel(&mut self, reason: &str, now: DateTime<Utc>) -> Result<(), AppError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(AppError::field(
                "reason",
                "required",
                "O motivo do cancelamento é obrigatório.",
            ));
        }
        if self.status.is_terminal() {
            return Err(self.state_error("cancelada"));
        }

        self.status = VisitStatus::Cancelled;
        self.cancellation_reason = Some(reason.to_string());
        self.cancelled_at = Some(now.max(self.created_at));
        self.updated_at = now;
        Ok(())
    }

    pub fn reschedule(
        &mut self,
        option1: DateTime<Utc>,
        option2: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        if self.status != VisitStatus::Confirmed {
            return Err(self.state_error("reagendada"));
        }
        validate_slots(option1, option2, now)?;

        self.option1 = option1;
        self.option2 = option2;
        self.confirmed_slot = None;
        self.confirmed_at = None;
        self.status = VisitStatus::Rescheduled;
        self.updated_at = now;
        Ok(())
    }

    pub fn realize(&mut self, agent: Option<&AgentSnapshot>, now: DateTime<Utc>) -> Result<(), AppError> {
        if self.status != VisitStatus::Confirmed {
            return Err(self.state_error("realizada"));
        }

        self.status = VisitStatus::Realized;
        self.realized_at = Some(now.max(self.created_at));
        self.capture_agent(agent);
        self.updated_at = now;
        Ok(())
    }

    // O snapshot do corretor é gravado uma única vez
    fn capture_agent(&mut self, agent: Option<&AgentSnapshot>) {
        if self.agent_name.is_some() {
            return;
        }
        if let Some(agent) = agent {
            self.agent_name = Some(agent.name.clone());
            self.agent_email = Some(agent.email.clone());
        }
    }

    fn state_error(&self, action: &str) -> AppError {
        let message = match self.status {
            VisitStatus::Cancelled => format!("Esta visita já foi cancelada e não pode ser {}.", action),
            VisitStatus::Realized => format!("Esta visita já foi realizada e não pode ser {}.", action),
            status => format!(
                "A visita está com status '{}' e não pode ser {}.",
                status.as_str(),
                action
            ),
        };
        AppError::InvalidState(message)
    }
}
