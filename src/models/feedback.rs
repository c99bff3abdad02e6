// src/models/feedback.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::common::error::AppError;
use crate::common::validation::{
    min_observation_len, must_be_true, not_blank, parse_choice, validate_not_negative,
};
use crate::models::visit::Visit;

// --- ENUMS (status e política) ---

// Mapeia o CREATE TYPE feedback_status do banco
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "feedback_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FeedbackStatus {
    AguardandoCorretor,
    AguardandoCliente,
    Completo,
    Arquivado,
}

impl FeedbackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackStatus::AguardandoCorretor => "aguardando_corretor",
            FeedbackStatus::AguardandoCliente => "aguardando_cliente",
            FeedbackStatus::Completo => "completo",
            FeedbackStatus::Arquivado => "arquivado",
        }
    }
}

/// Quem é acionado quando a visita é realizada.
/// O feedback sempre nasce em `aguardando_corretor`; a política só decide
/// se o cliente recebe o link já na realização ou depois da assinatura do corretor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "feedback_policy", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FeedbackPolicy {
    AgentFirst,
    ClientFirst,
}

impl std::str::FromStr for FeedbackPolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_choice("policy", s)
    }
}

// --- ENUMS da seção do corretor ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LeadQualification {
    Quente,
    Morno,
    Frio,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DecisionPower {
    Total,
    Parcial,
    Nenhum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum PurchaseHorizon {
    #[serde(rename = "0-3_meses")]
    UpTo3Months,
    #[serde(rename = "3-6_meses")]
    From3To6Months,
    #[serde(rename = "6-12_meses")]
    From6To12Months,
    #[serde(rename = "12+_meses")]
    Over12Months,
    #[serde(rename = "indefinido")]
    Undefined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    AVista,
    Financiamento,
    Fgts,
    Consorcio,
    Permuta,
}

// --- ENUMS da seção do cliente ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseInterest {
    MuitoInteressado,
    Interessado,
    PoucoInteressado,
    SemInteresse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Objection {
    Preco,
    Localizacao,
    Tamanho,
    Acabamento,
    PrazoEntrega,
    CondicoesPagamento,
    Outro,
}

// --- SEÇÕES (o que fica gravado em JSONB) ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Signature {
    // Imagem da assinatura (data URL / base64)
    pub data: String,
    pub signed_at: DateTime<Utc>,
    pub device_fingerprint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AgentSection {
    #[schema(example = 45)]
    pub duration_minutes: i32,
    pub qualification: LeadQualification,
    pub decision_power: DecisionPower,
    pub decision_power_detail: Option<String>,
    pub purchase_horizon: PurchaseHorizon,
    #[schema(example = "500000.00")]
    pub available_budget: Option<Decimal>,
    pub payment_method: Option<PaymentMethod>,
    pub observations: String,
    pub next_steps: Option<String>,
    pub follow_up: bool,
    #[schema(value_type = Option<String>, format = Date, example = "2026-11-02")]
    pub follow_up_date: Option<NaiveDate>,
    #[schema(example = 100)]
    pub score_lead: u8,
    pub signature: Signature,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StarRatings {
    pub location: u8,
    pub finish: u8,
    pub layout: u8,
    pub value: u8,
    pub service: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClientSection {
    #[schema(example = 9)]
    pub nps: u8,
    pub ratings: StarRatings,
    pub positives: Option<String>,
    pub negatives: Option<String>,
    pub suggestions: Option<String>,
    pub purchase_interest: PurchaseInterest,
    pub objections: Vec<Objection>,
    pub objection_detail: Option<String>,
    pub truthful_declaration: bool,
    pub signature: Signature,
}

// --- FEEDBACK (O Registro) ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VisitFeedback {
    pub id: Uuid,
    pub visit_id: Uuid,
    #[schema(ignore)]
    pub construtora_id: Uuid,
    pub agency_id: Option<Uuid>,

    // Token do link público do cliente (gerado uma vez, imutável)
    pub access_token: String,
    pub status: FeedbackStatus,
    pub policy: FeedbackPolicy,

    pub agent_section: Option<AgentSection>,
    pub client_section: Option<ClientSection>,
    pub score_lead: Option<u8>,

    pub report_url: Option<String>,
    pub report_generated_at: Option<DateTime<Utc>>,
    pub content_hash: Option<String>,

    pub created_at: DateTime<Utc>,
    pub agent_submitted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub archived_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl VisitFeedback {
    pub fn new(visit: &Visit, policy: FeedbackPolicy, access_token: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            visit_id: visit.id,
            construtora_id: visit.construtora_id,
            agency_id: visit.agency_id,
            access_token,
            status: FeedbackStatus::AguardandoCorretor,
            policy,
            agent_section: None,
            client_section: None,
            score_lead: None,
            report_url: None,
            report_generated_at: None,
            content_hash: None,
            created_at: now,
            agent_submitted_at: None,
            completed_at: None,
            archived_at: None,
            updated_at: now,
        }
    }

    pub fn submit_agent(&mut self, section: AgentSection, now: DateTime<Utc>) -> Result<(), AppError> {
        // A seção é conferida antes do status: reenvio nunca sobrescreve
        if self.agent_section.is_some() {
            return Err(AppError::InvalidState(
                "A avaliação do corretor já foi enviada e não pode ser alterada.".into(),
            ));
        }
        if self.status != FeedbackStatus::AguardandoCorretor {
            return Err(self.state_error("receber a avaliação do corretor"));
        }

        self.score_lead = Some(section.score_lead);
        self.agent_section = Some(section);
        self.status = FeedbackStatus::AguardandoCliente;
        self.agent_submitted_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    pub fn submit_client(&mut self, section: ClientSection, now: DateTime<Utc>) -> Result<(), AppError> {
        if self.client_section.is_some() {
            return Err(AppError::InvalidState(
                "A avaliação do cliente já foi enviada e não pode ser alterada.".into(),
            ));
        }
        if self.status != FeedbackStatus::AguardandoCliente || self.agent_section.is_none() {
            return Err(self.state_error("receber a avaliação do cliente"));
        }

        self.client_section = Some(section);
        self.status = FeedbackStatus::Completo;
        self.completed_at = Some(now);
        self.content_hash = Some(self.compute_content_hash()?);
        self.updated_at = now;
        Ok(())
    }

    pub fn archive(&mut self, now: DateTime<Utc>) -> Result<(), AppError> {
        if self.status == FeedbackStatus::Arquivado {
            return Err(AppError::InvalidState("Este feedback já está arquivado.".into()));
        }

        self.status = FeedbackStatus::Arquivado;
        self.archived_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// SHA-256 das duas seções, para evidenciar alteração posterior do conteúdo.
    pub fn compute_content_hash(&self) -> Result<String, AppError> {
        let canonical = serde_json::to_vec(&json!({
            "feedbackId": self.id,
            "visitId": self.visit_id,
            "agent": self.agent_section,
            "client": self.client_section,
        }))
        .map_err(|e| AppError::InternalServerError(e.into()))?;

        Ok(hex::encode(Sha256::digest(&canonical)))
    }

    /// Confere as regras de presença das seções para o status atual.
    pub fn sections_consistent(&self) -> bool {
        match self.status {
            FeedbackStatus::AguardandoCorretor => self.agent_section.is_none() && self.client_section.is_none(),
            FeedbackStatus::AguardandoCliente => self.agent_section.is_some() && self.client_section.is_none(),
            FeedbackStatus::Completo => {
                let agent_signed = self
                    .agent_section
                    .as_ref()
                    .is_some_and(|s| !s.signature.data.trim().is_empty());
                let client_signed = self
                    .client_section
                    .as_ref()
                    .is_some_and(|s| !s.signature.data.trim().is_empty());
                agent_signed && client_signed
            }
            // Arquivamento pode acontecer em qualquer etapa
            FeedbackStatus::Arquivado => self.client_section.is_none() || self.agent_section.is_some(),
        }
    }

    /// O que o link público mostra para o cliente.
    pub fn public_view(&self, visit: &Visit) -> PublicFeedbackView {
        match self.status {
            FeedbackStatus::AguardandoCliente => PublicFeedbackView::Form {
                property_title: visit.property_title.clone(),
                agent_name: visit.agent_name.clone(),
                visit_date: visit.confirmed_slot.or(visit.realized_at),
            },
            FeedbackStatus::AguardandoCorretor => PublicFeedbackView::WaitingOnAgent {
                property_title: visit.property_title.clone(),
            },
            FeedbackStatus::Completo | FeedbackStatus::Arquivado => PublicFeedbackView::AlreadySubmitted,
        }
    }

    fn state_error(&self, action: &str) -> AppError {
        let message = match self.status {
            FeedbackStatus::Arquivado => format!("Este feedback foi arquivado e não pode {}.", action),
            FeedbackStatus::Completo => format!("Este feedback já foi concluído e não pode {}.", action),
            status => format!(
                "O feedback está com status '{}' e não pode {}.",
                status.as_str(),
                action
            ),
        };
        AppError::InvalidState(message)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum PublicFeedbackView {
    #[serde(rename_all = "camelCase")]
    Form {
        property_title: String,
        agent_name: Option<String>,
        visit_date: Option<DateTime<Utc>>,
    },
    #[serde(rename_all = "camelCase")]
    WaitingOnAgent { property_title: String },
    AlreadySubmitted,
}

// =============================================================================
//  ENTRADAS (payloads validados antes de virar seção)
// =============================================================================

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AgentSectionInput {
    #[validate(range(min = 1, max = 1440, message = "Duração deve ficar entre 1 e 1440 minutos."))]
    #[schema(example = 45)]
    pub duration_minutes: i32,

    #[schema(example = "quente")]
    pub qualification: String,

    #[schema(example = "total")]
    pub decision_power: String,
    pub decision_power_detail: Option<String>,

    #[schema(example = "0-3_meses")]
    pub purchase_horizon: String,

    #[validate(custom(function = "validate_not_negative"))]
    #[schema(example = "500000.00")]
    pub available_budget: Option<Decimal>,

    #[schema(example = "financiamento")]
    pub payment_method: Option<String>,

    #[validate(custom(function = "min_observation_len"))]
    #[schema(example = "Cliente gostou muito da planta e da vista.")]
    pub observations: String,

    pub next_steps: Option<String>,

    #[serde(default)]
    pub follow_up: bool,
    #[schema(value_type = Option<String>, format = Date, example = "2026-11-02")]
    pub follow_up_date: Option<NaiveDate>,

    #[validate(custom(function = "not_blank"))]
    pub signature_data: String,
    pub device_fingerprint: Option<String>,
}

impl AgentSectionInput {
    /// Valida, converte os enums e calcula o score do lead.
    pub fn into_section(self, now: DateTime<Utc>) -> Result<AgentSection, AppError> {
        self.validate()?;

        if self.follow_up && self.follow_up_date.is_none() {
            return Err(AppError::field(
                "followUpDate",
                "required",
                "Informe a data do follow-up.",
            ));
        }

        let qualification: LeadQualification = parse_choice("qualification", &self.qualification)?;
        let decision_power: DecisionPower = parse_choice("decisionPower", &self.decision_power)?;
        let purchase_horizon: PurchaseHorizon = parse_choice("purchaseHorizon", &self.purchase_horizon)?;
        let payment_method = self
            .payment_method
            .as_deref()
            .map(|value| parse_choice::<PaymentMethod>("paymentMethod", value))
            .transpose()?;

        let score_lead = crate::services::scoring::score(&crate::services::scoring::ScoringInput {
            qualification,
            decision_power,
            purchase_horizon,
            available_budget: self.available_budget,
        });

        Ok(AgentSection {
            duration_minutes: self.duration_minutes,
            qualification,
            decision_power,
            decision_power_detail: self.decision_power_detail,
            purchase_horizon,
            available_budget: self.available_budget,
            payment_method,
            observations: self.observations.trim().to_string(),
            next_steps: self.next_steps,
            follow_up: self.follow_up,
            follow_up_date: if self.follow_up { self.follow_up_date } else { None },
            score_lead,
            signature: Signature {
                data: self.signature_data,
                signed_at: now,
                device_fingerprint: self.device_fingerprint,
            },
        })
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClientSectionInput {
    #[validate(range(min = 0, max = 10, message = "O NPS deve ficar entre 0 e 10."))]
    #[schema(example = 9)]
    pub nps: i32,

    #[validate(range(min = 1, max = 5, message = "A nota deve ficar entre 1 e 5."))]
    pub rating_location: i32,
    #[validate(range(min = 1, max = 5, message = "A nota deve ficar entre 1 e 5."))]
    pub rating_finish: i32,
    #[validate(range(min = 1, max = 5, message = "A nota deve ficar entre 1 e 5."))]
    pub rating_layout: i32,
    #[validate(range(min = 1, max = 5, message = "A nota deve ficar entre 1 e 5."))]
    pub rating_value: i32,
    #[validate(range(min = 1, max = 5, message = "A nota deve ficar entre 1 e 5."))]
    pub rating_service: i32,

    pub positives: Option<String>,
    pub negatives: Option<String>,
    pub suggestions: Option<String>,

    #[schema(example = "interessado")]
    pub purchase_interest: String,

    #[serde(default)]
    #[schema(example = json!(["preco", "prazo_entrega"]))]
    pub objections: Vec<String>,
    pub objection_detail: Option<String>,

    #[validate(custom(function = "must_be_true"))]
    #[serde(default)]
    pub truthful_declaration: bool,

    #[validate(custom(function = "not_blank"))]
    pub signature_data: String,
    pub device_fingerprint: Option<String>,
}

impl ClientSectionInput {
    pub fn into_section(self, now: DateTime<Utc>) -> Result<ClientSection, AppError> {
        self.validate()?;

        let purchase_interest: PurchaseInterest = parse_choice("purchaseInterest", &self.purchase_interest)?;

        // Conjunto: ordena e remove repetidos
        let mut objections = self
            .objections
            .iter()
            .map(|tag| parse_choice::<Objection>("objections", tag))
            .collect::<Result<Vec<_>, _>>()?;
        objections.sort();
        objections.dedup();

        // Os ranges já foram validados acima
        let star = |value: i32| value as u8;

        Ok(ClientSection {
            nps: self.nps as u8,
            ratings: StarRatings {
                location: star(self.rating_location),
                finish: star(self.rating_finish),
                layout: star(self.rating_layout),
                value: star(self.rating_value),
                service: star(self.rating_service),
            },
            positives: self.positives,
            negatives: self.negatives,
            suggestions: self.suggestions,
            purchase_interest,
            objections,
            objection_detail: self.objection_detail,
            truthful_declaration: self.truthful_declaration,
            signature: Signature {
                data: self.signature_data,
                signed_at: now,
                device_fingerprint: self.device_fingerprint,
            },
        })
    }
}
