// src/db.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        feedback::{FeedbackStatus, VisitFeedback},
        outbox::{DispatchJob, OutboxJob},
        visit::{Visit, VisitStatus},
    },
};

pub mod memory_store;
pub use memory_store::MemoryVisitStore;
pub mod visit_repo;
pub use visit_repo::VisitRepository;

/// Acesso ao armazenamento de visitas e feedbacks.
///
/// Toda escrita de transição é condicional: só grava se o status persistido
/// ainda for o `expected` lido antes. `Ok(false)` significa que outra
/// requisição mudou o registro primeiro.
///
/// Os `jobs` de cada transição entram no outbox na mesma unidade atômica:
/// gravados se e somente se a transição foi gravada.
#[async_trait]
pub trait VisitStore: Send + Sync + 'static {
    async fn insert_visit(&self, visit: &Visit) -> Result<(), AppError>;

    async fn find_visit(&self, construtora_id: Uuid, visit_id: Uuid) -> Result<Option<Visit>, AppError>;

    async fn list_visits(
        &self,
        construtora_id: Uuid,
        status: Option<VisitStatus>,
    ) -> Result<Vec<Visit>, AppError>;

    async fn update_visit(
        &self,
        visit: &Visit,
        expected: VisitStatus,
        jobs: &[DispatchJob],
    ) -> Result<bool, AppError>;

    /// Grava a visita realizada e cria o feedback na mesma unidade atômica.
    /// Se qualquer parte falhar, nada é gravado.
    async fn realize_visit(
        &self,
        visit: &Visit,
        feedback: &VisitFeedback,
        jobs: &[DispatchJob],
    ) -> Result<bool, AppError>;

    async fn find_feedback(
        &self,
        construtora_id: Uuid,
        feedback_id: Uuid,
    ) -> Result<Option<VisitFeedback>, AppError>;

    async fn find_feedback_by_visit(
        &self,
        construtora_id: Uuid,
        visit_id: Uuid,
    ) -> Result<Option<VisitFeedback>, AppError>;

    async fn find_feedback_by_token(&self, access_token: &str) -> Result<Option<VisitFeedback>, AppError>;

    /// Não toca nas colunas do relatório, que têm escrita própria.
    async fn update_feedback(
        &self,
        feedback: &VisitFeedback,
        expected: FeedbackStatus,
        jobs: &[DispatchJob],
    ) -> Result<bool, AppError>;

    async fn record_report(
        &self,
        construtora_id: Uuid,
        feedback_id: Uuid,
        report_url: &str,
        generated_at: DateTime<Utc>,
    ) -> Result<(), AppError>;

    // --- Outbox de despacho ---

    /// Enfileira jobs fora de uma transição (regeração de relatório).
    async fn enqueue_jobs(&self, jobs: &[DispatchJob]) -> Result<(), AppError>;

    /// Reserva o job mais antigo que está na fila ou cuja reserva expirou.
    async fn reserve_job(&self, locked_until: DateTime<Utc>) -> Result<Option<OutboxJob>, AppError>;

    async fn complete_job(&self, job_id: Uuid) -> Result<(), AppError>;

    async fn fail_job(&self, job_id: Uuid, error: &str) -> Result<(), AppError>;
}
