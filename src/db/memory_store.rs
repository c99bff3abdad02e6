// src/db/memory_store.rs

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::VisitStore,
    models::{
        feedback::{FeedbackStatus, VisitFeedback},
        outbox::{DispatchJob, OutboxJob, JOB_FAILED, JOB_PROCESSING, JOB_QUEUED, JOB_SUCCEEDED},
        visit::{Visit, VisitStatus},
    },
};

struct StoredJob {
    id: Uuid,
    job: DispatchJob,
    status: &'static str,
    attempts: i32,
    last_error: Option<String>,
    locked_until: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct MemoryState {
    visits: HashMap<Uuid, Visit>,
    feedbacks: HashMap<Uuid, VisitFeedback>,
    // Em ordem de criação, como o ORDER BY created_at do Postgres
    jobs: Vec<StoredJob>,
}

impl MemoryState {
    fn push_jobs(&mut self, jobs: &[DispatchJob]) {
        self.jobs.extend(jobs.iter().cloned().map(|job| StoredJob {
            id: Uuid::new_v4(),
            job,
            status: JOB_QUEUED,
            attempts: 0,
            last_error: None,
            locked_until: None,
        }));
    }

    fn job_mut(&mut self, job_id: Uuid) -> Result<&mut StoredJob, AppError> {
        self.jobs
            .iter_mut()
            .find(|j| j.id == job_id)
            .ok_or_else(|| AppError::ResourceNotFound(format!("Job {}", job_id)))
    }
}

/// Implementação em memória do `VisitStore`, para testes e execução local
/// sem Postgres. Um único lock cobre visitas e feedbacks, então cada
/// operação é atômica como uma transação.
#[derive(Default)]
pub struct MemoryVisitStore {
    state: Mutex<MemoryState>,
}

impl MemoryVisitStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn feedback_count_for_visit(&self, visit_id: Uuid) -> usize {
        let guard = self.state.lock().await;
        guard.feedbacks.values().filter(|f| f.visit_id == visit_id).count()
    }

    /// Jobs ainda não concluídos (na fila ou reservados).
    pub async fn pending_jobs(&self) -> usize {
        let guard = self.state.lock().await;
        guard
            .jobs
            .iter()
            .filter(|j| j.status == JOB_QUEUED || j.status == JOB_PROCESSING)
            .count()
    }

    pub async fn failed_jobs(&self) -> Vec<(DispatchJob, String)> {
        let guard = self.state.lock().await;
        guard
            .jobs
            .iter()
            .filter(|j| j.status == JOB_FAILED)
            .map(|j| (j.job.clone(), j.last_error.clone().unwrap_or_default()))
            .collect()
    }
}

#[async_trait]
impl VisitStore for MemoryVisitStore {
    async fn insert_visit(&self, visit: &Visit) -> Result<(), AppError> {
        let mut guard = self.state.lock().await;
        if guard.visits.contains_key(&visit.id) {
            return Err(AppError::InvalidState(format!("Visita {} já existe.", visit.id)));
        }
        guard.visits.insert(visit.id, visit.clone());
        Ok(())
    }

    async fn find_visit(&self, construtora_id: Uuid, visit_id: Uuid) -> Result<Option<Visit>, AppError> {
        let guard = self.state.lock().await;
        Ok(guard
            .visits
            .get(&visit_id)
            .filter(|v| v.construtora_id == construtora_id)
            .cloned())
    }

    async fn list_visits(
        &self,
        construtora_id: Uuid,
        status: Option<VisitStatus>,
    ) -> Result<Vec<Visit>, AppError> {
        let guard = self.state.lock().await;
        let mut visits: Vec<Visit> = guard
            .visits
            .values()
            .filter(|v| v.construtora_id == construtora_id)
            .filter(|v| status.is_none_or(|s| v.status == s))
            .cloned()
            .collect();
        visits.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(visits)
    }

    async fn update_visit(
        &self,
        visit: &Visit,
        expected: VisitStatus,
        jobs: &[DispatchJob],
    ) -> Result<bool, AppError> {
        let mut guard = self.state.lock().await;
        match guard.visits.get_mut(&visit.id) {
            Some(current) if current.construtora_id == visit.construtora_id && current.status == expected => {
                *current = visit.clone();
                guard.push_jobs(jobs);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn realize_visit(
        &self,
        visit: &Visit,
        feedback: &VisitFeedback,
        jobs: &[DispatchJob],
    ) -> Result<bool, AppError> {
        let mut guard = self.state.lock().await;

        let confirmed = guard
            .visits
            .get(&visit.id)
            .is_some_and(|v| v.construtora_id == visit.construtora_id && v.status == VisitStatus::Confirmed);
        // Mesmas restrições UNIQUE da tabela visit_feedbacks
        let duplicated = guard
            .feedbacks
            .values()
            .any(|f| f.visit_id == visit.id || f.access_token == feedback.access_token);

        if !confirmed || duplicated {
            return Ok(false);
        }

        guard.visits.insert(visit.id, visit.clone());
        guard.feedbacks.insert(feedback.id, feedback.clone());
        guard.push_jobs(jobs);
        Ok(true)
    }

    async fn find_feedback(
        &self,
        construtora_id: Uuid,
        feedback_id: Uuid,
    ) -> Result<Option<VisitFeedback>, AppError> {
        let guard = self.state.lock().await;
        Ok(guard
            .feedbacks
            .get(&feedback_id)
            .filter(|f| f.construtora_id == construtora_id)
            .cloned())
    }

    async fn find_feedback_by_visit(
        &self,
        construtora_id: Uuid,
        visit_id: Uuid,
    ) -> Result<Option<VisitFeedback>, AppError> {
        let guard = self.state.lock().await;
        Ok(guard
            .feedbacks
            .values()
            .find(|f| f.visit_id == visit_id && f.construtora_id == construtora_id)
            .cloned())
    }

    async fn find_feedback_by_token(&self, access_token: &str) -> Result<Option<VisitFeedback>, AppError> {
        let guard = self.state.lock().await;
        Ok(guard
            .feedbacks
            .values()
            .find(|f| f.access_token == access_token)
            .cloned())
    }

    async fn update_feedback(
        &self,
        feedback: &VisitFeedback,
        expected: FeedbackStatus,
        jobs: &[DispatchJob],
    ) -> Result<bool, AppError> {
        let mut guard = self.state.lock().await;
        match guard.feedbacks.get_mut(&feedback.id) {
            Some(current) if current.construtora_id == feedback.construtora_id && current.status == expected => {
                let report_url = current.report_url.take();
                let report_generated_at = current.report_generated_at.take();
                *current = feedback.clone();
                current.report_url = report_url;
                current.report_generated_at = report_generated_at;
                guard.push_jobs(jobs);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record_report(
        &self,
        construtora_id: Uuid,
        feedback_id: Uuid,
        report_url: &str,
        generated_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let mut guard = self.state.lock().await;
        let feedback = guard
            .feedbacks
            .get_mut(&feedback_id)
            .filter(|f| f.construtora_id == construtora_id)
            .ok_or_else(|| AppError::ResourceNotFound(format!("Feedback {}", feedback_id)))?;

        feedback.report_url = Some(report_url.to_string());
        feedback.report_generated_at = Some(generated_at);
        Ok(())
    }

    async fn enqueue_jobs(&self, jobs: &[DispatchJob]) -> Result<(), AppError> {
        self.state.lock().await.push_jobs(jobs);
        Ok(())
    }

    async fn reserve_job(&self, locked_until: DateTime<Utc>) -> Result<Option<OutboxJob>, AppError> {
        let now = Utc::now();
        let mut guard = self.state.lock().await;

        let next = guard.jobs.iter_mut().find(|j| {
            j.status == JOB_QUEUED || (j.status == JOB_PROCESSING && j.locked_until.is_some_and(|until| until < now))
        });

        Ok(next.map(|stored| {
            stored.status = JOB_PROCESSING;
            stored.attempts += 1;
            stored.locked_until = Some(locked_until);
            OutboxJob {
                id: stored.id,
                job: stored.job.clone(),
                attempts: stored.attempts,
                locked_until,
            }
        }))
    }

    async fn complete_job(&self, job_id: Uuid) -> Result<(), AppError> {
        let mut guard = self.state.lock().await;
        let stored = guard.job_mut(job_id)?;
        stored.status = JOB_SUCCEEDED;
        stored.last_error = None;
        stored.locked_until = None;
        Ok(())
    }

    async fn fail_job(&self, job_id: Uuid, error: &str) -> Result<(), AppError> {
        let mut guard = self.state.lock().await;
        let stored = guard.job_mut(job_id)?;
        stored.status = JOB_FAILED;
        stored.last_error = Some(error.to_string());
        stored.locked_until = None;
        Ok(())
    }
}
