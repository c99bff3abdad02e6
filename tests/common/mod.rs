#![allow(dead_code)]

use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::Barrier;
use uuid::Uuid;

use visitas_backend::{
    common::error::AppError,
    config::{AppConfig, AppState},
    db::{MemoryVisitStore, VisitStore},
    models::{
        auth::CurrentUser,
        feedback::{AgentSectionInput, ClientSectionInput, FeedbackPolicy, FeedbackStatus, VisitFeedback},
        outbox::{DispatchJob, OutboxJob},
        visit::{AgentSnapshot, NewVisit, Visit, VisitStatus},
    },
    services::dispatch::{
        dispatch_outbox, DispatchWorker, GeneratedReport, NotificationTemplate, Notifier, ReportGenerator,
    },
};

pub const JWT_SECRET: &str = "segredo-de-teste";

#[derive(Default)]
pub struct FakeNotifier {
    pub sent: Mutex<Vec<(NotificationTemplate, String, Value)>>,
}

impl FakeNotifier {
    pub fn templates(&self) -> Vec<NotificationTemplate> {
        self.sent.lock().unwrap().iter().map(|(t, _, _)| *t).collect()
    }

    pub fn sent_to(&self, template: NotificationTemplate) -> Vec<(String, Value)> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _, _)| *t == template)
            .map(|(_, r, p)| (r.clone(), p.clone()))
            .collect()
    }
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn notify(&self, template: NotificationTemplate, recipient: &str, payload: &Value) -> anyhow::Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((template, recipient.to_string(), payload.clone()));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeReportGenerator {
    pub calls: AtomicUsize,
}

impl FakeReportGenerator {
    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReportGenerator for FakeReportGenerator {
    async fn generate_report(&self, _construtora_id: Uuid, feedback_id: Uuid) -> anyhow::Result<GeneratedReport> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(GeneratedReport {
            url: format!("https://relatorios.exemplo.com/{}.pdf", feedback_id),
            generated_at: Utc::now(),
        })
    }
}

/// Leitura que espera a outra requisição chegar no mesmo ponto.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RacePoint {
    FindVisit,
    FindFeedback,
    FindFeedbackByToken,
}

/// Envolve o store em memória e, depois de `arm()`, segura as duas primeiras
/// leituras do ponto escolhido até que ambas tenham lido, forçando o conflito
/// no compare-and-set.
pub struct RacingStore {
    inner: Arc<MemoryVisitStore>,
    point: RacePoint,
    armed: AtomicBool,
    barrier: Barrier,
    arrivals: AtomicUsize,
}

impl RacingStore {
    pub fn new(inner: Arc<MemoryVisitStore>, point: RacePoint) -> Self {
        Self {
            inner,
            point,
            armed: AtomicBool::new(false),
            barrier: Barrier::new(2),
            arrivals: AtomicUsize::new(0),
        }
    }

    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    async fn gate(&self, point: RacePoint) {
        if point == self.point
            && self.armed.load(Ordering::SeqCst)
            && self.arrivals.fetch_add(1, Ordering::SeqCst) < 2
        {
            self.barrier.wait().await;
        }
    }
}

#[async_trait]
impl VisitStore for RacingStore {
    async fn insert_visit(&self, visit: &Visit) -> Result<(), AppError> {
        self.inner.insert_visit(visit).await
    }

    async fn find_visit(&self, construtora_id: Uuid, visit_id: Uuid) -> Result<Option<Visit>, AppError> {
        let found = self.inner.find_visit(construtora_id, visit_id).await;
        self.gate(RacePoint::FindVisit).await;
        found
    }

    async fn list_visits(&self, construtora_id: Uuid, status: Option<VisitStatus>) -> Result<Vec<Visit>, AppError> {
        self.inner.list_visits(construtora_id, status).await
    }

    async fn update_visit(
        &self,
        visit: &Visit,
        expected: VisitStatus,
        jobs: &[DispatchJob],
    ) -> Result<bool, AppError> {
        self.inner.update_visit(visit, expected, jobs).await
    }

    async fn realize_visit(
        &self,
        visit: &Visit,
        feedback: &VisitFeedback,
        jobs: &[DispatchJob],
    ) -> Result<bool, AppError> {
        self.inner.realize_visit(visit, feedback, jobs).await
    }

    async fn find_feedback(&self, construtora_id: Uuid, feedback_id: Uuid) -> Result<Option<VisitFeedback>, AppError> {
        let found = self.inner.find_feedback(construtora_id, feedback_id).await;
        self.gate(RacePoint::FindFeedback).await;
        found
    }

    async fn find_feedback_by_visit(
        &self,
        construtora_id: Uuid,
        visit_id: Uuid,
    ) -> Result<Option<VisitFeedback>, AppError> {
        self.inner.find_feedback_by_visit(construtora_id, visit_id).await
    }

    async fn find_feedback_by_token(&self, access_token: &str) -> Result<Option<VisitFeedback>, AppError> {
        let found = self.inner.find_feedback_by_token(access_token).await;
        self.gate(RacePoint::FindFeedbackByToken).await;
        found
    }

    async fn update_feedback(
        &self,
        feedback: &VisitFeedback,
        expected: FeedbackStatus,
        jobs: &[DispatchJob],
    ) -> Result<bool, AppError> {
        self.inner.update_feedback(feedback, expected, jobs).await
    }

    async fn record_report(
        &self,
        construtora_id: Uuid,
        feedback_id: Uuid,
        report_url: &str,
        generated_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        self.inner
            .record_report(construtora_id, feedback_id, report_url, generated_at)
            .await
    }

    async fn enqueue_jobs(&self, jobs: &[DispatchJob]) -> Result<(), AppError> {
        self.inner.enqueue_jobs(jobs).await
    }

    async fn reserve_job(&self, locked_until: DateTime<Utc>) -> Result<Option<OutboxJob>, AppError> {
        self.inner.reserve_job(locked_until).await
    }

    async fn complete_job(&self, job_id: Uuid) -> Result<(), AppError> {
        self.inner.complete_job(job_id).await
    }

    async fn fail_job(&self, job_id: Uuid, error: &str) -> Result<(), AppError> {
        self.inner.fail_job(job_id, error).await
    }
}

pub struct TestContext {
    pub state: AppState,
    pub worker: DispatchWorker,
    pub store: Arc<dyn VisitStore>,
    pub memory: Arc<MemoryVisitStore>,
    pub notifier: Arc<FakeNotifier>,
    pub reports: Arc<FakeReportGenerator>,
    pub race: Option<Arc<RacingStore>>,
    pub tenant: Uuid,
}

pub fn test_config(policy: FeedbackPolicy) -> AppConfig {
    AppConfig {
        database_url: "postgres://nao-usado".into(),
        jwt_secret: JWT_SECRET.into(),
        bind_addr: "127.0.0.1:0".into(),
        db_max_connections: 1,
        feedback_policy: policy,
        public_base_url: "https://app.exemplo.com".into(),
        notify_webhook_url: None,
        reports_dir: "./target/test-reports".into(),
        reports_base_url: "https://relatorios.exemplo.com".into(),
        fonts_dir: "./fonts".into(),
        dispatch_poll_interval: Duration::from_millis(50),
        collaborator_timeout: Duration::from_secs(2),
    }
}

impl TestContext {
    pub fn new() -> Self {
        Self::build(FeedbackPolicy::AgentFirst, None)
    }

    pub fn with_policy(policy: FeedbackPolicy) -> Self {
        Self::build(policy, None)
    }

    pub fn racing(point: RacePoint) -> Self {
        Self::build(FeedbackPolicy::AgentFirst, Some(point))
    }

    fn build(policy: FeedbackPolicy, race: Option<RacePoint>) -> Self {
        let memory = Arc::new(MemoryVisitStore::new());
        let race = race.map(|point| Arc::new(RacingStore::new(memory.clone(), point)));
        let store: Arc<dyn VisitStore> = match &race {
            Some(racing) => racing.clone(),
            None => memory.clone(),
        };
        let notifier = Arc::new(FakeNotifier::default());
        let reports = Arc::new(FakeReportGenerator::default());

        let (state, worker) =
            AppState::from_parts(test_config(policy), store.clone(), notifier.clone(), reports.clone());

        Self {
            state,
            worker,
            store,
            memory,
            notifier,
            reports,
            race,
            tenant: Uuid::new_v4(),
        }
    }

    /// Libera a barreira para as próximas duas leituras do ponto escolhido.
    pub fn arm_race(&self) {
        if let Some(race) = &self.race {
            race.arm();
        }
    }

    pub async fn drain(&self) -> usize {
        self.worker.drain().await
    }

    /// Troca o worker por um novo sobre o mesmo store, como após um restart
    /// do processo: o que estava só na memória do worker antigo se perde.
    pub fn restart_worker(&mut self) {
        let (_, worker) = dispatch_outbox(
            self.store.clone(),
            self.notifier.clone(),
            self.reports.clone(),
            Duration::from_secs(2),
            Duration::from_millis(50),
        );
        self.worker = worker;
    }

    pub fn new_visit(&self) -> NewVisit {
        let now = Utc::now();
        NewVisit {
            construtora_id: self.tenant,
            lead_id: Uuid::new_v4(),
            property_id: Uuid::new_v4(),
            agency_id: Some(Uuid::new_v4()),
            lead_name: "João da Silva".into(),
            lead_email: Some("joao@email.com".into()),
            property_title: "Residencial Jardim das Flores - Apto 302".into(),
            agency_email: Some("contato@imobiliaria.com.br".into()),
            option1: now + chrono::Duration::days(2),
            option2: now + chrono::Duration::days(3),
        }
    }

    pub async fn confirmed_visit(&self) -> Visit {
        let service = &self.state.visit_service;
        let visit = service.propose_visit(self.new_visit()).await.unwrap();
        service
            .confirm_visit(self.tenant, visit.id, visit.option1, Some(&agent()))
            .await
            .unwrap()
    }

    pub async fn realized_feedback(&self) -> (Visit, VisitFeedback) {
        let visit = self.confirmed_visit().await;
        self.state
            .visit_service
            .realize_visit(self.tenant, visit.id, None, None)
            .await
            .unwrap()
    }

    /// Visita realizada e avaliação do corretor já enviada.
    pub async fn awaiting_client(&self) -> VisitFeedback {
        let (_, feedback) = self.realized_feedback().await;
        self.state
            .feedback_service
            .submit_agent_section(self.tenant, feedback.id, best_agent_input())
            .await
            .unwrap()
    }
}

pub fn agent() -> AgentSnapshot {
    AgentSnapshot {
        name: "Carla Mendes".into(),
        email: "carla@imobiliaria.com.br".into(),
    }
}

pub fn user_with(permissions: &[&str]) -> CurrentUser {
    CurrentUser {
        id: Uuid::new_v4(),
        name: "Carla Mendes".into(),
        email: "carla@imobiliaria.com.br".into(),
        permissions: permissions.iter().map(|p| p.to_string()).collect(),
    }
}

// quente + total + 0-3 meses + orçamento = 100
pub fn best_agent_input() -> AgentSectionInput {
    serde_json::from_value(serde_json::json!({
        "durationMinutes": 50,
        "qualification": "quente",
        "decisionPower": "total",
        "purchaseHorizon": "0-3_meses",
        "availableBudget": 650000.0,
        "paymentMethod": "financiamento",
        "observations": "Cliente adorou a planta e quer simular o financiamento.",
        "followUp": true,
        "followUpDate": "2026-11-20",
        "signatureData": "data:image/png;base64,QUJD"
    }))
    .unwrap()
}

pub fn client_input(nps: i32) -> ClientSectionInput {
    serde_json::from_value(serde_json::json!({
        "nps": nps,
        "ratingLocation": 5,
        "ratingFinish": 4,
        "ratingLayout": 5,
        "ratingValue": 4,
        "ratingService": 5,
        "positives": "Localização excelente",
        "purchaseInterest": "muito_interessado",
        "objections": ["preco"],
        "truthfulDeclaration": true,
        "signatureData": "data:image/png;base64,WFla"
    }))
    .unwrap()
}
