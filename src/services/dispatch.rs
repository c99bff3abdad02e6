// src/services/dispatch.rs

use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::{common::error::AppError, db::VisitStore, models::outbox::OutboxJob};

pub use crate::models::outbox::{DispatchJob, NotificationTemplate};

// Uma tentativa + uma nova tentativa por reserva; depois o job fica como `failed`
const MAX_ATTEMPTS: u32 = 2;

/// Colaborador externo que entrega e-mails/mensagens.
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn notify(&self, template: NotificationTemplate, recipient: &str, payload: &Value) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedReport {
    pub url: String,
    pub generated_at: DateTime<Utc>,
}

/// Colaborador externo que gera o relatório do feedback.
/// Precisa poder ser chamado de novo para o mesmo feedback (regeração).
#[async_trait]
pub trait ReportGenerator: Send + Sync + 'static {
    async fn generate_report(&self, construtora_id: Uuid, feedback_id: Uuid) -> anyhow::Result<GeneratedReport>;
}

/// Acorda o worker depois que uma transição gravou jobs no outbox.
/// Se ninguém estiver esperando, o aviso fica guardado para a próxima espera.
#[derive(Clone)]
pub struct Dispatcher {
    wake: Arc<Notify>,
}

impl Dispatcher {
    pub fn wake(&self) {
        self.wake.notify_one();
    }
}

/// Consome a tabela `dispatch_jobs`: reserva, executa com timeout e confirma.
pub struct DispatchWorker {
    store: Arc<dyn VisitStore>,
    notifier: Arc<dyn Notifier>,
    reports: Arc<dyn ReportGenerator>,
    timeout: Duration,
    poll_interval: Duration,
    wake: Arc<Notify>,
}

pub fn dispatch_outbox(
    store: Arc<dyn VisitStore>,
    notifier: Arc<dyn Notifier>,
    reports: Arc<dyn ReportGenerator>,
    timeout: Duration,
    poll_interval: Duration,
) -> (Dispatcher, DispatchWorker) {
    let wake = Arc::new(Notify::new());
    (
        Dispatcher { wake: wake.clone() },
        DispatchWorker {
            store,
            notifier,
            reports,
            timeout,
            poll_interval,
            wake,
        },
    )
}

impl DispatchWorker {
    pub async fn run(self) {
        tracing::info!("📮 Worker de notificações e relatórios iniciado");
        loop {
            match self.tick().await {
                Ok(true) => {}
                Ok(false) => {
                    tokio::select! {
                        _ = self.wake.notified() => {}
                        _ = tokio::time::sleep(self.poll_interval) => {}
                    }
                }
                Err(e) => {
                    tracing::error!("Falha ao ler o outbox de despacho: {:?}", e);
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }

    /// Processa o que já está no outbox e retorna quantos jobs rodaram.
    pub async fn drain(&self) -> usize {
        let mut processed = 0;
        loop {
            match self.tick().await {
                Ok(true) => processed += 1,
                Ok(false) => break,
                Err(e) => {
                    tracing::error!("Falha ao ler o outbox de despacho: {:?}", e);
                    break;
                }
            }
        }
        processed
    }

    // Ok(false) quando não há job disponível
    async fn tick(&self) -> Result<bool, AppError> {
        let Some(outbox) = self.store.reserve_job(self.lease_deadline()).await? else {
            return Ok(false);
        };

        match self.handle(&outbox).await {
            Ok(()) => self.store.complete_job(outbox.id).await?,
            Err(e) => self.store.fail_job(outbox.id, &format!("{:#}", e)).await?,
        }
        Ok(true)
    }

    // Reserva que expira: se o processo cair no meio, o job volta para a fila
    fn lease_deadline(&self) -> DateTime<Utc> {
        let lease = chrono::Duration::from_std(self.timeout * (MAX_ATTEMPTS + 1))
            .unwrap_or_else(|_| chrono::Duration::minutes(5));
        Utc::now() + lease
    }

    async fn handle(&self, outbox: &OutboxJob) -> anyhow::Result<()> {
        let job = &outbox.job;
        let mut attempt = 1;
        loop {
            match self.execute(job).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < MAX_ATTEMPTS => {
                    tracing::warn!(job_id = %outbox.id, kind = job.kind(), attempt, "Falha no despacho, tentando novamente: {:#}", e);
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(job_id = %outbox.id, kind = job.kind(), attempt, "Falha no despacho, desistindo: {:#}", e);
                    return Err(e);
                }
            }
        }
    }

    async fn execute(&self, job: &DispatchJob) -> anyhow::Result<()> {
        match job {
            DispatchJob::Notify {
                template,
                recipient,
                payload,
            } => {
                tokio::time::timeout(self.timeout, self.notifier.notify(*template, recipient, payload))
                    .await
                    .map_err(|_| anyhow!("tempo esgotado ao notificar"))??;

                tracing::info!(template = template.as_str(), "Notificação enviada");
            }
            DispatchJob::GenerateReport {
                construtora_id,
                feedback_id,
            } => {
                let report = tokio::time::timeout(
                    self.timeout,
                    self.reports.generate_report(*construtora_id, *feedback_id),
                )
                .await
                .map_err(|_| anyhow!("tempo esgotado ao gerar relatório"))??;

                self.store
                    .record_report(*construtora_id, *feedback_id, &report.url, report.generated_at)
                    .await
                    .context("falha ao gravar a URL do relatório")?;

                tracing::info!(%feedback_id, url = %report.url, "Relatório gerado");
            }
        }
        Ok(())
    }
}
