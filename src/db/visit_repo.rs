// src/db/visit_repo.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{types::Json, FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::{
    common::{
        db_utils::{begin_public_tx, begin_tenant_tx},
        error::AppError,
    },
    db::VisitStore,
    models::{
        feedback::{AgentSection, ClientSection, FeedbackPolicy, FeedbackStatus, VisitFeedback},
        outbox::{DispatchJob, OutboxJob, JOB_FAILED, JOB_PROCESSING, JOB_QUEUED, JOB_SUCCEEDED},
        visit::{Visit, VisitStatus},
    },
};

const VISIT_COLUMNS: &str = r#"
    id, construtora_id, lead_id, property_id, agency_id,
    lead_name, lead_email, property_title, agency_email,
    option1, option2, confirmed_slot,
    status, cancellation_reason,
    agent_name, agent_email,
    created_at, confirmed_at, realized_at, cancelled_at, updated_at
"#;

const FEEDBACK_COLUMNS: &str = r#"
    id, visit_id, construtora_id, agency_id,
    access_token, status, policy,
    agent_section, client_section, score_lead,
    report_url, report_generated_at, content_hash,
    created_at, agent_submitted_at, completed_at, archived_at, updated_at
"#;

// As seções vivem em JSONB; aqui fica o formato da linha
#[derive(Debug, FromRow)]
struct FeedbackRow {
    id: Uuid,
    visit_id: Uuid,
    construtora_id: Uuid,
    agency_id: Option<Uuid>,
    access_token: String,
    status: FeedbackStatus,
    policy: FeedbackPolicy,
    agent_section: Option<Json<AgentSection>>,
    client_section: Option<Json<ClientSection>>,
    score_lead: Option<i16>,
    report_url: Option<String>,
    report_generated_at: Option<DateTime<Utc>>,
    content_hash: Option<String>,
    created_at: DateTime<Utc>,
    agent_submitted_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    archived_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl From<FeedbackRow> for VisitFeedback {
    fn from(row: FeedbackRow) -> Self {
        Self {
            id: row.id,
            visit_id: row.visit_id,
            construtora_id: row.construtora_id,
            agency_id: row.agency_id,
            access_token: row.access_token,
            status: row.status,
            policy: row.policy,
            agent_section: row.agent_section.map(|Json(section)| section),
            client_section: row.client_section.map(|Json(section)| section),
            score_lead: row.score_lead.and_then(|s| u8::try_from(s).ok()),
            report_url: row.report_url,
            report_generated_at: row.report_generated_at,
            content_hash: row.content_hash,
            created_at: row.created_at,
            agent_submitted_at: row.agent_submitted_at,
            completed_at: row.completed_at,
            archived_at: row.archived_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct JobRow {
    id: Uuid,
    payload: Json<DispatchJob>,
    attempts: i32,
    locked_until: Option<DateTime<Utc>>,
}

// O repositório de visitas, responsável pelas tabelas 'visits' e 'visit_feedbacks'
#[derive(Clone)]
pub struct VisitRepository {
    pool: PgPool,
}

impl VisitRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_feedback(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        feedback: &VisitFeedback,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO visit_feedbacks (
                id, visit_id, construtora_id, agency_id,
                access_token, status, policy, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(feedback.id)
        .bind(feedback.visit_id)
        .bind(feedback.construtora_id)
        .bind(feedback.agency_id)
        .bind(&feedback.access_token)
        .bind(feedback.status)
        .bind(feedback.policy)
        .bind(feedback.created_at)
        .bind(feedback.updated_at)
        .execute(&mut **tx)
        .await;

        match result {
            Ok(_) => Ok(true),
            // UNIQUE(visit_id): já existe feedback para esta visita
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

// Grava os jobs do outbox dentro da transação de quem os originou
async fn insert_jobs(
    tx: &mut Transaction<'static, Postgres>,
    jobs: &[DispatchJob],
) -> Result<(), AppError> {
    for job in jobs {
        sqlx::query(
            r#"
            INSERT INTO dispatch_jobs (id, kind, payload, status)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(job.kind())
        .bind(Json(job))
        .bind(JOB_QUEUED)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

#[async_trait]
impl VisitStore for VisitRepository {
    async fn insert_visit(&self, visit: &Visit) -> Result<(), AppError> {
        let mut tx = begin_tenant_tx(&self.pool, visit.construtora_id).await?;

        sqlx::query(
            r#"
            INSERT INTO visits (
                id, construtora_id, lead_id, property_id, agency_id,
                lead_name, lead_email, property_title, agency_email,
                option1, option2, status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(visit.id)
        .bind(visit.construtora_id)
        .bind(visit.lead_id)
        .bind(visit.property_id)
        .bind(visit.agency_id)
        .bind(&visit.lead_name)
        .bind(&visit.lead_email)
        .bind(&visit.property_title)
        .bind(&visit.agency_email)
        .bind(visit.option1)
        .bind(visit.option2)
        .bind(visit.status)
        .bind(visit.created_at)
        .bind(visit.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn find_visit(&self, construtora_id: Uuid, visit_id: Uuid) -> Result<Option<Visit>, AppError> {
        let mut tx = begin_tenant_tx(&self.pool, construtora_id).await?;

        let visit = sqlx::query_as::<_, Visit>(&format!(
            "SELECT {} FROM visits WHERE id = $1 AND construtora_id = $2",
            VISIT_COLUMNS
        ))
        .bind(visit_id)
        .bind(construtora_id)
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(visit)
    }

    async fn list_visits(
        &self,
        construtora_id: Uuid,
        status: Option<VisitStatus>,
    ) -> Result<Vec<Visit>, AppError> {
        let mut tx = begin_tenant_tx(&self.pool, construtora_id).await?;

        let visits = sqlx::query_as::<_, Visit>(&format!(
            r#"
            SELECT {} FROM visits
            WHERE construtora_id = $1
              AND ($2::visit_status IS NULL OR status = $2)
            ORDER BY created_at DESC
            LIMIT 200
            "#,
            VISIT_COLUMNS
        ))
        .bind(construtora_id)
        .bind(status)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(visits)
    }

    async fn update_visit(
        &self,
        visit: &Visit,
        expected: VisitStatus,
        jobs: &[DispatchJob],
    ) -> Result<bool, AppError> {
        let mut tx = begin_tenant_tx(&self.pool, visit.construtora_id).await?;

        // Compare-and-swap no status: só uma transição concorrente vence
        let result = sqlx::query(
            r#"
            UPDATE visits SET
                option1 = $1, option2 = $2, confirmed_slot = $3,
                status = $4, cancellation_reason = $5,
                agent_name = $6, agent_email = $7,
                confirmed_at = $8, realized_at = $9, cancelled_at = $10,
                updated_at = $11
            WHERE id = $12 AND construtora_id = $13 AND status = $14
            "#,
        )
        .bind(visit.option1)
        .bind(visit.option2)
        .bind(visit.confirmed_slot)
        .bind(visit.status)
        .bind(&visit.cancellation_reason)
        .bind(&visit.agent_name)
        .bind(&visit.agent_email)
        .bind(visit.confirmed_at)
        .bind(visit.realized_at)
        .bind(visit.cancelled_at)
        .bind(visit.updated_at)
        .bind(visit.id)
        .bind(visit.construtora_id)
        .bind(expected)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() != 1 {
            tx.rollback().await?;
            return Ok(false);
        }

        insert_jobs(&mut tx, jobs).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn realize_visit(
        &self,
        visit: &Visit,
        feedback: &VisitFeedback,
        jobs: &[DispatchJob],
    ) -> Result<bool, AppError> {
        let mut tx = begin_tenant_tx(&self.pool, visit.construtora_id).await?;

        let result = sqlx::query(
            r#"
            UPDATE visits SET
                status = $1, realized_at = $2,
                agent_name = $3, agent_email = $4, updated_at = $5
            WHERE id = $6 AND construtora_id = $7 AND status = 'confirmed'
            "#,
        )
        .bind(visit.status)
        .bind(visit.realized_at)
        .bind(&visit.agent_name)
        .bind(&visit.agent_email)
        .bind(visit.updated_at)
        .bind(visit.id)
        .bind(visit.construtora_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() != 1 {
            tx.rollback().await?;
            return Ok(false);
        }

        // Se o feedback não entra, a visita também não fica realizada
        if !self.insert_feedback(&mut tx, feedback).await? {
            tx.rollback().await?;
            return Ok(false);
        }

        insert_jobs(&mut tx, jobs).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn find_feedback(
        &self,
        construtora_id: Uuid,
        feedback_id: Uuid,
    ) -> Result<Option<VisitFeedback>, AppError> {
        let mut tx = begin_tenant_tx(&self.pool, construtora_id).await?;

        let row = sqlx::query_as::<_, FeedbackRow>(&format!(
            "SELECT {} FROM visit_feedbacks WHERE id = $1 AND construtora_id = $2",
            FEEDBACK_COLUMNS
        ))
        .bind(feedback_id)
        .bind(construtora_id)
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.map(VisitFeedback::from))
    }

    async fn find_feedback_by_visit(
        &self,
        construtora_id: Uuid,
        visit_id: Uuid,
    ) -> Result<Option<VisitFeedback>, AppError> {
        let mut tx = begin_tenant_tx(&self.pool, construtora_id).await?;

        let row = sqlx::query_as::<_, FeedbackRow>(&format!(
            "SELECT {} FROM visit_feedbacks WHERE visit_id = $1 AND construtora_id = $2",
            FEEDBACK_COLUMNS
        ))
        .bind(visit_id)
        .bind(construtora_id)
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.map(VisitFeedback::from))
    }

    async fn find_feedback_by_token(&self, access_token: &str) -> Result<Option<VisitFeedback>, AppError> {
        let mut tx = begin_public_tx(&self.pool, access_token).await?;

        let row = sqlx::query_as::<_, FeedbackRow>(&format!(
            "SELECT {} FROM visit_feedbacks WHERE access_token = $1",
            FEEDBACK_COLUMNS
        ))
        .bind(access_token)
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.map(VisitFeedback::from))
    }

    async fn update_feedback(
        &self,
        feedback: &VisitFeedback,
        expected: FeedbackStatus,
        jobs: &[DispatchJob],
    ) -> Result<bool, AppError> {
        let mut tx = begin_tenant_tx(&self.pool, feedback.construtora_id).await?;

        let result = sqlx::query(
            r#"
            UPDATE visit_feedbacks SET
                status = $1,
                agent_section = $2, client_section = $3, score_lead = $4,
                content_hash = $5,
                agent_submitted_at = $6, completed_at = $7, archived_at = $8,
                updated_at = $9
            WHERE id = $10 AND construtora_id = $11 AND status = $12
            "#,
        )
        .bind(feedback.status)
        .bind(feedback.agent_section.as_ref().map(Json))
        .bind(feedback.client_section.as_ref().map(Json))
        .bind(feedback.score_lead.map(i16::from))
        .bind(&feedback.content_hash)
        .bind(feedback.agent_submitted_at)
        .bind(feedback.completed_at)
        .bind(feedback.archived_at)
        .bind(feedback.updated_at)
        .bind(feedback.id)
        .bind(feedback.construtora_id)
        .bind(expected)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() != 1 {
            tx.rollback().await?;
            return Ok(false);
        }

        // O job do relatório só existe se o `completo` foi gravado
        insert_jobs(&mut tx, jobs).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn record_report(
        &self,
        construtora_id: Uuid,
        feedback_id: Uuid,
        report_url: &str,
        generated_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let mut tx = begin_tenant_tx(&self.pool, construtora_id).await?;

        let result = sqlx::query(
            r#"
            UPDATE visit_feedbacks
            SET report_url = $1, report_generated_at = $2
            WHERE id = $3 AND construtora_id = $4
            "#,
        )
        .bind(report_url)
        .bind(generated_at)
        .bind(feedback_id)
        .bind(construtora_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        if result.rows_affected() == 0 {
            return Err(AppError::ResourceNotFound(format!("Feedback {}", feedback_id)));
        }
        Ok(())
    }

    // O outbox não tem RLS: o worker atende todas as construtoras
    async fn enqueue_jobs(&self, jobs: &[DispatchJob]) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        insert_jobs(&mut tx, jobs).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn reserve_job(&self, locked_until: DateTime<Utc>) -> Result<Option<OutboxJob>, AppError> {
        // SKIP LOCKED: vários workers nunca pegam o mesmo job
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            UPDATE dispatch_jobs SET
                status = $1, attempts = attempts + 1,
                locked_until = $2, updated_at = NOW()
            WHERE id = (
                SELECT id FROM dispatch_jobs
                WHERE status = $3
                   OR (status = $1 AND locked_until < NOW())
                ORDER BY created_at
                FOR UPDATE SKIP LOCKED
                LIMIT 1
            )
            RETURNING id, payload, attempts, locked_until
            "#,
        )
        .bind(JOB_PROCESSING)
        .bind(locked_until)
        .bind(JOB_QUEUED)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| OutboxJob {
            id: row.id,
            job: row.payload.0,
            attempts: row.attempts,
            locked_until: row.locked_until.unwrap_or(locked_until),
        }))
    }

    async fn complete_job(&self, job_id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE dispatch_jobs
            SET status = $1, last_error = NULL, locked_until = NULL, updated_at = NOW()
            WHERE id = $2
            "#,
        )
        .bind(JOB_SUCCEEDED)
        .bind(job_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fail_job(&self, job_id: Uuid, error: &str) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE dispatch_jobs
            SET status = $1, last_error = $2, locked_until = NULL, updated_at = NOW()
            WHERE id = $3
            "#,
        )
        .bind(JOB_FAILED)
        .bind(error)
        .bind(job_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
