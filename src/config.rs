// src/config.rs

use std::{env, path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    db::{VisitRepository, VisitStore},
    models::feedback::FeedbackPolicy,
    services::{
        auth::AuthService,
        dispatch::{dispatch_outbox, DispatchWorker, Dispatcher, Notifier, ReportGenerator},
        feedback_service::FeedbackService,
        notifier::{LogNotifier, WebhookNotifier},
        report_service::PdfReportGenerator,
        visit_service::VisitService,
    },
};

// Configuração lida do ambiente (.env em dev)
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt_secret: String,
    pub bind_addr: String,
    pub db_max_connections: u32,
    pub feedback_policy: FeedbackPolicy,
    pub public_base_url: String,
    pub notify_webhook_url: Option<String>,
    pub reports_dir: PathBuf,
    pub reports_base_url: String,
    pub fonts_dir: PathBuf,
    pub dispatch_poll_interval: Duration,
    pub collaborator_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Monta a configuração a partir de qualquer fonte chave/valor.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let database_url = get("DATABASE_URL").context("DATABASE_URL deve ser definida")?;
        let jwt_secret = get("JWT_SECRET").context("JWT_SECRET deve ser definido")?;

        let db_max_connections = or("DB_MAX_CONNECTIONS", "5")
            .parse()
            .context("DB_MAX_CONNECTIONS deve ser um número")?;
        let feedback_policy = or("FEEDBACK_POLICY", "agent_first")
            .parse::<FeedbackPolicy>()
            .map_err(|_| anyhow::anyhow!("FEEDBACK_POLICY deve ser agent_first ou client_first"))?;
        let poll_secs: u64 = or("DISPATCH_POLL_INTERVAL_SECS", "5")
            .parse()
            .context("DISPATCH_POLL_INTERVAL_SECS deve ser um número")?;
        let timeout_secs: u64 = or("COLLABORATOR_TIMEOUT_SECS", "10")
            .parse()
            .context("COLLABORATOR_TIMEOUT_SECS deve ser um número")?;

        Ok(Self {
            database_url,
            jwt_secret,
            bind_addr: or("BIND_ADDR", "0.0.0.0:3000"),
            db_max_connections,
            feedback_policy,
            public_base_url: or("PUBLIC_BASE_URL", "http://localhost:5173"),
            notify_webhook_url: get("NOTIFY_WEBHOOK_URL"),
            reports_dir: PathBuf::from(or("REPORTS_DIR", "./reports")),
            reports_base_url: or("REPORTS_BASE_URL", "http://localhost:3000/reports"),
            fonts_dir: PathBuf::from(or("FONTS_DIR", "./fonts")),
            dispatch_poll_interval: Duration::from_secs(poll_secs.max(1)),
            collaborator_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

// O estado compartilhado que será acessível em toda a aplicação
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub auth_service: AuthService,
    pub visit_service: VisitService,
    pub feedback_service: FeedbackService,
}

impl AppState {
    /// Conecta no Postgres e monta o gráfico de dependências.
    /// O worker de despacho volta separado para o `main` fazer o spawn.
    pub async fn new(config: AppConfig) -> anyhow::Result<(Self, DispatchWorker, PgPool)> {
        let db_pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await
            .context("Falha ao conectar ao banco de dados")?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        let store: Arc<dyn VisitStore> = Arc::new(VisitRepository::new(db_pool.clone()));

        let notifier: Arc<dyn Notifier> = match &config.notify_webhook_url {
            Some(url) => {
                let client = reqwest::Client::builder()
                    .timeout(config.collaborator_timeout)
                    .build()
                    .context("Falha ao montar o cliente HTTP")?;
                Arc::new(WebhookNotifier::new(client, url.clone()))
            }
            None => {
                tracing::warn!("NOTIFY_WEBHOOK_URL ausente, notificações só no log");
                Arc::new(LogNotifier)
            }
        };

        let reports: Arc<dyn ReportGenerator> = Arc::new(PdfReportGenerator::new(
            store.clone(),
            config.fonts_dir.clone(),
            config.reports_dir.clone(),
            config.reports_base_url.clone(),
            config.public_base_url.clone(),
        ));

        let (state, worker) = Self::from_parts(config, store, notifier, reports);
        Ok((state, worker, db_pool))
    }

    /// Monta o estado com colaboradores já prontos (testes usam o store em memória).
    pub fn from_parts(
        config: AppConfig,
        store: Arc<dyn VisitStore>,
        notifier: Arc<dyn Notifier>,
        reports: Arc<dyn ReportGenerator>,
    ) -> (Self, DispatchWorker) {
        let (dispatcher, worker): (Dispatcher, DispatchWorker) = dispatch_outbox(
            store.clone(),
            notifier,
            reports,
            config.collaborator_timeout,
            config.dispatch_poll_interval,
        );

        let auth_service = AuthService::new(config.jwt_secret.clone());
        let visit_service = VisitService::new(
            store.clone(),
            dispatcher.clone(),
            config.feedback_policy,
            config.public_base_url.clone(),
        );
        let feedback_service = FeedbackService::new(store, dispatcher, config.public_base_url.clone());

        let state = Self {
            config: Arc::new(config),
            auth_service,
            visit_service,
            feedback_service,
        };
        (state, worker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_required_vars_are_set() {
        let config = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/visitas"),
            ("JWT_SECRET", "segredo"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.db_max_connections, 5);
        assert_eq!(config.feedback_policy, FeedbackPolicy::AgentFirst);
        assert_eq!(config.dispatch_poll_interval, Duration::from_secs(5));
        assert_eq!(config.collaborator_timeout, Duration::from_secs(10));
        assert!(config.notify_webhook_url.is_none());
    }

    #[test]
    fn missing_secret_fails() {
        let result = AppConfig::from_lookup(lookup(&[("DATABASE_URL", "postgres://localhost/visitas")]));
        assert!(result.is_err());
    }

    #[test]
    fn policy_and_numbers_are_parsed() {
        let config = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/visitas"),
            ("JWT_SECRET", "segredo"),
            ("FEEDBACK_POLICY", "client_first"),
            ("COLLABORATOR_TIMEOUT_SECS", "3"),
            ("NOTIFY_WEBHOOK_URL", "https://hooks.exemplo.com/visitas"),
        ]))
        .unwrap();
        assert_eq!(config.feedback_policy, FeedbackPolicy::ClientFirst);
        assert_eq!(config.collaborator_timeout, Duration::from_secs(3));
        assert_eq!(config.notify_webhook_url.as_deref(), Some("https://hooks.exemplo.com/visitas"));

        let bad = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/visitas"),
            ("JWT_SECRET", "segredo"),
            ("FEEDBACK_POLICY", "whoever_first"),
        ]));
        assert!(bad.is_err());
    }
}
