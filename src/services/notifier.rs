// src/services/notifier.rs

use anyhow::Context;
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::services::dispatch::{NotificationTemplate, Notifier};

/// Entrega as notificações num webhook (o serviço de e-mail fica do outro lado).
#[derive(Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(client: reqwest::Client, url: String) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, template: NotificationTemplate, recipient: &str, payload: &Value) -> anyhow::Result<()> {
        self.client
            .post(&self.url)
            .json(&json!({
                "template": template,
                "recipient": recipient,
                "payload": payload,
            }))
            .send()
            .await
            .with_context(|| format!("falha ao chamar o webhook ({})", template.as_str()))?
            .error_for_status()
            .context("webhook respondeu com erro")?;

        Ok(())
    }
}

// Sem webhook configurado (dev): só registra no log
#[derive(Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, template: NotificationTemplate, recipient: &str, payload: &Value) -> anyhow::Result<()> {
        tracing::info!(template = template.as_str(), %recipient, %payload, "📨 Notificação (somente log)");
        Ok(())
    }
}
