// src/services/report_service.rs

use std::{path::PathBuf, sync::Arc};

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use chrono::Utc;
use genpdf::{elements, style, Element};
use image::Luma;
use qrcode::QrCode;
use uuid::Uuid;

use crate::{
    db::VisitStore,
    models::{
        feedback::{FeedbackStatus, VisitFeedback},
        visit::Visit,
    },
    services::{
        dispatch::{GeneratedReport, ReportGenerator},
        feedback_service::public_feedback_link,
    },
};

// Tudo que vai impresso no PDF, já em texto (o render roda numa thread bloqueante)
#[derive(Debug, Clone, PartialEq)]
pub struct ReportContent {
    pub title: String,
    pub header: Vec<String>,
    pub agent_lines: Vec<(String, String)>,
    pub client_lines: Vec<(String, String)>,
    pub link: String,
    pub content_hash: String,
}

impl ReportContent {
    pub fn build(feedback: &VisitFeedback, visit: &Visit, public_base_url: &str) -> anyhow::Result<Self> {
        let agent = feedback
            .agent_section
            .as_ref()
            .ok_or_else(|| anyhow!("feedback {} sem a seção do corretor", feedback.id))?;
        let client = feedback
            .client_section
            .as_ref()
            .ok_or_else(|| anyhow!("feedback {} sem a seção do cliente", feedback.id))?;

        let visit_date = visit
            .confirmed_slot
            .or(visit.realized_at)
            .map(|d| d.format("%d/%m/%Y %H:%M").to_string())
            .unwrap_or_else(|| "-".into());

        let header = vec![
            format!("Imóvel: {}", visit.property_title),
            format!("Cliente: {}", visit.lead_name),
            format!("Corretor: {}", visit.agent_name.as_deref().unwrap_or("-")),
            format!("Data da visita: {}", visit_date),
        ];

        let agent_lines = vec![
            ("Score do lead".into(), format!("{}/100", agent.score_lead)),
            ("Duração".into(), format!("{} min", agent.duration_minutes)),
            ("Qualificação".into(), enum_label(&agent.qualification)),
            ("Poder de decisão".into(), enum_label(&agent.decision_power)),
            ("Prazo de compra".into(), enum_label(&agent.purchase_horizon)),
            (
                "Orçamento".into(),
                agent
                    .available_budget
                    .map(|b| format!("R$ {:.2}", b))
                    .unwrap_or_else(|| "-".into()),
            ),
            ("Observações".into(), agent.observations.clone()),
            (
                "Assinado em".into(),
                agent.signature.signed_at.format("%d/%m/%Y %H:%M").to_string(),
            ),
        ];

        let objections = client.objections.iter().map(enum_label).collect::<Vec<_>>().join(", ");
        let client_lines = vec![
            ("NPS".into(), client.nps.to_string()),
            ("Localização".into(), stars(client.ratings.location)),
            ("Acabamento".into(), stars(client.ratings.finish)),
            ("Planta".into(), stars(client.ratings.layout)),
            ("Custo-benefício".into(), stars(client.ratings.value)),
            ("Atendimento".into(), stars(client.ratings.service)),
            ("Interesse".into(), enum_label(&client.purchase_interest)),
            (
                "Objeções".into(),
                if objections.is_empty() { "-".into() } else { objections },
            ),
            (
                "Assinado em".into(),
                client.signature.signed_at.format("%d/%m/%Y %H:%M").to_string(),
            ),
        ];

        Ok(Self {
            title: format!("Feedback da visita - {}", visit.property_title),
            header,
            agent_lines,
            client_lines,
            link: public_feedback_link(public_base_url, &feedback.access_token),
            content_hash: feedback.content_hash.clone().unwrap_or_default(),
        })
    }
}

// Usa o mesmo rótulo do JSON ("0-3_meses", "muito_interessado"...)
fn enum_label<T: serde::Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(label)) => label.replace('_', " "),
        _ => "-".into(),
    }
}

fn stars(value: u8) -> String {
    format!("{}/5", value)
}

/// Gera o PDF com genpdf e grava em `{reports_dir}/{feedback_id}.pdf`.
/// Regerar sobrescreve o mesmo arquivo.
#[derive(Clone)]
pub struct PdfReportGenerator {
    store: Arc<dyn VisitStore>,
    fonts_dir: PathBuf,
    reports_dir: PathBuf,
    reports_base_url: String,
    public_base_url: String,
}

impl PdfReportGenerator {
    pub fn new(
        store: Arc<dyn VisitStore>,
        fonts_dir: PathBuf,
        reports_dir: PathBuf,
        reports_base_url: String,
        public_base_url: String,
    ) -> Self {
        Self {
            store,
            fonts_dir,
            reports_dir,
            reports_base_url,
            public_base_url,
        }
    }

    fn report_url(&self, feedback_id: Uuid) -> String {
        format!("{}/{}.pdf", self.reports_base_url.trim_end_matches('/'), feedback_id)
    }
}

#[async_trait]
impl ReportGenerator for PdfReportGenerator {
    async fn generate_report(&self, construtora_id: Uuid, feedback_id: Uuid) -> anyhow::Result<GeneratedReport> {
        // 1. Busca os dados
        let feedback = self
            .store
            .find_feedback(construtora_id, feedback_id)
            .await?
            .ok_or_else(|| anyhow!("feedback {} não encontrado", feedback_id))?;

        if feedback.status != FeedbackStatus::Completo {
            anyhow::bail!("feedback {} não está completo ({})", feedback_id, feedback.status.as_str());
        }

        let visit = self
            .store
            .find_visit(construtora_id, feedback.visit_id)
            .await?
            .ok_or_else(|| anyhow!("visita {} não encontrada", feedback.visit_id))?;

        let content = ReportContent::build(&feedback, &visit, &self.public_base_url)?;

        // 2. Renderiza fora do runtime async
        let fonts_dir = self.fonts_dir.clone();
        let bytes = tokio::task::spawn_blocking(move || render_pdf(&content, &fonts_dir))
            .await
            .context("falha na task de renderização do PDF")??;

        // 3. Grava (sobrescreve se já existir)
        tokio::fs::create_dir_all(&self.reports_dir)
            .await
            .context("não foi possível criar a pasta de relatórios")?;
        let path = self.reports_dir.join(format!("{}.pdf", feedback_id));
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("falha ao gravar {}", path.display()))?;

        Ok(GeneratedReport {
            url: self.report_url(feedback_id),
            generated_at: Utc::now(),
        })
    }
}

fn render_pdf(content: &ReportContent, fonts_dir: &std::path::Path) -> anyhow::Result<Vec<u8>> {
    // Carrega a fonte da pasta configurada
    let font_family = genpdf::fonts::from_files(fonts_dir, "Roboto", None)
        .map_err(|e| anyhow!("fonte não encontrada em {}: {}", fonts_dir.display(), e))?;

    let mut doc = genpdf::Document::new(font_family);
    doc.set_title(content.title.clone());
    let mut decorator = genpdf::SimplePageDecorator::new();
    decorator.set_margins(10);
    doc.set_page_decorator(decorator);

    // --- CABEÇALHO ---
    doc.push(elements::Paragraph::new(content.title.clone()).styled(style::Style::new().bold().with_font_size(16)));
    for line in &content.header {
        doc.push(elements::Paragraph::new(line.clone()));
    }
    doc.push(elements::Break::new(1.5));

    // --- SEÇÕES ---
    push_section(&mut doc, "AVALIAÇÃO DO CORRETOR", &content.agent_lines)?;
    doc.push(elements::Break::new(1.5));
    push_section(&mut doc, "AVALIAÇÃO DO CLIENTE", &content.client_lines)?;
    doc.push(elements::Break::new(2));

    // --- QR CODE para o link do feedback ---
    let code = QrCode::new(content.link.as_bytes()).map_err(|e| anyhow!("QR code inválido: {}", e))?;
    let image_buffer = code.render::<Luma<u8>>().build();
    let dynamic_image = image::DynamicImage::ImageLuma8(image_buffer);
    let pdf_image = elements::Image::from_dynamic_image(dynamic_image)
        .map_err(|e| anyhow!("falha ao converter o QR code: {}", e))?
        .with_scale(genpdf::Scale::new(0.5, 0.5));
    doc.push(pdf_image);

    // --- RODAPÉ ---
    doc.push(elements::Break::new(1));
    doc.push(
        elements::Paragraph::new(format!("Integridade (SHA-256): {}", content.content_hash))
            .styled(style::Style::new().italic().with_font_size(7)),
    );

    let mut buffer = Vec::new();
    doc.render(&mut buffer).map_err(|e| anyhow!("falha ao renderizar o PDF: {}", e))?;
    Ok(buffer)
}

fn push_section(doc: &mut genpdf::Document, title: &str, lines: &[(String, String)]) -> anyhow::Result<()> {
    doc.push(elements::Paragraph::new(title).styled(style::Style::new().bold().with_font_size(12)));

    // Pesos das colunas: Campo (2), Valor (5)
    let mut table = elements::TableLayout::new(vec![2, 5]);
    table.set_cell_decorator(elements::FrameCellDecorator::new(true, true, false));
    for (label, value) in lines {
        table
            .row()
            .element(elements::Paragraph::new(label.clone()).styled(style::Style::new().bold()))
            .element(elements::Paragraph::new(value.clone()))
            .push()
            .map_err(|e| anyhow!("falha ao montar a tabela: {}", e))?;
    }
    doc.push(table);
    Ok(())
}
