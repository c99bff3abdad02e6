mod common;

use common::{best_agent_input, client_input, RacePoint, TestContext};
use visitas_backend::{
    common::error::AppError,
    models::feedback::{FeedbackStatus, PublicFeedbackView},
    services::dispatch::NotificationTemplate,
};

#[tokio::test]
async fn end_to_end_dispatches_exactly_one_report() {
    let ctx = TestContext::new();
    let (visit, feedback) = ctx.realized_feedback().await;
    let feedbacks = ctx.state.feedback_service.clone();

    let view = feedbacks.public_view(&feedback.access_token).await.unwrap();
    assert!(matches!(view, PublicFeedbackView::WaitingOnAgent { .. }));

    let after_agent = feedbacks
        .submit_agent_section(ctx.tenant, feedback.id, best_agent_input())
        .await
        .unwrap();
    assert_eq!(after_agent.status, FeedbackStatus::AguardandoCliente);
    assert_eq!(after_agent.score_lead, Some(100));

    match feedbacks.public_view(&feedback.access_token).await.unwrap() {
        PublicFeedbackView::Form { property_title, agent_name, .. } => {
            assert_eq!(property_title, visit.property_title);
            assert_eq!(agent_name.as_deref(), Some("Carla Mendes"));
        }
        other => panic!("esperava o formulário, veio {:?}", other),
    }

    let completed = feedbacks
        .submit_client_section(&feedback.access_token, client_input(9))
        .await
        .unwrap();
    assert_eq!(completed.status, FeedbackStatus::Completo);
    assert!(completed.completed_at.is_some());
    assert!(completed.sections_consistent());
    assert_eq!(completed.content_hash.as_ref().map(String::len), Some(64));

    ctx.drain().await;
    assert_eq!(ctx.reports.count(), 1);

    let stored = feedbacks.get_feedback(ctx.tenant, feedback.id).await.unwrap();
    assert_eq!(
        stored.report_url,
        Some(format!("https://relatorios.exemplo.com/{}.pdf", feedback.id))
    );
    assert!(stored.report_generated_at.is_some());

    let summary = ctx.notifier.sent_to(NotificationTemplate::AgencyFeedbackSummary);
    assert_eq!(summary.len(), 1);
    assert_eq!(summary[0].0, "contato@imobiliaria.com.br");
    assert_eq!(summary[0].1["nps"], 9);
    assert_eq!(summary[0].1["scoreLead"], 100);
    assert_eq!(summary[0].1["purchaseInterest"], "muito_interessado");
    assert_eq!(ctx.notifier.sent_to(NotificationTemplate::ClientFeedbackCompleted).len(), 1);

    // Link consumido: o cliente só vê a mensagem de já respondido
    assert_eq!(
        feedbacks.public_view(&feedback.access_token).await.unwrap(),
        PublicFeedbackView::AlreadySubmitted
    );
    assert!(matches!(
        feedbacks.submit_client_section(&feedback.access_token, client_input(10)).await,
        Err(AppError::ResourceNotFound(_))
    ));

    ctx.drain().await;
    assert_eq!(ctx.reports.count(), 1, "nenhum relatório extra");
}

#[tokio::test]
async fn agent_submission_invites_the_client() {
    let ctx = TestContext::new();
    let feedback = ctx.awaiting_client().await;

    ctx.drain().await;
    let invites = ctx.notifier.sent_to(NotificationTemplate::FeedbackInvitation);
    assert_eq!(invites.len(), 1);
    assert_eq!(invites[0].0, "joao@email.com");
    assert_eq!(invites[0].1["accessToken"], feedback.access_token.as_str());
}

#[tokio::test]
async fn client_cannot_answer_before_the_agent() {
    let ctx = TestContext::new();
    let (_, feedback) = ctx.realized_feedback().await;

    let err = ctx
        .state
        .feedback_service
        .submit_client_section(&feedback.access_token, client_input(8))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));

    let stored = ctx.state.feedback_service.get_feedback(ctx.tenant, feedback.id).await.unwrap();
    assert_eq!(stored.status, FeedbackStatus::AguardandoCorretor);
    assert!(stored.client_section.is_none());
}

#[tokio::test]
async fn unknown_token_is_not_found() {
    let ctx = TestContext::new();
    let token = "f".repeat(64);

    assert!(matches!(
        ctx.state.feedback_service.public_view(&token).await,
        Err(AppError::ResourceNotFound(_))
    ));
    assert!(matches!(
        ctx.state.feedback_service.submit_client_section(&token, client_input(7)).await,
        Err(AppError::ResourceNotFound(_))
    ));
}

#[tokio::test]
async fn nps_boundaries() {
    let ctx = TestContext::new();

    for nps in [0, 10] {
        let feedback = ctx.awaiting_client().await;
        let done = ctx
            .state
            .feedback_service
            .submit_client_section(&feedback.access_token, client_input(nps))
            .await
            .unwrap();
        assert_eq!(done.client_section.map(|c| c.nps as i32), Some(nps));
    }

    for nps in [-1, 11] {
        let feedback = ctx.awaiting_client().await;
        let err = ctx
            .state
            .feedback_service
            .submit_client_section(&feedback.access_token, client_input(nps))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)), "nps {}", nps);

        // Entrada inválida não consome o link
        let stored = ctx.state.feedback_service.get_feedback(ctx.tenant, feedback.id).await.unwrap();
        assert_eq!(stored.status, FeedbackStatus::AguardandoCliente);
    }
}

#[tokio::test]
async fn concurrent_client_submissions_have_one_winner() {
    let ctx = TestContext::racing(RacePoint::FindFeedbackByToken);
    let feedback = ctx.awaiting_client().await;
    let service = ctx.state.feedback_service.clone();

    ctx.arm_race();
    let (a, b) = tokio::join!(
        service.submit_client_section(&feedback.access_token, client_input(9)),
        service.submit_client_section(&feedback.access_token, client_input(3)),
    );

    assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
    let loser = if a.is_ok() { b.unwrap_err() } else { a.unwrap_err() };
    assert!(matches!(loser, AppError::InvalidState(_)), "perdedor recebe conflito, veio {:?}", loser);

    ctx.drain().await;
    assert_eq!(ctx.reports.count(), 1);
}

#[tokio::test]
async fn concurrent_agent_submissions_have_one_winner() {
    let ctx = TestContext::racing(RacePoint::FindFeedback);
    let (_, feedback) = ctx.realized_feedback().await;
    let service = ctx.state.feedback_service.clone();

    ctx.arm_race();
    let (a, b) = tokio::join!(
        service.submit_agent_section(ctx.tenant, feedback.id, best_agent_input()),
        service.submit_agent_section(ctx.tenant, feedback.id, best_agent_input()),
    );

    assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
    let loser = if a.is_ok() { b.unwrap_err() } else { a.unwrap_err() };
    assert!(matches!(loser, AppError::InvalidState(_)));
}

#[tokio::test]
async fn resubmitting_the_agent_section_is_rejected() {
    let ctx = TestContext::new();
    let feedback = ctx.awaiting_client().await;

    let err = ctx
        .state
        .feedback_service
        .submit_agent_section(ctx.tenant, feedback.id, best_agent_input())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
}

#[tokio::test]
async fn archive_from_any_stage_and_report_regeneration() {
    let ctx = TestContext::new();
    let feedbacks = ctx.state.feedback_service.clone();

    // Arquivamento antes do corretor
    let (_, early) = ctx.realized_feedback().await;
    let archived = feedbacks.archive_feedback(ctx.tenant, early.id).await.unwrap();
    assert_eq!(archived.status, FeedbackStatus::Arquivado);
    assert!(archived.archived_at.is_some());
    assert!(matches!(
        feedbacks.archive_feedback(ctx.tenant, early.id).await,
        Err(AppError::InvalidState(_))
    ));
    assert!(matches!(
        feedbacks.submit_agent_section(ctx.tenant, early.id, best_agent_input()).await,
        Err(AppError::InvalidState(_))
    ));
    assert!(matches!(
        feedbacks.regenerate_report(ctx.tenant, early.id).await,
        Err(AppError::InvalidState(_))
    ));

    // Regeração só para feedback completo, e pode repetir
    let waiting = ctx.awaiting_client().await;
    feedbacks
        .submit_client_section(&waiting.access_token, client_input(6))
        .await
        .unwrap();
    feedbacks.regenerate_report(ctx.tenant, waiting.id).await.unwrap();
    ctx.drain().await;
    assert_eq!(ctx.reports.count(), 2);

    // Completo também pode ser arquivado, e o relatório continua gravado
    let archived = feedbacks.archive_feedback(ctx.tenant, waiting.id).await.unwrap();
    assert_eq!(archived.status, FeedbackStatus::Arquivado);
    let stored = feedbacks.get_feedback(ctx.tenant, waiting.id).await.unwrap();
    assert!(stored.report_url.is_some());
    assert!(stored.client_section.is_some());
}

#[tokio::test]
async fn feedback_lookup_by_visit() {
    let ctx = TestContext::new();
    let (visit, feedback) = ctx.realized_feedback().await;

    let found = ctx
        .state
        .feedback_service
        .get_feedback_by_visit(ctx.tenant, visit.id)
        .await
        .unwrap();
    assert_eq!(found.id, feedback.id);

    let other = ctx.confirmed_visit().await;
    assert!(matches!(
        ctx.state.feedback_service.get_feedback_by_visit(ctx.tenant, other.id).await,
        Err(AppError::ResourceNotFound(_))
    ));
}

#[tokio::test]
async fn report_survives_a_backlog_and_a_worker_restart() {
    let mut ctx = TestContext::new();

    // Fila cheia de notificações antes do feedback completar
    for _ in 0..300 {
        ctx.confirmed_visit().await;
    }
    let feedback = ctx.awaiting_client().await;
    ctx.state
        .feedback_service
        .submit_client_section(&feedback.access_token, client_input(8))
        .await
        .unwrap();

    // O processo reinicia antes de o worker chegar no relatório
    ctx.restart_worker();
    ctx.drain().await;

    assert_eq!(ctx.reports.count(), 1);
    let stored = ctx.state.feedback_service.get_feedback(ctx.tenant, feedback.id).await.unwrap();
    assert_eq!(
        stored.report_url,
        Some(format!("https://relatorios.exemplo.com/{}.pdf", feedback.id))
    );
    assert_eq!(ctx.memory.pending_jobs().await, 0);
    assert!(ctx.memory.failed_jobs().await.is_empty());
}

#[tokio::test]
async fn losing_submissions_leave_nothing_in_the_outbox() {
    let ctx = TestContext::new();
    let feedback = ctx.awaiting_client().await;
    ctx.drain().await;

    // Inválido: não grava nem enfileira
    assert!(ctx
        .state
        .feedback_service
        .submit_client_section(&feedback.access_token, client_input(11))
        .await
        .is_err());
    assert_eq!(ctx.memory.pending_jobs().await, 0);

    ctx.state
        .feedback_service
        .submit_client_section(&feedback.access_token, client_input(7))
        .await
        .unwrap();
    // Relatório + cliente + imobiliária
    assert_eq!(ctx.memory.pending_jobs().await, 3);
}

#[tokio::test]
async fn padded_observations_do_not_reach_the_minimum() {
    let ctx = TestContext::new();
    let (_, feedback) = ctx.realized_feedback().await;

    let mut input = best_agent_input();
    input.observations = format!("{}a", " ".repeat(9));
    let err = ctx
        .state
        .feedback_service
        .submit_agent_section(ctx.tenant, feedback.id, input)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)));

    let stored = ctx.state.feedback_service.get_feedback(ctx.tenant, feedback.id).await.unwrap();
    assert_eq!(stored.status, FeedbackStatus::AguardandoCorretor);
    assert!(stored.agent_section.is_none());
}
