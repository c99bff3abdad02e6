pub mod auth;
pub mod dispatch;
pub mod feedback_service;
pub mod notifier;
pub mod report_service;
pub mod scoring;
pub mod visit_service;
