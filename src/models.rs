pub mod auth;
pub mod feedback;
pub mod outbox;
pub mod rbac;
pub mod visit;
